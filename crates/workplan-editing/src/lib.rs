//! Interactive editing of a workplan.
//!
//! An [`EditingSession`] owns one [`Workplan`] and rewires it one connection
//! at a time. Every call leaves the workplan with exactly one start connector
//! and without intermediate connectors that nothing references. Editing is a
//! design-time activity: a workplan must not be edited while a process built
//! from it is still running.

use std::collections::BTreeSet;

use tracing::{debug, trace};
use workplan_core::{Connector, ConnectorId, NodeClassification, Step, StepId, Workplan, WorkplanError};

/// One end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Step(StepId),
    /// A connector used directly as an endpoint, usually the start or an exit.
    Connector(ConnectorId),
}

impl From<StepId> for NodeRef {
    fn from(id: StepId) -> Self {
        NodeRef::Step(id)
    }
}

impl From<ConnectorId> for NodeRef {
    fn from(id: ConnectorId) -> Self {
        NodeRef::Connector(id)
    }
}

/// Mutation API over a single workplan.
///
/// Calls on one session must not run concurrently; `&mut self` makes that
/// the caller's problem at compile time.
#[derive(Debug)]
pub struct EditingSession {
    workplan: Workplan,
}

impl EditingSession {
    /// Take ownership of `workplan`, adding a start connector if it has none.
    pub fn new(mut workplan: Workplan) -> Result<Self, WorkplanError> {
        if workplan.start_connector().is_none() {
            workplan.add_connector("Start", NodeClassification::Start)?;
        }
        Ok(Self { workplan })
    }

    pub fn workplan(&self) -> &Workplan {
        &self.workplan
    }

    pub fn into_workplan(self) -> Workplan {
        self.workplan
    }

    pub fn start(&self) -> Result<ConnectorId, WorkplanError> {
        self.workplan
            .start_connector()
            .map(|c| c.id())
            .ok_or(WorkplanError::MissingStart)
    }

    /// Add an exit or a free-standing connector. A second start is rejected.
    pub fn add_connector(
        &mut self,
        name: impl Into<String>,
        classification: NodeClassification,
    ) -> Result<ConnectorId, WorkplanError> {
        self.workplan.add_connector(name, classification)
    }

    pub fn add_step(&mut self, step: Step) -> Result<StepId, WorkplanError> {
        let name = step.name.clone();
        let id = self.workplan.add_step(step)?;
        debug!(step = %id, name = %name, "step added");
        Ok(id)
    }

    /// Remove a step and garbage-collect the connectors it left orphaned.
    pub fn remove_step(&mut self, id: StepId) -> Result<Step, WorkplanError> {
        let step = self.workplan.remove_step(id)?;
        let touched: BTreeSet<ConnectorId> = step
            .inputs()
            .iter()
            .chain(step.outputs())
            .flatten()
            .copied()
            .collect();
        for connector in touched {
            self.release(connector)?;
        }
        debug!(step = %id, name = %step.name, "step removed");
        Ok(step)
    }

    /// Wire output `output_index` of `source` to input `input_index` of `target`.
    ///
    /// Connecting what is already connected changes nothing. An existing
    /// connector on the target input is reused, otherwise a new intermediate
    /// connector is allocated. Whatever the source output pointed at before
    /// is released and deleted once nothing references it, unless it is the
    /// start or an exit.
    pub fn connect(
        &mut self,
        source: impl Into<NodeRef>,
        output_index: usize,
        target: impl Into<NodeRef>,
        input_index: usize,
    ) -> Result<(), WorkplanError> {
        match (source.into(), target.into()) {
            (NodeRef::Step(source), NodeRef::Step(target)) => {
                self.check_output(source, output_index)?;
                let existing = self.input_of(target, input_index)?;
                let connector = match existing {
                    Some(connector) => connector,
                    None => {
                        let name = format!(
                            "{} to {}",
                            self.step_name(source)?,
                            self.step_name(target)?
                        );
                        let connector = self
                            .workplan
                            .add_connector(name, NodeClassification::Intermediate)?;
                        self.workplan
                            .set_step_input(target, input_index, Some(connector))?;
                        connector
                    }
                };
                self.redirect_output(source, output_index, connector)
            }
            (NodeRef::Step(source), NodeRef::Connector(target)) => {
                self.check_slot_zero(input_index, target)?;
                self.known_connector(target)?;
                self.check_output(source, output_index)?;
                self.redirect_output(source, output_index, target)
            }
            (NodeRef::Connector(source), NodeRef::Step(target)) => {
                self.check_slot_zero(output_index, source)?;
                self.connect_from_connector(source, target, input_index)
            }
            (NodeRef::Connector(source), NodeRef::Connector(target)) => {
                Err(WorkplanError::InvalidConnection(format!(
                    "connectors {} and {} cannot be wired to each other",
                    source, target
                )))
            }
        }
    }

    /// Unwire one step output.
    pub fn disconnect(&mut self, step: StepId, output_index: usize) -> Result<(), WorkplanError> {
        let previous = self.workplan.set_step_output(step, output_index, None)?;
        if let Some(previous) = previous {
            debug!(step = %step, output = output_index, connector = %previous, "output disconnected");
            self.release(previous)?;
        }
        Ok(())
    }

    fn connect_from_connector(
        &mut self,
        source: ConnectorId,
        target: StepId,
        input_index: usize,
    ) -> Result<(), WorkplanError> {
        let connector = self.known_connector(source)?;
        if connector.is_exit() {
            return Err(WorkplanError::InvalidConnection(format!(
                "exit connector {} cannot feed a step",
                source
            )));
        }
        let is_entry = connector.is_entry();
        let previous = self.input_of(target, input_index)?;
        if previous == Some(source) {
            return Ok(());
        }
        if is_entry {
            // the start feeds exactly one input
            for (step, slot) in self.workplan.consumers_of(source) {
                self.workplan.set_step_input(step, slot, None)?;
            }
        }
        self.workplan
            .set_step_input(target, input_index, Some(source))?;
        debug!(connector = %source, step = %target, input = input_index, "input connected");
        if let Some(previous) = previous {
            self.release(previous)?;
        }
        Ok(())
    }

    fn redirect_output(
        &mut self,
        source: StepId,
        output_index: usize,
        connector: ConnectorId,
    ) -> Result<(), WorkplanError> {
        let previous = self
            .workplan
            .set_step_output(source, output_index, Some(connector))?;
        if previous == Some(connector) {
            return Ok(());
        }
        debug!(step = %source, output = output_index, connector = %connector, "output connected");
        if let Some(previous) = previous {
            self.release(previous)?;
        }
        Ok(())
    }

    /// Garbage-collect a connector that just lost a reference.
    ///
    /// Once nothing produces it, its consumers are unwired. An intermediate
    /// connector that nothing references any more is deleted. The start is
    /// left alone entirely.
    fn release(&mut self, connector: ConnectorId) -> Result<(), WorkplanError> {
        let Some(classification) = self.workplan.connector(connector).map(|c| c.classification)
        else {
            return Ok(());
        };
        if classification.is_entry() {
            return Ok(());
        }
        if self.workplan.producers_of(connector).is_empty() {
            for (step, slot) in self.workplan.consumers_of(connector) {
                trace!(step = %step, input = slot, connector = %connector, "unwiring orphaned input");
                self.workplan.set_step_input(step, slot, None)?;
            }
        }
        if classification == NodeClassification::Intermediate
            && !self.workplan.is_referenced(connector)
        {
            self.workplan.remove_connector(connector)?;
            debug!(connector = %connector, "orphaned connector deleted");
        }
        Ok(())
    }

    fn step(&self, id: StepId) -> Result<&Step, WorkplanError> {
        self.workplan.step(id).ok_or(WorkplanError::UnknownStep(id))
    }

    fn step_name(&self, id: StepId) -> Result<String, WorkplanError> {
        Ok(self.step(id)?.name.clone())
    }

    fn known_connector(&self, id: ConnectorId) -> Result<&Connector, WorkplanError> {
        self.workplan
            .connector(id)
            .ok_or(WorkplanError::UnknownConnector(id))
    }

    fn input_of(&self, step: StepId, slot: usize) -> Result<Option<ConnectorId>, WorkplanError> {
        let inputs = self.step(step)?.inputs();
        inputs
            .get(slot)
            .copied()
            .ok_or(WorkplanError::SlotOutOfRange {
                step,
                slot,
                len: inputs.len(),
            })
    }

    fn check_output(&self, step: StepId, slot: usize) -> Result<(), WorkplanError> {
        let len = self.step(step)?.outputs().len();
        if slot >= len {
            return Err(WorkplanError::SlotOutOfRange { step, slot, len });
        }
        Ok(())
    }

    fn check_slot_zero(&self, slot: usize, connector: ConnectorId) -> Result<(), WorkplanError> {
        if slot != 0 {
            return Err(WorkplanError::InvalidConnection(format!(
                "connector {} has a single slot, got {}",
                connector, slot
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workplan_core::{OutputDescription, StepKind};

    fn task(name: &str, inputs: usize, outputs: usize) -> Step {
        Step::builder(name, StepKind::Task)
            .inputs(vec![None; inputs])
            .outcomes((0..outputs).map(|i| OutputDescription::success(format!("{}_{}", name, i))))
            .build()
            .unwrap()
    }

    fn intermediates(workplan: &Workplan) -> Vec<ConnectorId> {
        workplan
            .connectors()
            .filter(|c| c.classification == NodeClassification::Intermediate)
            .map(|c| c.id())
            .collect()
    }

    #[test]
    fn test_new_adds_missing_start() {
        let session = EditingSession::new(Workplan::new("blank")).unwrap();
        assert!(session.start().is_ok());

        let workplan = session.into_workplan();
        let again = EditingSession::new(workplan).unwrap();
        assert_eq!(again.workplan().connectors().count(), 1);
    }

    #[test]
    fn test_connect_allocates_connector_once() {
        let mut session = EditingSession::new(Workplan::new("pair")).unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();
        let b = session.add_step(task("b", 1, 1)).unwrap();

        session.connect(a, 0, b, 0).unwrap();
        let first = session.workplan().clone();
        session.connect(a, 0, b, 0).unwrap();
        assert_eq!(session.workplan(), &first);

        let link = intermediates(session.workplan());
        assert_eq!(link.len(), 1);
        assert_eq!(session.workplan().step(a).unwrap().outputs()[0], Some(link[0]));
        assert_eq!(session.workplan().step(b).unwrap().inputs()[0], Some(link[0]));
    }

    #[test]
    fn test_start_is_redirected_not_duplicated() {
        let mut session = EditingSession::new(Workplan::new("start")).unwrap();
        let start = session.start().unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();
        let b = session.add_step(task("b", 1, 1)).unwrap();

        session.connect(start, 0, a, 0).unwrap();
        session.connect(start, 0, b, 0).unwrap();

        let workplan = session.workplan();
        assert_eq!(workplan.step(a).unwrap().inputs()[0], None);
        assert_eq!(workplan.step(b).unwrap().inputs()[0], Some(start));
        assert_eq!(workplan.connectors().filter(|c| c.is_entry()).count(), 1);
    }

    #[test]
    fn test_redirect_keeps_exit_connectors() {
        let mut session = EditingSession::new(Workplan::new("exits")).unwrap();
        let end = session.add_connector("End", NodeClassification::End).unwrap();
        let scrap = session
            .add_connector("Scrap", NodeClassification::Failed)
            .unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();

        session.connect(a, 0, end, 0).unwrap();
        session.connect(a, 0, scrap, 0).unwrap();

        let workplan = session.workplan();
        assert!(workplan.connector(end).is_some());
        assert_eq!(workplan.step(a).unwrap().outputs()[0], Some(scrap));
    }

    #[test]
    fn test_disconnect_collects_orphan() {
        let mut session = EditingSession::new(Workplan::new("disconnect")).unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();
        let b = session.add_step(task("b", 1, 1)).unwrap();
        session.connect(a, 0, b, 0).unwrap();

        session.disconnect(a, 0).unwrap();
        let workplan = session.workplan();
        assert!(intermediates(workplan).is_empty());
        assert_eq!(workplan.step(b).unwrap().inputs()[0], None);
    }

    #[test]
    fn test_remove_step_collects_orphans() {
        let mut session = EditingSession::new(Workplan::new("remove")).unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();
        let b = session.add_step(task("b", 1, 1)).unwrap();
        session.connect(a, 0, b, 0).unwrap();

        session.remove_step(a).unwrap();
        assert!(intermediates(session.workplan()).is_empty());
        assert!(session.workplan().step(a).is_none());
    }

    #[test]
    fn test_invalid_connections_are_rejected() {
        let mut session = EditingSession::new(Workplan::new("invalid")).unwrap();
        let start = session.start().unwrap();
        let end = session.add_connector("End", NodeClassification::End).unwrap();
        let a = session.add_step(task("a", 1, 1)).unwrap();
        let before = session.workplan().clone();

        assert!(matches!(
            session.connect(start, 0, end, 0),
            Err(WorkplanError::InvalidConnection(_))
        ));
        assert!(matches!(
            session.connect(end, 0, a, 0),
            Err(WorkplanError::InvalidConnection(_))
        ));
        assert!(matches!(
            session.connect(a, 3, a, 0),
            Err(WorkplanError::SlotOutOfRange { slot: 3, .. })
        ));
        assert!(matches!(
            session.connect(a, 0, StepId(99), 0),
            Err(WorkplanError::UnknownStep(StepId(99)))
        ));
        assert_eq!(session.workplan(), &before);
    }
}
