//! The static recipe graph.
//!
//! A [`Workplan`] is an arena: connectors and steps live in id-keyed maps and
//! refer to each other only by id, so rework loops never form ownership cycles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::connector::{Connector, ConnectorId, NodeClassification};
use crate::error::WorkplanError;
use crate::step::{Step, StepId};

/// Publication state of a workplan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkplanState {
    New,
    Released,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workplan {
    id: Uuid,
    pub name: String,
    pub version: u32,
    pub state: WorkplanState,
    next_id: u64,
    connectors: BTreeMap<ConnectorId, Connector>,
    steps: BTreeMap<StepId, Step>,
}

impl Workplan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            state: WorkplanState::New,
            next_id: 1,
            connectors: BTreeMap::new(),
            steps: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a connector. Only one start connector may exist.
    pub fn add_connector(
        &mut self,
        name: impl Into<String>,
        classification: NodeClassification,
    ) -> Result<ConnectorId, WorkplanError> {
        if classification.is_entry() && self.start_connector().is_some() {
            return Err(WorkplanError::MultipleStarts);
        }
        let id = ConnectorId(self.allocate_id());
        self.connectors.insert(
            id,
            Connector {
                id,
                name: name.into(),
                classification,
            },
        );
        Ok(id)
    }

    /// Add a step, assigning its id.
    ///
    /// Fails when the outcome count does not match the outputs or when a slot
    /// references a connector of another workplan.
    pub fn add_step(&mut self, mut step: Step) -> Result<StepId, WorkplanError> {
        step.check_structure()?;
        self.check_membership(&step)?;
        let id = StepId(self.allocate_id());
        step.id = id;
        self.steps.insert(id, step);
        Ok(id)
    }

    pub fn remove_step(&mut self, id: StepId) -> Result<Step, WorkplanError> {
        self.steps.remove(&id).ok_or(WorkplanError::UnknownStep(id))
    }

    /// Remove a connector and unwire every slot that referenced it.
    pub fn remove_connector(&mut self, id: ConnectorId) -> Result<Connector, WorkplanError> {
        let connector = self
            .connectors
            .remove(&id)
            .ok_or(WorkplanError::UnknownConnector(id))?;
        for step in self.steps.values_mut() {
            step.clear_connector(id);
        }
        Ok(connector)
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    /// Mutable access to a step's name and parameters. Wiring goes through
    /// [`Workplan::set_step_input`] and [`Workplan::set_step_output`].
    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.get_mut(&id)
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    pub fn start_connector(&self) -> Option<&Connector> {
        self.connectors.values().find(|c| c.is_entry())
    }

    pub fn end_connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values().filter(|c| c.is_exit())
    }

    /// Steps and input slots reading from `connector`.
    pub fn consumers_of(&self, connector: ConnectorId) -> Vec<(StepId, usize)> {
        self.steps
            .values()
            .flat_map(|step| {
                step.inputs()
                    .iter()
                    .enumerate()
                    .filter(move |(_, slot)| **slot == Some(connector))
                    .map(move |(i, _)| (step.id, i))
            })
            .collect()
    }

    /// Steps and output slots writing to `connector`.
    pub fn producers_of(&self, connector: ConnectorId) -> Vec<(StepId, usize)> {
        self.steps
            .values()
            .flat_map(|step| {
                step.outputs()
                    .iter()
                    .enumerate()
                    .filter(move |(_, slot)| **slot == Some(connector))
                    .map(move |(i, _)| (step.id, i))
            })
            .collect()
    }

    pub fn is_referenced(&self, connector: ConnectorId) -> bool {
        self.steps.values().any(|step| step.references(connector))
    }

    /// Rewire one input slot. Returns the connector previously in the slot.
    pub fn set_step_input(
        &mut self,
        step: StepId,
        slot: usize,
        connector: Option<ConnectorId>,
    ) -> Result<Option<ConnectorId>, WorkplanError> {
        self.check_connector(connector)?;
        self.steps
            .get_mut(&step)
            .ok_or(WorkplanError::UnknownStep(step))?
            .set_input(slot, connector)
    }

    /// Rewire one output slot. Returns the connector previously in the slot.
    pub fn set_step_output(
        &mut self,
        step: StepId,
        slot: usize,
        connector: Option<ConnectorId>,
    ) -> Result<Option<ConnectorId>, WorkplanError> {
        self.check_connector(connector)?;
        self.steps
            .get_mut(&step)
            .ok_or(WorkplanError::UnknownStep(step))?
            .set_output(slot, connector)
    }

    pub fn bump_version(&mut self) -> u32 {
        self.version += 1;
        self.version
    }

    /// Re-check every structural invariant: outcome counts, connector
    /// membership and the single start connector.
    pub fn check_structure(&self) -> Result<(), WorkplanError> {
        if self.connectors.values().filter(|c| c.is_entry()).count() > 1 {
            return Err(WorkplanError::MultipleStarts);
        }
        for step in self.steps.values() {
            step.check_structure()?;
            self.check_membership(step)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, WorkplanError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a workplan and verify its structure.
    pub fn from_json(json: &str) -> Result<Self, WorkplanError> {
        let workplan: Workplan = serde_json::from_str(json)?;
        let max_id = workplan
            .connectors
            .keys()
            .map(|c| c.0)
            .chain(workplan.steps.keys().map(|s| s.0))
            .max()
            .unwrap_or(0);
        if workplan.next_id <= max_id {
            return Err(WorkplanError::Serialization(format!(
                "id counter {} does not exceed the largest id {}",
                workplan.next_id, max_id
            )));
        }
        workplan.check_ids()?;
        workplan.check_structure()?;
        Ok(workplan)
    }

    /// Map keys must match the stored ids, and connectors and steps draw from
    /// one counter so their ids never overlap.
    fn check_ids(&self) -> Result<(), WorkplanError> {
        if let Some((key, connector)) = self.connectors.iter().find(|(k, c)| **k != c.id) {
            return Err(WorkplanError::Serialization(format!(
                "connector stored under {} claims id {}",
                key, connector.id
            )));
        }
        if let Some((key, step)) = self.steps.iter().find(|(k, s)| **k != s.id) {
            return Err(WorkplanError::Serialization(format!(
                "step stored under {} claims id {}",
                key, step.id
            )));
        }
        if let Some(step) = self
            .steps
            .keys()
            .find(|s| self.connectors.contains_key(&ConnectorId(s.0)))
        {
            return Err(WorkplanError::Serialization(format!(
                "step {} and connector C{} share the same id",
                step, step.0
            )));
        }
        Ok(())
    }

    fn check_connector(&self, connector: Option<ConnectorId>) -> Result<(), WorkplanError> {
        match connector {
            Some(id) if !self.connectors.contains_key(&id) => {
                Err(WorkplanError::UnknownConnector(id))
            }
            _ => Ok(()),
        }
    }

    fn check_membership(&self, step: &Step) -> Result<(), WorkplanError> {
        step.inputs()
            .iter()
            .chain(step.outputs())
            .try_for_each(|slot| self.check_connector(*slot))
    }
}
