//! Steps are the transition templates of a workplan.
//!
//! A step references connectors through ordered input and output slots. Output
//! slot `i` is the place a token is routed to when the step resolves with
//! outcome `i`, so `output_descriptions` is always index-aligned with `outputs`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::connector::ConnectorId;
use crate::context::WorkplanContext;
use crate::error::WorkplanError;
use crate::transition::Transition;

/// Identifier of a step, unique within its owning workplan.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// How an outcome is judged when looking for the happy path of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    Success,
    Failure,
    Neutral,
}

/// Symbolic name of one outcome, e.g. "succeed" or "failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescription {
    pub name: String,
    pub output_type: OutputType,
}

impl OutputDescription {
    pub fn new(name: impl Into<String>, output_type: OutputType) -> Self {
        Self {
            name: name.into(),
            output_type,
        }
    }

    pub fn success(name: impl Into<String>) -> Self {
        Self::new(name, OutputType::Success)
    }

    pub fn failure(name: impl Into<String>) -> Self {
        Self::new(name, OutputType::Failure)
    }

    pub fn neutral(name: impl Into<String>) -> Self {
        Self::new(name, OutputType::Neutral)
    }
}

/// Which runtime behavior a step instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Dispatches an external activity and waits for it to report an outcome.
    Task,
    /// Resolves immediately with a fixed outcome.
    Pass { outcome: usize },
    /// Emits one child token on every output.
    Split,
    /// Waits for a token on every input and emits one merged token on output 0.
    Join,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub(crate) id: StepId,
    pub name: String,
    kind: StepKind,
    inputs: Vec<Option<ConnectorId>>,
    outputs: Vec<Option<ConnectorId>>,
    output_descriptions: Vec<OutputDescription>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl Step {
    /// Start building a step of the given kind.
    pub fn builder(name: impl Into<String>, kind: StepKind) -> StepBuilder {
        StepBuilder::new(name, kind)
    }

    /// The id assigned by the owning workplan. Zero until the step is added.
    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn inputs(&self) -> &[Option<ConnectorId>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Option<ConnectorId>] {
        &self.outputs
    }

    pub fn output_descriptions(&self) -> &[OutputDescription] {
        &self.output_descriptions
    }

    /// Index of the first output with the given symbolic name.
    pub fn outcome_index(&self, name: &str) -> Option<usize> {
        self.output_descriptions.iter().position(|d| d.name == name)
    }

    /// Output used when the step is disabled for a process run.
    pub fn skip_output(&self) -> usize {
        match self.kind {
            StepKind::Pass { outcome } => outcome,
            _ => self
                .output_descriptions
                .iter()
                .position(|d| d.output_type == OutputType::Success)
                .unwrap_or(0),
        }
    }

    /// Outputs a token may take when every activity succeeds.
    pub fn success_outputs(&self) -> Vec<usize> {
        match self.kind {
            StepKind::Task => self
                .output_descriptions
                .iter()
                .enumerate()
                .filter(|(_, d)| d.output_type == OutputType::Success)
                .map(|(i, _)| i)
                .collect(),
            StepKind::Pass { outcome } => vec![outcome],
            StepKind::Split | StepKind::Join => (0..self.outputs.len()).collect(),
        }
    }

    pub fn references(&self, connector: ConnectorId) -> bool {
        self.inputs.contains(&Some(connector)) || self.outputs.contains(&Some(connector))
    }

    /// Checks the slot layout against the declared outcomes.
    pub fn check_structure(&self) -> Result<(), WorkplanError> {
        if self.outputs.len() != self.output_descriptions.len() {
            return Err(WorkplanError::StructuralConfig {
                step: self.name.clone(),
                outputs: self.outputs.len(),
                descriptions: self.output_descriptions.len(),
            });
        }
        if let StepKind::Pass { outcome } = self.kind {
            if outcome >= self.outputs.len() {
                return Err(WorkplanError::StructuralConfig {
                    step: self.name.clone(),
                    outputs: self.outputs.len(),
                    descriptions: outcome + 1,
                });
            }
        }
        Ok(())
    }

    /// Create the runtime transition for one process run.
    ///
    /// Instantiation only copies wiring and consults the context; it has no side effects.
    pub fn instantiate(&self, context: &dyn WorkplanContext) -> Transition {
        Transition::new(self, context.is_disabled(self))
    }

    pub(crate) fn set_input(
        &mut self,
        slot: usize,
        connector: Option<ConnectorId>,
    ) -> Result<Option<ConnectorId>, WorkplanError> {
        let len = self.inputs.len();
        let entry = self
            .inputs
            .get_mut(slot)
            .ok_or(WorkplanError::SlotOutOfRange {
                step: self.id,
                slot,
                len,
            })?;
        Ok(std::mem::replace(entry, connector))
    }

    pub(crate) fn set_output(
        &mut self,
        slot: usize,
        connector: Option<ConnectorId>,
    ) -> Result<Option<ConnectorId>, WorkplanError> {
        let len = self.outputs.len();
        let entry = self
            .outputs
            .get_mut(slot)
            .ok_or(WorkplanError::SlotOutOfRange {
                step: self.id,
                slot,
                len,
            })?;
        Ok(std::mem::replace(entry, connector))
    }

    pub(crate) fn clear_connector(&mut self, connector: ConnectorId) {
        for slot in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            if *slot == Some(connector) {
                *slot = None;
            }
        }
    }
}

/// Builder for [`Step`]; `build` fails fast on a slot/outcome mismatch.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: String,
    kind: StepKind,
    inputs: Vec<Option<ConnectorId>>,
    outputs: Option<Vec<Option<ConnectorId>>>,
    outcomes: Option<Vec<OutputDescription>>,
    parameters: serde_json::Value,
}

impl StepBuilder {
    fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
            outputs: None,
            outcomes: None,
            parameters: serde_json::Value::Null,
        }
    }

    /// Append an input slot wired to `connector`.
    pub fn input(mut self, connector: ConnectorId) -> Self {
        self.inputs.push(Some(connector));
        self
    }

    /// Replace all input slots.
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = Option<ConnectorId>>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    /// Append an output slot wired to `connector`.
    pub fn output(mut self, connector: ConnectorId) -> Self {
        self.outputs.get_or_insert_with(Vec::new).push(Some(connector));
        self
    }

    /// Replace all output slots.
    pub fn outputs(mut self, outputs: impl IntoIterator<Item = Option<ConnectorId>>) -> Self {
        self.outputs = Some(outputs.into_iter().collect());
        self
    }

    /// Append a declared outcome.
    pub fn outcome(mut self, description: OutputDescription) -> Self {
        self.outcomes.get_or_insert_with(Vec::new).push(description);
        self
    }

    /// Replace all declared outcomes.
    pub fn outcomes(mut self, outcomes: impl IntoIterator<Item = OutputDescription>) -> Self {
        self.outcomes = Some(outcomes.into_iter().collect());
        self
    }

    pub fn parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Assemble the step.
    ///
    /// When only one of outputs and outcomes was declared, the other is derived
    /// from it: missing outputs start unwired, missing outcomes become neutral
    /// `output{i}` descriptions.
    pub fn build(self) -> Result<Step, WorkplanError> {
        let (outputs, output_descriptions) = match (self.outputs, self.outcomes) {
            (Some(outputs), Some(outcomes)) => (outputs, outcomes),
            (Some(outputs), None) => {
                let outcomes = (0..outputs.len())
                    .map(|i| OutputDescription::neutral(format!("output{}", i)))
                    .collect();
                (outputs, outcomes)
            }
            (None, Some(outcomes)) => (vec![None; outcomes.len()], outcomes),
            (None, None) => (Vec::new(), Vec::new()),
        };
        let step = Step {
            id: StepId::default(),
            name: self.name,
            kind: self.kind,
            inputs: self.inputs,
            outputs,
            output_descriptions,
            parameters: self.parameters,
        };
        step.check_structure()?;
        Ok(step)
    }
}
