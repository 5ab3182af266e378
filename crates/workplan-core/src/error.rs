use thiserror::Error;

use crate::connector::ConnectorId;
use crate::step::StepId;
use crate::token::TokenId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkplanError {
    /// A step declares a different number of outcomes than it has output slots.
    #[error("Step '{step}' declares {descriptions} outcomes but has {outputs} outputs")]
    StructuralConfig {
        step: String,
        outputs: usize,
        descriptions: usize,
    },
    #[error("Connector {0} is not part of this workplan")]
    UnknownConnector(ConnectorId),
    #[error("Step {0} is not part of this workplan")]
    UnknownStep(StepId),
    #[error("Slot {slot} is out of range for step {step} ({len} slots)")]
    SlotOutOfRange { step: StepId, slot: usize, len: usize },
    #[error("Workplan has no start connector")]
    MissingStart,
    #[error("Workplan already has a start connector")]
    MultipleStarts,
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
    /// An outcome index outside the step's outputs was reported.
    #[error("Outcome {outcome} is invalid for step {step} ({outputs} outputs)")]
    InvalidOutcome {
        step: StepId,
        outcome: usize,
        outputs: usize,
    },
    /// A resume was addressed to a token the transition does not hold.
    #[error("Step {step} holds no token {token}")]
    NotTriggered { step: StepId, token: TokenId },
    /// The process instance was cancelled or has already been torn down.
    #[error("Process instance cancelled")]
    Cancelled,
    #[error("Process instance already completed")]
    AlreadyCompleted,
    #[error("Transition of step {step} failed: {reason}")]
    TransitionFailed { step: StepId, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<serde_json::Error> for WorkplanError {
    fn from(err: serde_json::Error) -> Self {
        WorkplanError::Serialization(err.to_string())
    }
}
