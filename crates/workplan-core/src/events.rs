//! Observable output of a running process instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::connector::{ConnectorId, NodeClassification};
use crate::step::StepId;
use crate::token::{Token, TokenId};

/// Handed to the activity layer when a task transition is triggered.
///
/// The ticket is the only way to resume the transition. It is bound to the
/// instance and to the epoch it was issued in, so a callback arriving after the
/// instance was torn down is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTicket {
    pub instance: Uuid,
    pub step: StepId,
    pub token: TokenId,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessEventKind {
    Started { start: ConnectorId },
    TokenPlaced { place: ConnectorId, token: TokenId },
    /// A task consumed a token and waits for its activity.
    Triggered { ticket: ActivityTicket },
    Resumed { step: StepId, token: TokenId, outcome: usize },
    /// A disabled step routed a token without running.
    Skipped { step: StepId, token: TokenId, output: usize },
    Completed { end: ConnectorId, token: TokenId },
    Failed { step: Option<StepId>, reason: String },
    Cancelled { released: usize },
}

impl ProcessEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessEventKind::Completed { .. }
                | ProcessEventKind::Failed { .. }
                | ProcessEventKind::Cancelled { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub instance: Uuid,
    pub at: DateTime<Utc>,
    pub kind: ProcessEventKind,
}

/// Final state of a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessResult {
    /// A token reached an exit connector.
    Completed {
        end: ConnectorId,
        classification: NodeClassification,
        token: TokenId,
    },
    /// A transition failed or the activity layer reported a failure.
    Failed {
        step: Option<StepId>,
        reason: String,
    },
    /// The instance was cancelled; tokens still in the graph are handed back.
    Cancelled { released: Vec<Token> },
}

impl ProcessResult {
    /// Completed on a regular `End` connector.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ProcessResult::Completed {
                classification: NodeClassification::End,
                ..
            }
        )
    }
}

/// Where the tokens of an instance are at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marking {
    pub places: BTreeMap<ConnectorId, Vec<TokenId>>,
    pub buffered: BTreeMap<StepId, Vec<TokenId>>,
}

impl Marking {
    pub fn token_count(&self) -> usize {
        self.places.values().map(Vec::len).sum::<usize>()
            + self.buffered.values().map(Vec::len).sum::<usize>()
    }

    pub fn tokens_at(&self, place: ConnectorId) -> &[TokenId] {
        self.places.get(&place).map(Vec::as_slice).unwrap_or(&[])
    }
}
