use async_trait::async_trait;

use crate::error::WorkplanError;
use crate::events::ActivityTicket;
use crate::step::Step;

/// The seam toward real production activities.
///
/// The engine hands every triggered task to the dispatcher and resumes the
/// transition with the returned outcome index. An error fails the process.
#[async_trait]
pub trait ActivityDispatcher: Send + Sync {
    async fn dispatch(&self, step: &Step, ticket: &ActivityTicket) -> Result<usize, WorkplanError>;
}

/// Resolves every activity with the outcome of the given name, falling back to outcome 0.
#[derive(Debug, Clone)]
pub struct FixedOutcome(pub String);

#[async_trait]
impl ActivityDispatcher for FixedOutcome {
    async fn dispatch(
        &self,
        step: &Step,
        _ticket: &ActivityTicket,
    ) -> Result<usize, WorkplanError> {
        Ok(step.outcome_index(&self.0).unwrap_or(0))
    }
}
