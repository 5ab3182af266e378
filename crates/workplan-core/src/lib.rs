//! Core of the workplan engine.
//!
//! A [`Workplan`] is a Petri net of [`Connector`]s (places) and [`Step`]s
//! (transition templates). [`WorkplanEngine`] instantiates it once per process
//! run and moves tokens from the start connector towards an exit while the
//! activity layer resumes triggered tasks.

pub mod activity;
pub mod config;
pub mod connector;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod place;
pub mod step;
pub mod token;
pub mod transition;
pub mod workplan;

#[cfg(test)]
mod tests;

pub use activity::{ActivityDispatcher, FixedOutcome};
pub use config::EngineConfig;
pub use connector::{Connector, ConnectorId, NodeClassification};
pub use context::{ProcessContext, WorkplanContext};
pub use engine::{ProcessHandle, WorkplanEngine};
pub use error::WorkplanError;
pub use events::{ActivityTicket, Marking, ProcessEvent, ProcessEventKind, ProcessResult};
pub use place::Place;
pub use step::{OutputDescription, OutputType, Step, StepBuilder, StepId, StepKind};
pub use token::{Token, TokenId, TokenOrigin};
pub use transition::{Transition, TransitionState};
pub use workplan::{Workplan, WorkplanState};
