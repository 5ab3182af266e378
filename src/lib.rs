//! # Workplan - Petri-net process recipes in Rust
//!
//! A workplan describes a manufacturing recipe as a directed graph of
//! connectors (places) and steps (transitions). Flow tokens move through a
//! per-instance runtime graph, pausing at every task until the production
//! activity behind it reports an outcome.
//!
//! ## Features
//!
//! - Core functionality (graph model, runtime and engine) is always included
//! - `validation`: static DeadEnd, LoneWolf, InfiniteLoop and LuckyStreak passes
//! - `editing`: invariant-preserving interactive editing session
//! - `full`: enables all features
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! workplan = { version = "0.4.0", features = ["full"] }
//! ```

/// Initialize the framework with default settings.
///
/// This installs a `tracing` subscriber so engine and editing logs show up.
pub fn init() {
    tracing_subscriber::fmt::init();
}

// Re-export the core module (always included)
pub use workplan_core as core;

#[cfg(feature = "validation")]
pub use workplan_validation as validation;

#[cfg(feature = "editing")]
pub use workplan_editing as editing;

pub use workplan_core::{
    ActivityDispatcher, EngineConfig, NodeClassification, ProcessResult, Step, StepKind,
    Workplan, WorkplanEngine, WorkplanError,
};
