//! Static validation of workplans.
//!
//! Each aspect is an independent pass over the static graph. [`Validator`]
//! runs every requested pass, never stopping at the first failing one, and
//! returns the defects as data. Whether a defect blocks publishing is up to
//! the caller.
//!
//! ```rust
//! use workplan_core::{NodeClassification, Workplan};
//! use workplan_validation::{ValidationAspects, Validator};
//!
//! let mut workplan = Workplan::new("empty");
//! workplan.add_connector("Start", NodeClassification::Start).unwrap();
//! let result = Validator::with_default_validators()
//!     .validate(&workplan, ValidationAspects::LUCKY_STREAK);
//! assert!(!result.is_success());
//! ```

pub mod aspects;
pub mod dead_end;
mod graph;
pub mod infinite_loop;
pub mod lone_wolf;
pub mod lucky_streak;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use workplan_core::{ConnectorId, StepId, Workplan};

pub use aspects::ValidationAspects;
pub use dead_end::DeadEndValidator;
pub use infinite_loop::InfiniteLoopValidator;
pub use lone_wolf::LoneWolfValidator;
pub use lucky_streak::LuckyStreakValidator;

/// The element a defect is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionId {
    Connector(ConnectorId),
    Step(StepId),
    /// The defect concerns the workplan as a whole.
    Workplan,
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionId::Connector(id) => write!(f, "{}", id),
            PositionId::Step(id) => write!(f, "{}", id),
            PositionId::Workplan => f.write_str("workplan"),
        }
    }
}

/// One defect found by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub aspect: ValidationAspects,
    pub position: PositionId,
    pub message: String,
}

impl ValidationError {
    pub fn new(aspect: ValidationAspects, position: PositionId, message: impl Into<String>) -> Self {
        Self {
            aspect,
            position,
            message: message.into(),
        }
    }

    /// Render the defect with the name of the element it points at.
    pub fn print(&self, workplan: &Workplan) -> String {
        let element = match self.position {
            PositionId::Connector(id) => match workplan.connector(id) {
                Some(connector) => format!("connector '{}' ({})", connector.name, id),
                None => format!("connector {}", id),
            },
            PositionId::Step(id) => match workplan.step(id) {
                Some(step) => format!("step '{}' ({})", step.name, id),
                None => format!("step {}", id),
            },
            PositionId::Workplan => format!("workplan '{}'", workplan.name),
        };
        format!("{}: {} {}", self.aspect, element, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Defects of one aspect.
    pub fn errors_for(&self, aspect: ValidationAspects) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.aspect == aspect)
    }
}

/// A single validation pass.
pub trait WorkplanValidator: Send + Sync {
    /// The aspect flag that selects this pass.
    fn aspect(&self) -> ValidationAspects;

    /// Inspect the workplan. Must not have side effects.
    fn validate(&self, workplan: &Workplan) -> Vec<ValidationError>;
}

/// An explicit list of passes.
pub struct Validator {
    validators: Vec<Box<dyn WorkplanValidator>>,
}

impl Validator {
    pub fn new(validators: Vec<Box<dyn WorkplanValidator>>) -> Self {
        Self { validators }
    }

    /// All four built-in passes.
    pub fn with_default_validators() -> Self {
        Self::new(vec![
            Box::new(DeadEndValidator),
            Box::new(InfiniteLoopValidator),
            Box::new(LuckyStreakValidator),
            Box::new(LoneWolfValidator),
        ])
    }

    pub fn push(&mut self, validator: Box<dyn WorkplanValidator>) {
        self.validators.push(validator);
    }

    /// Run every pass whose aspect is requested and concatenate the defects.
    pub fn validate(&self, workplan: &Workplan, aspects: ValidationAspects) -> ValidationResult {
        let mut errors = Vec::new();
        for validator in &self.validators {
            if !aspects.intersects(validator.aspect()) {
                continue;
            }
            let found = validator.validate(workplan);
            debug!(aspect = %validator.aspect(), defects = found.len(), workplan = %workplan.name, "validation pass finished");
            errors.extend(found);
        }
        ValidationResult {
            success: errors.is_empty(),
            errors,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::with_default_validators()
    }
}

/// Validate with the built-in passes.
pub fn validate(workplan: &Workplan, aspects: ValidationAspects) -> ValidationResult {
    Validator::with_default_validators().validate(workplan, aspects)
}
