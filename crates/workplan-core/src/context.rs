use std::collections::HashSet;

use crate::step::{Step, StepId};

/// Per-execution data consulted by transitions.
pub trait WorkplanContext: Send + Sync {
    /// Whether `step` is skipped in this process run.
    fn is_disabled(&self, step: &Step) -> bool;
}

impl WorkplanContext for () {
    fn is_disabled(&self, _step: &Step) -> bool {
        false
    }
}

/// Context of one production process.
#[derive(Clone, Debug, Default)]
pub struct ProcessContext {
    disabled: HashSet<StepId>,
}

impl ProcessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip `step` in this run.
    pub fn disable(mut self, step: StepId) -> Self {
        self.disabled.insert(step);
        self
    }

    pub fn with_disabled(mut self, steps: impl IntoIterator<Item = StepId>) -> Self {
        self.disabled.extend(steps);
        self
    }
}

impl WorkplanContext for ProcessContext {
    fn is_disabled(&self, step: &Step) -> bool {
        self.disabled.contains(&step.id())
    }
}
