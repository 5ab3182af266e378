//! Engine configuration.

/// Configuration for [`WorkplanEngine`](crate::engine::WorkplanEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Label attached to the log lines of every instance. Defaults to the workplan name.
    pub instance_name: Option<String>,
    /// Re-check the workplan structure and the single start connector before instantiation.
    pub check_structure: bool,
    /// Hand the tokens left in the graph back in the cancel result.
    pub release_on_cancel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_name: None,
            check_structure: true,
            release_on_cancel: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label used in log lines.
    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Enable or disable the structural check on start.
    pub fn with_check_structure(mut self, check: bool) -> Self {
        self.check_structure = check;
        self
    }

    /// Enable or disable releasing tokens on cancel.
    pub fn with_release_on_cancel(mut self, release: bool) -> Self {
        self.release_on_cancel = release;
        self
    }
}
