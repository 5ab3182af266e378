//! Connectors are the places of a workplan: the nodes tokens rest on between steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a connector, unique within its owning workplan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(pub u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Role of a connector inside the recipe graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClassification {
    /// Entry connector; the engine seeds the start token here.
    Start,
    /// Regular exit of the recipe.
    End,
    /// Exit reached when production failed.
    Failed,
    Intermediate,
}

impl NodeClassification {
    pub fn is_entry(self) -> bool {
        matches!(self, NodeClassification::Start)
    }

    /// Both regular and failure exits terminate a process.
    pub fn is_exit(self) -> bool {
        matches!(self, NodeClassification::End | NodeClassification::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub(crate) id: ConnectorId,
    pub name: String,
    pub classification: NodeClassification,
}

impl Connector {
    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn is_entry(&self) -> bool {
        self.classification.is_entry()
    }

    pub fn is_exit(&self) -> bool {
        self.classification.is_exit()
    }
}
