use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub Uuid);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a token came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenOrigin {
    /// Seeded on the start connector.
    Start,
    /// Created by a split from its parent.
    Split { parent: TokenId },
    /// Created by a join from all consumed tokens.
    Join { parents: Vec<TokenId> },
}

/// A unit of flow. Owned by exactly one place or one transition buffer at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    id: TokenId,
    origin: TokenOrigin,
}

impl Token {
    fn with_origin(origin: TokenOrigin) -> Self {
        Self {
            id: TokenId(Uuid::new_v4()),
            origin,
        }
    }

    pub fn start() -> Self {
        Self::with_origin(TokenOrigin::Start)
    }

    pub fn split_from(parent: &Token) -> Self {
        Self::with_origin(TokenOrigin::Split { parent: parent.id })
    }

    pub fn joined(parents: &[Token]) -> Self {
        Self::with_origin(TokenOrigin::Join {
            parents: parents.iter().map(|t| t.id).collect(),
        })
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn origin(&self) -> &TokenOrigin {
        &self.origin
    }
}
