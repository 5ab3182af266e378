//! Runtime places.
//!
//! A [`Place`] is the per-execution counterpart of a connector. It owns the
//! tokens resting on it and notifies its consumers while still holding its
//! lock, so observing a token and being told about it cannot be torn apart.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::trace;

use crate::connector::{ConnectorId, NodeClassification};
use crate::engine::DriverMessage;
use crate::token::{Token, TokenId};
use crate::transition::TransitionMessage;

/// Who is told when a token arrives.
pub(crate) enum PlaceListener {
    /// Inbox of a transition reading from this place.
    Transition(mpsc::UnboundedSender<TransitionMessage>),
    /// The engine driver, for exit places.
    Exit(mpsc::UnboundedSender<DriverMessage>),
}

impl PlaceListener {
    fn notify(&self, place: ConnectorId, token: TokenId) {
        let delivered = match self {
            PlaceListener::Transition(inbox) => inbox
                .send(TransitionMessage::TokenAdded { place, token })
                .is_ok(),
            PlaceListener::Exit(driver) => driver
                .send(DriverMessage::ExitReached { place, token })
                .is_ok(),
        };
        if !delivered {
            trace!(%place, %token, "listener already detached");
        }
    }
}

pub struct Place {
    connector: ConnectorId,
    classification: NodeClassification,
    tokens: Mutex<Vec<Token>>,
    listeners: Vec<PlaceListener>,
}

impl Place {
    /// A place nobody listens to.
    pub fn new(connector: ConnectorId, classification: NodeClassification) -> Self {
        Self::with_listeners(connector, classification, Vec::new())
    }

    pub(crate) fn with_listeners(
        connector: ConnectorId,
        classification: NodeClassification,
        listeners: Vec<PlaceListener>,
    ) -> Self {
        Self {
            connector,
            classification,
            tokens: Mutex::new(Vec::new()),
            listeners,
        }
    }

    pub fn connector(&self) -> ConnectorId {
        self.connector
    }

    pub fn classification(&self) -> NodeClassification {
        self.classification
    }

    /// Deposit a token and notify every listener.
    pub fn add(&self, token: Token) {
        let mut tokens = self.lock();
        let id = token.id();
        tokens.push(token);
        for listener in &self.listeners {
            listener.notify(self.connector, id);
        }
    }

    /// Take the token out of this place. Of several concurrent callers for the
    /// same token exactly one receives it.
    pub fn remove(&self, token: TokenId) -> Option<Token> {
        let mut tokens = self.lock();
        let index = tokens.iter().position(|t| t.id() == token)?;
        Some(tokens.remove(index))
    }

    /// Snapshot of the tokens currently resting here.
    pub fn tokens(&self) -> Vec<Token> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<Token> {
        std::mem::take(&mut *self.lock())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Token>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
