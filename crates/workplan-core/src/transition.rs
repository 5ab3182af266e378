//! Runtime transitions.
//!
//! A [`Transition`] is the per-execution instance of a step. Everything that
//! changes it arrives as a [`TransitionMessage`] in its own inbox, and a single
//! worker drains that inbox, so a transition is serialized against itself only.
//! Two transitions of the same graph never share a lock.
//!
//! A task transition is `Idle` while it buffers no token and `Triggered` while
//! it holds tokens waiting for their activity outcome. Pass, split and join
//! transitions resolve inside the message that fired them and are never
//! observed as `Triggered`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::connector::ConnectorId;
use crate::engine::RuntimeGraph;
use crate::error::WorkplanError;
use crate::events::ProcessEventKind;
use crate::step::{Step, StepId, StepKind};
use crate::token::{Token, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Triggered,
}

pub(crate) enum TransitionMessage {
    /// A token was deposited on one of the transition's input places.
    TokenAdded { place: ConnectorId, token: TokenId },
    /// The activity for a buffered token finished with `outcome`.
    Resume {
        token: TokenId,
        outcome: usize,
        epoch: u64,
        ack: Option<oneshot::Sender<Result<(), WorkplanError>>>,
    },
    /// Makes the worker panic.
    #[cfg(test)]
    Crash,
}

/// What a non-join transition does with a consumed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Consume {
    /// Hold it until the activity reports an outcome.
    Buffer,
    Route(usize),
    /// One child token per output.
    FanOut,
}

pub struct Transition {
    step: StepId,
    name: String,
    kind: StepKind,
    inputs: Vec<Option<ConnectorId>>,
    outputs: Vec<Option<ConnectorId>>,
    skip_output: usize,
    disabled: bool,
    stored: Mutex<Vec<Token>>,
}

impl Transition {
    pub(crate) fn new(step: &Step, disabled: bool) -> Self {
        Self {
            step: step.id(),
            name: step.name.clone(),
            kind: step.kind(),
            inputs: step.inputs().to_vec(),
            outputs: step.outputs().to_vec(),
            skip_output: step.skip_output(),
            disabled,
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn step(&self) -> StepId {
        self.step
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn inputs(&self) -> &[Option<ConnectorId>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Option<ConnectorId>] {
        &self.outputs
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn state(&self) -> TransitionState {
        if self.lock().is_empty() {
            TransitionState::Idle
        } else {
            TransitionState::Triggered
        }
    }

    /// Tokens consumed from an input place and not yet routed.
    pub fn stored_tokens(&self) -> Vec<Token> {
        self.lock().clone()
    }

    pub(crate) fn drain(&self) -> Vec<Token> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Token>> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drain the inbox until the graph is torn down. An error is fatal for the
    /// whole process instance.
    pub(crate) async fn drive(
        self: Arc<Self>,
        graph: Arc<RuntimeGraph>,
        mut inbox: mpsc::UnboundedReceiver<TransitionMessage>,
    ) -> Result<(), WorkplanError> {
        let cancel = graph.cancel_token().clone();
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                message = inbox.recv() => match message {
                    Some(message) => message,
                    None => return Ok(()),
                },
            };
            self.handle(&graph, message)?;
        }
    }

    pub(crate) fn handle(
        &self,
        graph: &RuntimeGraph,
        message: TransitionMessage,
    ) -> Result<(), WorkplanError> {
        match message {
            TransitionMessage::TokenAdded { place, token } => {
                self.input_token_added(graph, place, token)
            }
            TransitionMessage::Resume {
                token,
                outcome,
                epoch,
                ack,
            } => {
                let result = self.resume(graph, token, outcome, epoch);
                if let Some(ack) = ack {
                    let _ = ack.send(result.clone());
                }
                match result {
                    Err(err @ WorkplanError::TransitionFailed { .. }) => Err(err),
                    Err(err) => {
                        warn!(step = %self.step, %token, error = %err, "resume rejected");
                        Ok(())
                    }
                    Ok(()) => Ok(()),
                }
            }
            #[cfg(test)]
            TransitionMessage::Crash => panic!("transition {} crashed", self.step),
        }
    }

    fn input_token_added(
        &self,
        graph: &RuntimeGraph,
        place: ConnectorId,
        token: TokenId,
    ) -> Result<(), WorkplanError> {
        let mut stored = self.lock();
        let action = match self.kind {
            StepKind::Join => return self.try_join(graph, &mut stored),
            StepKind::Task => Consume::Buffer,
            StepKind::Pass { outcome } => Consume::Route(outcome),
            StepKind::Split => Consume::FanOut,
        };
        let Some(token) = graph.place(place)?.remove(token) else {
            trace!(step = %self.step, %place, %token, "token already consumed elsewhere");
            return Ok(());
        };

        if self.disabled && action != Consume::FanOut {
            graph.emit(ProcessEventKind::Skipped {
                step: self.step,
                token: token.id(),
                output: self.skip_output,
            });
            return self.deliver(graph, &mut stored, token, self.skip_output);
        }

        match action {
            Consume::Buffer => {
                let id = token.id();
                stored.push(token);
                debug!(step = %self.step, token = %id, "triggered, awaiting activity outcome");
                graph.emit(ProcessEventKind::Triggered {
                    ticket: graph.ticket(self.step, id),
                });
                Ok(())
            }
            Consume::Route(outcome) => self.deliver(graph, &mut stored, token, outcome),
            Consume::FanOut => {
                if let Err(err) = (0..self.outputs.len()).try_for_each(|i| self.target(i).map(drop)) {
                    stored.push(token);
                    return Err(err);
                }
                for index in 0..self.outputs.len() {
                    self.deliver(graph, &mut stored, Token::split_from(&token), index)?;
                }
                Ok(())
            }
        }
    }

    /// Fire once every input place holds a token per slot reading from it.
    /// Places are locked in id order.
    fn try_join(&self, graph: &RuntimeGraph, stored: &mut Vec<Token>) -> Result<(), WorkplanError> {
        let mut required: BTreeMap<ConnectorId, usize> = BTreeMap::new();
        for slot in &self.inputs {
            match slot {
                Some(connector) => *required.entry(*connector).or_default() += 1,
                None => return Ok(()),
            }
        }
        let places = required
            .iter()
            .map(|(c, n)| graph.place(*c).map(|p| (p, *n)))
            .collect::<Result<Vec<_>, _>>()?;

        let consumed = {
            let mut guards: Vec<_> = places.iter().map(|(p, n)| (p.lock(), *n)).collect();
            if guards.iter().any(|(g, n)| g.len() < *n) {
                return Ok(());
            }
            guards
                .iter_mut()
                .flat_map(|(g, n)| g.drain(..*n).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        let merged = Token::joined(&consumed);
        debug!(step = %self.step, token = %merged.id(), parents = consumed.len(), "joined");
        self.deliver(graph, stored, merged, 0)
    }

    fn resume(
        &self,
        graph: &RuntimeGraph,
        token: TokenId,
        outcome: usize,
        epoch: u64,
    ) -> Result<(), WorkplanError> {
        if epoch != graph.epoch() {
            return Err(WorkplanError::Cancelled);
        }
        if outcome >= self.outputs.len() {
            return Err(WorkplanError::InvalidOutcome {
                step: self.step,
                outcome,
                outputs: self.outputs.len(),
            });
        }
        let mut stored = self.lock();
        let index = stored
            .iter()
            .position(|t| t.id() == token)
            .ok_or(WorkplanError::NotTriggered {
                step: self.step,
                token,
            })?;
        let token = stored.remove(index);
        graph.emit(ProcessEventKind::Resumed {
            step: self.step,
            token: token.id(),
            outcome,
        });
        self.deliver(graph, &mut stored, token, outcome)
    }

    fn target(&self, output: usize) -> Result<ConnectorId, WorkplanError> {
        match self.outputs.get(output) {
            Some(Some(connector)) => Ok(*connector),
            _ => Err(WorkplanError::TransitionFailed {
                step: self.step,
                reason: format!("output {} is not wired", output),
            }),
        }
    }

    /// Put `token` on output `output`. On failure the token stays buffered so
    /// teardown can release it.
    fn deliver(
        &self,
        graph: &RuntimeGraph,
        stored: &mut Vec<Token>,
        token: Token,
        output: usize,
    ) -> Result<(), WorkplanError> {
        let place = match self.target(output).and_then(|c| graph.place(c)) {
            Ok(place) => place,
            Err(err) => {
                stored.push(token);
                return Err(err);
            }
        };
        let id = token.id();
        debug!(step = %self.step, token = %id, place = %place.connector(), "token routed");
        graph.emit(ProcessEventKind::TokenPlaced {
            place: place.connector(),
            token: id,
        });
        place.add(token);
        Ok(())
    }
}
