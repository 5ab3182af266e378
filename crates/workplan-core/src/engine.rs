//! The engine driver.
//!
//! [`WorkplanEngine::start`] turns one static [`Workplan`] into a private
//! runtime graph: a [`Place`] per connector, a [`Transition`] per step and one
//! worker task per transition draining that transition's inbox. A supervisor
//! task waits for the first exit token, a transition failure or a cancel
//! request, then tears the graph down.
//!
//! Teardown bumps the epoch and cancels the workers before any buffered token
//! is released, so a late activity callback finds a stale ticket instead of a
//! half-dismantled graph.

use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::activity::ActivityDispatcher;
use crate::config::EngineConfig;
use crate::connector::ConnectorId;
use crate::context::WorkplanContext;
use crate::error::WorkplanError;
use crate::events::{ActivityTicket, Marking, ProcessEvent, ProcessEventKind, ProcessResult};
use crate::place::{Place, PlaceListener};
use crate::step::StepId;
use crate::token::{Token, TokenId};
use crate::transition::{Transition, TransitionMessage, TransitionState};
use crate::workplan::Workplan;

pub(crate) enum DriverMessage {
    ExitReached { place: ConnectorId, token: TokenId },
    TransitionFailed { step: StepId, reason: String },
    Cancel,
}

/// Places and transitions of one process instance.
pub(crate) struct RuntimeGraph {
    instance: Uuid,
    places: HashMap<ConnectorId, Place>,
    transitions: HashMap<StepId, Arc<Transition>>,
    inboxes: HashMap<StepId, mpsc::UnboundedSender<TransitionMessage>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    driver: mpsc::UnboundedSender<DriverMessage>,
    epoch: AtomicU64,
    cancel: CancellationToken,
}

impl RuntimeGraph {
    pub(crate) fn place(&self, connector: ConnectorId) -> Result<&Place, WorkplanError> {
        self.places
            .get(&connector)
            .ok_or(WorkplanError::UnknownConnector(connector))
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn ticket(&self, step: StepId, token: TokenId) -> ActivityTicket {
        ActivityTicket {
            instance: self.instance,
            step,
            token,
            epoch: self.epoch(),
        }
    }

    pub(crate) fn emit(&self, kind: ProcessEventKind) {
        let _ = self.events.send(ProcessEvent {
            instance: self.instance,
            at: chrono::Utc::now(),
            kind,
        });
    }

    /// Detach every outstanding ticket and stop the workers.
    fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Places and buffers are read one lock at a time, so a token moving during
    /// the read may be missed or counted twice. Exact while the instance is idle.
    fn marking(&self) -> Marking {
        let places = self
            .places
            .iter()
            .map(|(id, place)| (*id, place.tokens().iter().map(Token::id).collect::<Vec<_>>()))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        let buffered = self
            .transitions
            .iter()
            .map(|(id, t)| (*id, t.stored_tokens().iter().map(Token::id).collect::<Vec<_>>()))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        Marking { places, buffered }
    }

    /// Take every token out of the graph. Only valid once the workers stopped.
    fn release(&self) -> Vec<Token> {
        let mut released: Vec<Token> = self.transitions.values().flat_map(|t| t.drain()).collect();
        released.extend(self.places.values().flat_map(Place::drain));
        released
    }
}

/// Starts process instances from workplans.
#[derive(Debug, Clone, Default)]
pub struct WorkplanEngine {
    config: EngineConfig,
}

impl WorkplanEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Instantiate `workplan` for one process run and seed the start token.
    ///
    /// Must be called from within a tokio runtime. The returned handle is the
    /// only way to observe and resume the instance.
    #[tracing::instrument(skip_all, fields(workplan = %workplan.name))]
    pub fn start(
        &self,
        workplan: &Workplan,
        context: &dyn WorkplanContext,
    ) -> Result<ProcessHandle, WorkplanError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WorkplanError::Generic(format!("no tokio runtime: {}", e)))?;
        if self.config.check_structure {
            workplan.check_structure()?;
        }
        let start = workplan
            .start_connector()
            .map(|c| c.id())
            .ok_or(WorkplanError::MissingStart)?;

        let instance = Uuid::new_v4();
        let label = self
            .config
            .instance_name
            .clone()
            .unwrap_or_else(|| workplan.name.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();

        let mut transitions = HashMap::new();
        let mut inboxes = HashMap::new();
        let mut receivers = Vec::new();
        for step in workplan.steps() {
            let (tx, rx) = mpsc::unbounded_channel();
            transitions.insert(step.id(), Arc::new(step.instantiate(context)));
            inboxes.insert(step.id(), tx);
            receivers.push((step.id(), rx));
        }

        let places = workplan
            .connectors()
            .map(|connector| {
                let mut consumers: Vec<StepId> = workplan
                    .consumers_of(connector.id())
                    .into_iter()
                    .map(|(step, _)| step)
                    .collect();
                consumers.dedup();
                let mut listeners: Vec<PlaceListener> = consumers
                    .iter()
                    .filter_map(|step| inboxes.get(step).cloned())
                    .map(PlaceListener::Transition)
                    .collect();
                if connector.is_exit() {
                    listeners.push(PlaceListener::Exit(driver_tx.clone()));
                }
                let place =
                    Place::with_listeners(connector.id(), connector.classification, listeners);
                (connector.id(), place)
            })
            .collect();

        let graph = Arc::new(RuntimeGraph {
            instance,
            places,
            transitions,
            inboxes,
            events: events_tx,
            driver: driver_tx.clone(),
            epoch: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        });

        let workers = receivers
            .into_iter()
            .filter_map(|(step, inbox)| {
                let transition = graph.transitions.get(&step)?.clone();
                let span = info_span!("transition", instance = %label, %step);
                Some(runtime.spawn(run_worker(transition, graph.clone(), inbox).instrument(span)))
            })
            .collect::<Vec<_>>();

        let (result_tx, result_rx) = watch::channel(None);
        runtime.spawn(
            supervise(
                graph.clone(),
                driver_rx,
                workers,
                result_tx,
                self.config.release_on_cancel,
            )
            .instrument(info_span!("process", instance = %label)),
        );

        info!(%instance, %start, "process started");
        graph.emit(ProcessEventKind::Started { start });
        let token = Token::start();
        graph.emit(ProcessEventKind::TokenPlaced {
            place: start,
            token: token.id(),
        });
        graph.place(start)?.add(token);

        Ok(ProcessHandle {
            instance,
            graph,
            events: events_rx,
            driver: driver_tx,
            result: result_rx,
            finished: false,
        })
    }

    /// Run an instance to its end, handing every triggered task to `dispatcher`.
    #[tracing::instrument(skip_all, fields(workplan = %workplan.name))]
    pub async fn run<D>(
        &self,
        workplan: &Workplan,
        context: &dyn WorkplanContext,
        dispatcher: &D,
    ) -> Result<ProcessResult, WorkplanError>
    where
        D: ActivityDispatcher + ?Sized,
    {
        let mut handle = self.start(workplan, context)?;
        while let Some(event) = handle.next_event().await {
            let ProcessEventKind::Triggered { ticket } = event.kind else {
                continue;
            };
            let step = workplan
                .step(ticket.step)
                .ok_or(WorkplanError::UnknownStep(ticket.step))?;
            let resumed = match dispatcher.dispatch(step, &ticket).await {
                Ok(outcome) => handle.resume(&ticket, outcome),
                Err(err) => Err(err),
            };
            if let Err(err) = resumed {
                warn!(step = %ticket.step, error = %err, "activity failed");
                handle.report_failure(ticket.step, err.to_string());
            }
        }
        Ok(handle.wait().await)
    }
}

async fn run_worker(
    transition: Arc<Transition>,
    graph: Arc<RuntimeGraph>,
    inbox: mpsc::UnboundedReceiver<TransitionMessage>,
) {
    let step = transition.step();
    let outcome = AssertUnwindSafe(transition.drive(graph.clone(), inbox))
        .catch_unwind()
        .await;
    let reason = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(_) => "transition worker panicked".to_string(),
    };
    error!(%step, %reason, "transition failed");
    let _ = graph
        .driver
        .send(DriverMessage::TransitionFailed { step, reason });
}

async fn supervise(
    graph: Arc<RuntimeGraph>,
    mut driver: mpsc::UnboundedReceiver<DriverMessage>,
    workers: Vec<JoinHandle<()>>,
    result: watch::Sender<Option<ProcessResult>>,
    release_on_cancel: bool,
) {
    let outcome = match driver.recv().await {
        Some(DriverMessage::ExitReached { place, token }) => {
            let classification = graph.place(place).map(Place::classification);
            match classification {
                Ok(classification) => ProcessResult::Completed {
                    end: place,
                    classification,
                    token,
                },
                Err(err) => ProcessResult::Failed {
                    step: None,
                    reason: err.to_string(),
                },
            }
        }
        Some(DriverMessage::TransitionFailed { step, reason }) => ProcessResult::Failed {
            step: Some(step),
            reason,
        },
        Some(DriverMessage::Cancel) => ProcessResult::Cancelled {
            released: Vec::new(),
        },
        None => ProcessResult::Failed {
            step: None,
            reason: "driver channel closed".to_string(),
        },
    };

    graph.invalidate();
    for worker in workers {
        if let Err(err) = worker.await {
            warn!(error = %err, "transition worker did not stop cleanly");
        }
    }

    let outcome = match outcome {
        ProcessResult::Cancelled { .. } if release_on_cancel => ProcessResult::Cancelled {
            released: graph.release(),
        },
        other => other,
    };
    let terminal = match &outcome {
        ProcessResult::Completed { end, token, .. } => ProcessEventKind::Completed {
            end: *end,
            token: *token,
        },
        ProcessResult::Failed { step, reason } => ProcessEventKind::Failed {
            step: *step,
            reason: reason.clone(),
        },
        ProcessResult::Cancelled { released } => ProcessEventKind::Cancelled {
            released: released.len(),
        },
    };
    info!(?terminal, "process finished");
    graph.emit(terminal);
    let _ = result.send(Some(outcome));
}

/// Handle to one running process instance.
pub struct ProcessHandle {
    instance: Uuid,
    graph: Arc<RuntimeGraph>,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    driver: mpsc::UnboundedSender<DriverMessage>,
    result: watch::Receiver<Option<ProcessResult>>,
    finished: bool,
}

impl ProcessHandle {
    pub fn id(&self) -> Uuid {
        self.instance
    }

    /// Next event of the instance, `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await?;
        if event.kind.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    /// Report the outcome of a triggered task without waiting for it to be routed.
    pub fn resume(&self, ticket: &ActivityTicket, outcome: usize) -> Result<(), WorkplanError> {
        let inbox = self.check_ticket(ticket, outcome)?;
        inbox
            .send(TransitionMessage::Resume {
                token: ticket.token,
                outcome,
                epoch: ticket.epoch,
                ack: None,
            })
            .map_err(|_| WorkplanError::Cancelled)
    }

    /// Report the outcome of a triggered task and wait until the token was routed.
    pub async fn resume_async(
        &self,
        ticket: &ActivityTicket,
        outcome: usize,
    ) -> Result<(), WorkplanError> {
        let inbox = self.check_ticket(ticket, outcome)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        inbox
            .send(TransitionMessage::Resume {
                token: ticket.token,
                outcome,
                epoch: ticket.epoch,
                ack: Some(ack_tx),
            })
            .map_err(|_| WorkplanError::Cancelled)?;
        ack_rx.await.map_err(|_| WorkplanError::Cancelled)?
    }

    fn check_ticket(
        &self,
        ticket: &ActivityTicket,
        outcome: usize,
    ) -> Result<&mpsc::UnboundedSender<TransitionMessage>, WorkplanError> {
        if ticket.instance != self.instance {
            return Err(WorkplanError::Generic(format!(
                "ticket belongs to instance {}",
                ticket.instance
            )));
        }
        if ticket.epoch != self.graph.epoch() || !self.graph.is_live() {
            warn!(step = %ticket.step, token = %ticket.token, "late activity callback ignored");
            return Err(WorkplanError::Cancelled);
        }
        let transition = self
            .graph
            .transitions
            .get(&ticket.step)
            .ok_or(WorkplanError::UnknownStep(ticket.step))?;
        if outcome >= transition.outputs().len() {
            return Err(WorkplanError::InvalidOutcome {
                step: ticket.step,
                outcome,
                outputs: transition.outputs().len(),
            });
        }
        self.graph
            .inboxes
            .get(&ticket.step)
            .ok_or(WorkplanError::UnknownStep(ticket.step))
    }

    /// Fail the instance on behalf of the activity layer.
    pub fn report_failure(&self, step: StepId, reason: impl Into<String>) {
        let _ = self.driver.send(DriverMessage::TransitionFailed {
            step,
            reason: reason.into(),
        });
    }

    /// Request teardown. Outstanding tickets become invalid.
    pub fn cancel(&self) {
        let _ = self.driver.send(DriverMessage::Cancel);
    }

    /// Wait for the instance to finish.
    pub async fn wait(&self) -> ProcessResult {
        let mut result = self.result.clone();
        let outcome = match result.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(ProcessResult::Failed {
                step: None,
                reason: "missing result".to_string(),
            }),
            Err(_) => ProcessResult::Failed {
                step: None,
                reason: "supervisor stopped without a result".to_string(),
            },
        };
        outcome
    }

    pub fn is_finished(&self) -> bool {
        self.result.borrow().is_some()
    }

    /// Tokens per place and per transition buffer. Not atomic across places:
    /// only exact while no transition is moving a token, e.g. when every live
    /// token waits on an activity.
    pub fn snapshot(&self) -> Marking {
        self.graph.marking()
    }

    pub fn transition_state(&self, step: StepId) -> Option<TransitionState> {
        self.graph.transitions.get(&step).map(|t| t.state())
    }

    /// Buffered tokens of every transition currently waiting for an activity.
    pub fn triggered(&self) -> BTreeMap<StepId, Vec<TokenId>> {
        self.graph.marking().buffered
    }

    #[cfg(test)]
    pub(crate) fn crash(&self, step: StepId) {
        if let Some(inbox) = self.graph.inboxes.get(&step) {
            let _ = inbox.send(TransitionMessage::Crash);
        }
    }

    #[cfg(test)]
    pub(crate) fn graph_weak(&self) -> std::sync::Weak<RuntimeGraph> {
        Arc::downgrade(&self.graph)
    }
}

/// The handle is the only way to resume or cancel an instance, so dropping it
/// tears the instance down. A no-op once the instance has finished.
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.result.borrow().is_none() {
            debug!(instance = %self.instance, "process handle dropped, cancelling");
            let _ = self.driver.send(DriverMessage::Cancel);
        }
    }
}
