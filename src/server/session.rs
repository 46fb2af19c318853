//! Session actor.
//!
//! Each session runs as one tokio task that owns its [`BoltStateMachine`]
//! and processes requests from a bounded queue in arrival order. Interrupts
//! and termination requests bypass the queue and go straight to the shared
//! [`ConnectionSignals`], so they take effect ahead of requests already
//! queued.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bolt::{BoltConnectionFatality, BoltRequest, BoltResponse};

use super::config::BoltServerConfig;
use super::connection_state::ConnectionSignals;
use super::handler::ResponseCollector;
use super::state_machine::BoltStateMachine;

/// Errors returned by [`SessionHandle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session task has ended.
    #[error("Session {0} is closed")]
    Closed(String),
}

/// Responses produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// RECORD messages followed by exactly one summary message
    pub responses: Vec<BoltResponse>,
    /// Set when the connection must be torn down; the session has ended
    pub fatality: Option<BoltConnectionFatality>,
}

impl ProcessOutcome {
    /// Whether the request ended the session.
    pub fn is_fatal(&self) -> bool {
        self.fatality.is_some()
    }

    /// The summary message (SUCCESS, FAILURE or IGNORED).
    pub fn summary(&self) -> Option<&BoltResponse> {
        self.responses.last()
    }
}

enum SessionCommand {
    Process {
        request: BoltRequest,
        reply: oneshot::Sender<ProcessOutcome>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Spawns session tasks.
pub struct BoltSession;

impl BoltSession {
    /// Move `machine` into a new task. Must be called within a tokio
    /// runtime.
    pub fn spawn(machine: BoltStateMachine, config: &BoltServerConfig) -> SessionHandle {
        let (commands, inbox) = mpsc::channel(config.inbound_queue_size.max(1));
        let id: Arc<str> = Arc::from(machine.id());
        let signals = machine.signals();

        let task = tokio::spawn(run_session(machine, inbox));

        SessionHandle {
            id,
            commands,
            signals,
            task: Arc::new(parking_lot::Mutex::new(Some(task))),
        }
    }
}

async fn run_session(mut machine: BoltStateMachine, mut inbox: mpsc::Receiver<SessionCommand>) {
    let mut collector = ResponseCollector::new();

    while let Some(command) = inbox.recv().await {
        match command {
            SessionCommand::Process { request, reply } => {
                let fatality = machine.process(&request, &mut collector).err();
                let finished = fatality.is_some() || machine.is_closed();
                if let Some(fatality) = &fatality {
                    warn!(connection_id = %machine.id(), "Closing session: {}", fatality);
                }

                let outcome = ProcessOutcome {
                    responses: collector.take_responses(),
                    fatality,
                };
                if reply.send(outcome).is_err() {
                    debug!(connection_id = %machine.id(), "Caller went away before the reply");
                }
                if finished {
                    break;
                }
            }
            SessionCommand::Close { reply } => {
                machine.close();
                let _ = reply.send(());
                break;
            }
        }
    }

    machine.close();
    debug!(connection_id = %machine.id(), "Session task finished");
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    commands: mpsc::Sender<SessionCommand>,
    signals: Arc<ConnectionSignals>,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    /// Connection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue `request` and wait for its responses.
    pub async fn process(&self, request: BoltRequest) -> Result<ProcessOutcome, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Process { request, reply })
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    /// Interrupt the session. Takes effect on the next request processed,
    /// even if others are queued ahead of it.
    pub fn interrupt(&self) {
        self.signals.interrupt();
    }

    /// Ask the session to close on its next request.
    pub fn mark_for_termination(&self) {
        self.signals.mark_for_termination();
    }

    /// Close the session and wait for its task to finish. Closing an
    /// already closed session does nothing.
    pub async fn close(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(SessionCommand::Close { reply }).await.is_ok() {
            let _ = done.await;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(connection_id = %self.id, "Session task failed: {}", err);
            }
        }
    }

    /// Whether the session task has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed(self.id.to_string())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
