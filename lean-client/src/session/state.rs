//! State shared between a session and its receive loop

use lean_protocol::{
    AllMessagesResponse, CommandKind, CurrentTasksResponse, Message, Response, Task,
    FILE_INVALIDATED,
};
use lean_utils::{LeanError, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::correlator::Correlator;

/// Capacity of the event channel; slow subscribers observe `Lagged`
const EVENT_CAPACITY: usize = 64;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    Running,
    /// The server closed its output or sent something undecodable
    Disconnected,
    /// Killed by the owner
    Stopped,
}

/// Whether the server has finished the work it announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No pending work is known
    Ready,
    /// A sync invalidated a file and no idle task snapshot has arrived since
    Busy,
    /// The server is gone; nothing will become ready anymore
    Closed,
}

/// Change notifications for observers of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The diagnostic list was replaced
    MessagesUpdated { count: usize },
    /// The task snapshot was replaced
    TasksUpdated { is_running: bool },
    /// The server went from busy to idle
    Ready,
    /// The connection ended
    Closed,
}

pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
    pub current_task: Option<Task>,
    pub correlator: Correlator,
    /// Why the receive loop stopped, if it stopped on bad input
    pub fault: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            status: SessionStatus::NotStarted,
            messages: Vec::new(),
            tasks: Vec::new(),
            current_task: None,
            correlator: Correlator::new(),
            fault: None,
        }
    }

    /// Error for an operation that needs a live server
    pub fn ensure_running(&self) -> Result<()> {
        match self.status {
            SessionStatus::Running => Ok(()),
            _ => Err(self.closed_error()),
        }
    }

    /// Error for a request that can no longer be answered
    pub fn closed_error(&self) -> LeanError {
        match (self.status, &self.fault) {
            (SessionStatus::NotStarted | SessionStatus::Stopped, _) => LeanError::NoServer,
            (_, Some(fault)) => LeanError::protocol(fault.clone()),
            (_, None) => LeanError::ConnectionClosed,
        }
    }
}

pub(crate) struct Shared {
    pub state: Mutex<SessionState>,
    pub readiness: watch::Sender<Readiness>,
    pub events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    pub fn new() -> Self {
        let (readiness, _) = watch::channel(Readiness::Ready);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(SessionState::new()),
            readiness,
            events,
        }
    }

    /// Apply one server line to the session state
    ///
    /// Broadcasts replace their snapshot wholesale. Correlated replies go to
    /// their waiter; replies without `seq_num` are dropped.
    pub fn dispatch(&self, response: Response) -> Result<()> {
        match response {
            Response::CurrentTasks(snapshot) => {
                self.apply_tasks(snapshot);
                Ok(())
            }
            Response::AllMessages(snapshot) => {
                self.apply_messages(snapshot);
                Ok(())
            }
            Response::Ok(_) | Response::Error(_) => {
                let Some(seq_num) = response.seq_num() else {
                    tracing::debug!(
                        response = response.type_name(),
                        "Dropping reply without seq_num"
                    );
                    return Ok(());
                };
                self.resolve(seq_num, response)
            }
        }
    }

    fn resolve(&self, seq_num: u64, response: Response) -> Result<()> {
        let invalidated = matches!(
            &response,
            Response::Ok(ok) if ok.payload.get("message").and_then(Value::as_str) == Some(FILE_INVALIDATED)
        );

        let mut state = self.state.lock();

        // Mark busy before the waiter can observe its reply, so only task
        // snapshots that follow this line can make the server ready again
        if invalidated && state.correlator.kind_of(seq_num) == Some(CommandKind::Sync) {
            tracing::debug!(seq_num, "File invalidated, server busy");
            self.set_readiness(Readiness::Busy);
        }

        let kind = state.correlator.resolve(seq_num, response)?;
        tracing::trace!(seq_num, command = %kind, "Resolved reply");
        Ok(())
    }

    fn apply_tasks(&self, snapshot: CurrentTasksResponse) {
        let is_running = snapshot.is_running;
        let became_ready = {
            let mut state = self.state.lock();
            state.tasks = snapshot.tasks;
            state.current_task = snapshot.cur_task;
            !is_running && self.set_readiness(Readiness::Ready)
        };

        tracing::debug!(is_running, "Task snapshot updated");
        let _ = self.events.send(SessionEvent::TasksUpdated { is_running });
        if became_ready {
            let _ = self.events.send(SessionEvent::Ready);
        }
    }

    fn apply_messages(&self, snapshot: AllMessagesResponse) {
        let count = snapshot.msgs.len();
        self.state.lock().messages = snapshot.msgs;

        tracing::debug!(count, "Diagnostics updated");
        let _ = self.events.send(SessionEvent::MessagesUpdated { count });
    }

    /// Change readiness unless the session is closed; true if it changed
    pub fn set_readiness(&self, next: Readiness) -> bool {
        self.readiness.send_if_modified(|current| {
            if *current == next || *current == Readiness::Closed {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Receive loop ended; fail every outstanding request
    ///
    /// With a fault, waiters and later callers get it as a protocol error;
    /// without one they get [`LeanError::ConnectionClosed`].
    pub fn close(&self, fault: Option<String>) {
        let failed = {
            let mut state = self.state.lock();
            if state.fault.is_none() {
                state.fault = fault;
            }
            if state.status == SessionStatus::Running {
                state.status = SessionStatus::Disconnected;
            }
            state.correlator.fail_all()
        };

        if failed > 0 {
            tracing::warn!(failed, "Failing requests still awaiting replies");
        }
        self.mark_closed();
    }

    pub fn mark_closed(&self) {
        self.readiness.send_replace(Readiness::Closed);
        let _ = self.events.send(SessionEvent::Closed);
    }
}
