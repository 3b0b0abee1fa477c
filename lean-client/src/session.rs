//! A running Lean server and the client state mirrored from it
//!
//! [`Session`] owns the server process, a background task reading its
//! stdout, and the latest diagnostics and task snapshots the server
//! broadcast. Every method takes `&self`, so one session can be shared by
//! many concurrent callers.
//!
//! # Readiness
//!
//! The session starts out fully ready. A `sync` reply of `"file
//! invalidated"` marks it busy at the moment the reply is read; only a
//! `current_tasks` broadcast read after that reply with `is_running: false`
//! marks it ready again. [`Session::full_sync`] calls are queued, so each one
//! waits for the recompilation its own sync triggered.
//!
//! # Killing
//!
//! [`Session::kill`] stops the process and the receive loop. It does not
//! resolve requests that were already waiting for a reply; those callers
//! keep waiting until their future is dropped. `full_sync` callers waiting
//! for readiness are woken and fail with [`LeanError::NoServer`].

mod receiver;
mod state;

#[cfg(test)]
mod mock;

use std::process::Stdio;
use std::sync::Arc;

use futures::SinkExt;
use lean_protocol::{
    AllHoleCommandsResponse, CheckingMode, ClientCodec, Command, CommandKind, CommandResponse,
    CompleteResponse, FileRoi, HoleCommands, HoleResponse, InfoResponse, Message, Request,
    Response, SearchResponse, Task,
};
use lean_utils::{LeanError, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::{ServerConfig, StderrMode};

pub use state::{Readiness, SessionEvent, SessionStatus};

use receiver::{forward_stderr, receive_loop};
use state::Shared;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type RequestSink = FramedWrite<BoxedWriter, ClientCodec>;

/// Client side of one Lean server process
pub struct Session {
    config: ServerConfig,
    shared: Arc<Shared>,
    /// Server stdin; requests are written whole under this lock
    writer: tokio::sync::Mutex<Option<RequestSink>>,
    child: Mutex<Option<Child>>,
    /// Receive loop and stderr forwarder
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Queues `full_sync` calls
    sync_gate: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session; nothing runs until [`Session::start`]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
            writer: tokio::sync::Mutex::new(None),
            child: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            sync_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Launch the server process and begin reading its output
    pub async fn start(&self) -> Result<()> {
        if self.status() != SessionStatus::NotStarted {
            return Err(LeanError::AlreadyStarted);
        }

        let (program, args) = self.config.program_and_args()?;
        let mut command = ProcessCommand::new(program);
        command
            .args(&args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(match self.config.stderr {
                StderrMode::Inherit => Stdio::inherit(),
                StderrMode::Null => Stdio::null(),
                StderrMode::Log => Stdio::piped(),
            })
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| LeanError::ProcessSpawn(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LeanError::internal("server stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LeanError::internal("server stdout was not captured"))?;
        let stderr = child.stderr.take();

        self.attach(Box::new(stdout), Box::new(stdin)).await?;

        if let Some(stderr) = stderr {
            self.tasks.lock().push(tokio::spawn(forward_stderr(stderr)));
        }

        tracing::info!(pid = ?child.id(), program, ?args, "Started Lean server");
        *self.child.lock() = Some(child);
        Ok(())
    }

    /// Run the session over an already connected transport
    ///
    /// `reader` carries server output and `writer` server input. No process
    /// is owned; [`Session::kill`] only closes the transport.
    pub async fn start_with_io<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.attach(Box::new(reader), Box::new(writer)).await
    }

    async fn attach(&self, reader: BoxedReader, writer: BoxedWriter) -> Result<()> {
        // Held until the sink is in place so a sender that sees Running
        // always finds it
        let mut sink = self.writer.lock().await;
        {
            let mut state = self.shared.state.lock();
            if state.status != SessionStatus::NotStarted {
                return Err(LeanError::AlreadyStarted);
            }
            state.status = SessionStatus::Running;
        }
        *sink = Some(FramedWrite::new(writer, ClientCodec::new()));
        drop(sink);

        let reader = FramedRead::new(reader, ClientCodec::new());
        let handle = tokio::spawn(receive_loop(reader, Arc::clone(&self.shared)));
        self.tasks.lock().push(handle);
        Ok(())
    }

    /// Stop the server process and the receive loop
    ///
    /// Requests already waiting for a reply are not resolved.
    pub fn kill(&self) -> Result<()> {
        let in_flight = {
            let mut state = self.shared.state.lock();
            if state.status == SessionStatus::NotStarted {
                return Err(LeanError::NoServer);
            }
            state.status = SessionStatus::Stopped;
            state.correlator.in_flight()
        };
        if in_flight > 0 {
            tracing::warn!(
                in_flight,
                "Killing server with requests still awaiting replies; they will not be resolved"
            );
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        match self.writer.try_lock() {
            Ok(mut sink) => {
                sink.take();
            }
            Err(_) => tracing::debug!("Write in progress; server input closes once it finishes"),
        }
        self.shared.mark_closed();

        if let Some(mut child) = self.child.lock().take() {
            tracing::info!(pid = ?child.id(), "Killing Lean server");
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "Lean server already exited");
            }
        }
        Ok(())
    }

    /// Send one command and wait for its reply
    ///
    /// `sleep` and `long_sleep` get no reply; they are written and
    /// `Ok(None)` is returned at once. Everything else resolves to the
    /// decoded `ok` payload, or [`LeanError::Server`] for an `error` reply.
    pub async fn send(&self, command: Command) -> Result<Option<CommandResponse>> {
        let kind = command.kind();
        let mut request = Request::new(command);

        let pending = {
            let mut state = self.shared.state.lock();
            state.ensure_running()?;
            request.seq_num = state.correlator.next_seq_num();
            let seq_num = request.seq_num;
            kind.expects_reply().then(|| state.correlator.register(seq_num, kind))
        };
        let seq_num = request.seq_num;
        tracing::debug!(seq_num, command = %kind, "Sending request");

        // Dropped with the caller's future if the write never finishes
        let unwritten = UnwrittenRequest {
            shared: &self.shared,
            seq_num,
        };
        self.write(request).await?;
        std::mem::forget(unwritten);

        let Some(pending) = pending else {
            return Ok(None);
        };
        let response = match pending.wait().await {
            Ok(response) => response,
            Err(_) => return Err(self.shared.state.lock().closed_error()),
        };

        match response {
            Response::Ok(ok) => Ok(Some(CommandResponse::decode(kind, ok.payload)?)),
            Response::Error(err) => {
                tracing::debug!(
                    seq_num,
                    command = %kind,
                    message = %err.message,
                    "Server returned error"
                );
                Err(LeanError::server(kind.as_str(), err.message))
            }
            other => Err(LeanError::UnexpectedResponse {
                command: kind.as_str(),
                got: other.type_name(),
            }),
        }
    }

    async fn write(&self, request: Request) -> Result<()> {
        let mut sink = self.writer.lock().await;
        if self.status() == SessionStatus::Stopped {
            sink.take();
            return Err(LeanError::NoServer);
        }
        let result = match sink.as_mut() {
            Some(framed) => framed.send(request).await.map_err(LeanError::from),
            None => Err(LeanError::NoServer),
        };
        // kill() could not take the sink while this write held it
        if self.status() == SessionStatus::Stopped && sink.take().is_some() {
            tracing::debug!("Closed server input after the pending write");
        }
        result
    }

    /// Like [`Session::send`] for commands that always get a reply
    async fn request(&self, command: Command) -> Result<CommandResponse> {
        let kind = command.kind();
        self.send(command)
            .await?
            .ok_or_else(|| LeanError::internal(format!("'{}' produced no reply", kind)))
    }

    /// Sync a file and, if the server recompiles it, wait until it is done
    ///
    /// With `content` the server uses the given text instead of reading the
    /// file from disk.
    pub async fn full_sync(
        &self,
        file_name: impl Into<String>,
        content: Option<String>,
    ) -> Result<()> {
        let _queued = self.sync_gate.lock().await;
        let file_name = file_name.into();

        let reply = match self.request(Command::sync(file_name.clone(), content)).await? {
            CommandResponse::Sync(reply) => reply,
            other => return Err(unexpected(CommandKind::Sync, &other)),
        };

        if !reply.is_invalidated() {
            tracing::debug!(
                file = %file_name,
                message = %reply.message,
                "Sync needs no recompilation"
            );
            return Ok(());
        }

        tracing::debug!(file = %file_name, "Waiting for server to finish recompiling");
        let mut readiness = self.shared.readiness.subscribe();
        let outcome = readiness
            .wait_for(|readiness| *readiness != Readiness::Busy)
            .await
            .map(|readiness| *readiness);

        match outcome {
            Ok(Readiness::Ready) => Ok(()),
            _ => Err(self.shared.state.lock().closed_error()),
        }
    }

    /// Proof state at a position, or an empty string if there is none
    pub async fn state(
        &self,
        file_name: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Result<String> {
        let info = self.info(file_name, line, column).await?;
        Ok(info.record.and_then(|record| record.state).unwrap_or_default())
    }

    pub async fn info(
        &self,
        file_name: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Result<InfoResponse> {
        match self.request(Command::info(file_name, line, column)).await? {
            CommandResponse::Info(info) => Ok(info),
            other => Err(unexpected(CommandKind::Info, &other)),
        }
    }

    pub async fn complete(
        &self,
        file_name: impl Into<String>,
        line: u32,
        column: u32,
        skip_completions: bool,
    ) -> Result<CompleteResponse> {
        let command = Command::complete(file_name, line, column, skip_completions);
        match self.request(command).await? {
            CommandResponse::Complete(complete) => Ok(complete),
            other => Err(unexpected(CommandKind::Complete, &other)),
        }
    }

    /// Search declarations by name
    pub async fn search(&self, query: impl Into<String>) -> Result<SearchResponse> {
        match self.request(Command::search(query)).await? {
            CommandResponse::Search(search) => Ok(search),
            other => Err(unexpected(CommandKind::Search, &other)),
        }
    }

    pub async fn hole_commands(
        &self,
        file_name: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Result<HoleCommands> {
        match self.request(Command::hole_commands(file_name, line, column)).await? {
            CommandResponse::HoleCommands(hole) => Ok(hole),
            other => Err(unexpected(CommandKind::HoleCommands, &other)),
        }
    }

    pub async fn all_hole_commands(
        &self,
        file_name: impl Into<String>,
    ) -> Result<AllHoleCommandsResponse> {
        match self.request(Command::all_hole_commands(file_name)).await? {
            CommandResponse::AllHoleCommands(holes) => Ok(holes),
            other => Err(unexpected(CommandKind::AllHoleCommands, &other)),
        }
    }

    /// Run a hole action
    pub async fn hole(
        &self,
        file_name: impl Into<String>,
        line: u32,
        column: u32,
        action: impl Into<String>,
    ) -> Result<HoleResponse> {
        match self.request(Command::hole(file_name, line, column, action)).await? {
            CommandResponse::Hole(hole) => Ok(hole),
            other => Err(unexpected(CommandKind::Hole, &other)),
        }
    }

    /// Tell the server which regions to check
    pub async fn roi(&self, mode: CheckingMode, files: Vec<FileRoi>) -> Result<()> {
        match self.request(Command::roi(mode, files)).await? {
            CommandResponse::Ack => Ok(()),
            other => Err(unexpected(CommandKind::Roi, &other)),
        }
    }

    // ==================== State Accessors ====================

    pub fn status(&self) -> SessionStatus {
        self.shared.state.lock().status
    }

    pub fn readiness(&self) -> Readiness {
        *self.shared.readiness.borrow()
    }

    /// No recompilation is pending
    pub fn is_fully_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// Latest diagnostics broadcast by the server
    pub fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().messages.clone()
    }

    /// Latest task snapshot broadcast by the server
    pub fn tasks(&self) -> Vec<Task> {
        self.shared.state.lock().tasks.clone()
    }

    pub fn current_task(&self) -> Option<Task> {
        self.shared.state.lock().current_task.clone()
    }

    /// Requests written and still waiting for a reply
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().correlator.in_flight()
    }

    /// Subscribe to state change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Wait slot of a request that has not been fully written yet
///
/// Dropping it removes the slot, since no reply can arrive for a request the
/// server never received.
struct UnwrittenRequest<'a> {
    shared: &'a Shared,
    seq_num: u64,
}

impl Drop for UnwrittenRequest<'_> {
    fn drop(&mut self) {
        if self.shared.state.lock().correlator.cancel(self.seq_num) {
            tracing::debug!(seq_num = self.seq_num, "Dropped wait slot of unsent request");
        }
    }
}

fn unexpected(kind: CommandKind, got: &CommandResponse) -> LeanError {
    LeanError::UnexpectedResponse {
        command: kind.as_str(),
        got: got.type_name(),
    }
}
