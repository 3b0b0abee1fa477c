//! Request/reply matching by sequence number

use std::collections::HashMap;

use lean_protocol::{CommandKind, Response};
use lean_utils::{LeanError, Result};
use tokio::sync::oneshot;

struct PendingSlot {
    kind: CommandKind,
    tx: oneshot::Sender<Response>,
}

/// Allocates sequence numbers and holds one wait slot per in-flight request
///
/// Sequence numbers start at 1 and are never reused within a session. The
/// correlator itself is not synchronized; the session keeps it under the
/// same lock as the rest of its state.
pub struct Correlator {
    next_seq_num: u64,
    pending: HashMap<u64, PendingSlot>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_seq_num: 1,
            pending: HashMap::new(),
        }
    }

    /// Take the next sequence number
    pub fn next_seq_num(&mut self) -> u64 {
        let seq_num = self.next_seq_num;
        self.next_seq_num += 1;
        seq_num
    }

    /// Create the wait slot for `seq_num`
    ///
    /// Must happen before the request is written so that a fast reply always
    /// finds its slot.
    pub fn register(&mut self, seq_num: u64, kind: CommandKind) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        if self.pending.insert(seq_num, PendingSlot { kind, tx }).is_some() {
            tracing::error!(seq_num, "Sequence number registered twice");
        }
        PendingReply { seq_num, rx }
    }

    /// Kind of the request waiting on `seq_num`, if any
    pub fn kind_of(&self, seq_num: u64) -> Option<CommandKind> {
        self.pending.get(&seq_num).map(|slot| slot.kind)
    }

    /// Hand a reply to its waiter and discard the slot
    ///
    /// A reply nobody registered for means the stream is out of step with
    /// our requests.
    pub fn resolve(&mut self, seq_num: u64, response: Response) -> Result<CommandKind> {
        let slot = self
            .pending
            .remove(&seq_num)
            .ok_or(LeanError::Desync { seq_num })?;

        if slot.tx.send(response).is_err() {
            tracing::debug!(seq_num, "Reply arrived after its caller gave up");
        }
        Ok(slot.kind)
    }

    /// Drop a slot whose request never made it onto the wire
    pub fn cancel(&mut self, seq_num: u64) -> bool {
        self.pending.remove(&seq_num).is_some()
    }

    /// Drop every slot; their waiters observe a closed channel
    pub fn fail_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, seq_num: u64) -> bool {
        self.pending.contains_key(&seq_num)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiting side of a registered request
#[derive(Debug)]
pub struct PendingReply {
    seq_num: u64,
    rx: oneshot::Receiver<Response>,
}

impl PendingReply {
    pub fn seq_num(&self) -> u64 {
        self.seq_num
    }

    /// Suspend until the reply is resolved
    ///
    /// Fails with [`LeanError::ConnectionClosed`] if the slot is dropped
    /// without a reply.
    pub async fn wait(self) -> Result<Response> {
        self.rx.await.map_err(|_| LeanError::ConnectionClosed)
    }
}
