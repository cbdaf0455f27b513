//! Deferred operations for unreachable peers.
//!
//! When the peer an operation needs is offline, the operation is parked here
//! under that peer's id instead of failing. When the peer comes back, the
//! resync orchestrator drains the peer's queue and replays it in order.
//!
//! Operations flow through the queue in this order:
//! 1. `enqueue()` - append under the unreachable peer
//! 2. `drain_all()` - take the whole batch for replay, leaving an empty queue
//!
//! There is no ack step: a drained operation is gone from the store whether
//! or not its replay succeeds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use sync_types::PeerId;

/// What a deferred operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingKind {
    /// Deliver `path` from `source_id` to `target_id`.
    Send,
    /// Fetch `path` from `source_id` into `target_id`.
    Get,
    /// Remove `path` on the queued peer.
    Delete,
}

impl PendingKind {
    /// Badge shown next to a queued file.
    pub fn marker(&self) -> &'static str {
        match self {
            PendingKind::Send => "📤",
            PendingKind::Get => "⏳",
            PendingKind::Delete => "🗑️",
        }
    }
}

/// A deferred send, get or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Operation kind.
    pub kind: PendingKind,
    /// Shared-root relative name.
    pub path: String,
    /// Peer that owns or produces the data.
    pub source_id: PeerId,
    /// Peer that should end up with the effect applied.
    pub target_id: PeerId,
    /// Save under the base name only (gets).
    #[serde(default)]
    pub flatten: bool,
    /// Whether `path` names a directory (deletes).
    #[serde(default)]
    pub is_dir: bool,
}

impl PendingOperation {
    /// Deferred delivery of a file held by `source` to `target`.
    pub fn send(path: impl Into<String>, source: PeerId, target: PeerId) -> Self {
        Self {
            kind: PendingKind::Send,
            path: path.into(),
            source_id: source,
            target_id: target,
            flatten: false,
            is_dir: false,
        }
    }

    /// Deferred pull of a file from `source` into `target`.
    pub fn get(path: impl Into<String>, source: PeerId, target: PeerId, flatten: bool) -> Self {
        Self {
            kind: PendingKind::Get,
            path: path.into(),
            source_id: source,
            target_id: target,
            flatten,
            is_dir: false,
        }
    }

    /// Deferred removal of `path` on `target`, requested by `origin`.
    pub fn delete(path: impl Into<String>, is_dir: bool, origin: PeerId, target: PeerId) -> Self {
        Self {
            kind: PendingKind::Delete,
            path: path.into(),
            source_id: origin,
            target_id: target,
            flatten: false,
            is_dir,
        }
    }
}

/// Per-peer FIFO of [`PendingOperation`]s.
///
/// One mutex covers the whole store. `drain_all` swaps the peer's list for an
/// empty one under that lock, so an append racing a drain lands in exactly one
/// of the two lists.
#[derive(Debug, Default)]
pub struct PendingQueue {
    queues: Mutex<HashMap<PeerId, Vec<PendingOperation>>>,
}

impl PendingQueue {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PeerId, Vec<PendingOperation>>> {
        // No invariant spans a panic inside the critical sections below.
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an operation under `peer`.
    pub fn enqueue(&self, peer: PeerId, op: PendingOperation) {
        self.lock().entry(peer).or_default().push(op);
    }

    /// Take every operation queued under `peer`, oldest first.
    pub fn drain_all(&self, peer: PeerId) -> Vec<PendingOperation> {
        self.lock().remove(&peer).unwrap_or_default()
    }

    /// Copy of the operations queued under `peer`, oldest first.
    pub fn peek(&self, peer: PeerId) -> Vec<PendingOperation> {
        self.lock().get(&peer).cloned().unwrap_or_default()
    }

    /// Number of operations queued under `peer`.
    pub fn len(&self, peer: PeerId) -> usize {
        self.lock().get(&peer).map_or(0, Vec::len)
    }

    /// Whether nothing is queued under `peer`.
    pub fn is_empty(&self, peer: PeerId) -> bool {
        self.len(peer) == 0
    }

    /// Number of operations across all peers.
    pub fn total(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Peers with at least one queued operation, ascending.
    pub fn peers_with_pending(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(peer, _)| *peer)
            .collect();
        peers.sort();
        peers
    }

    /// Badge for `path` if an operation on it is queued under `peer`.
    ///
    /// The most recent operation on the path decides the badge.
    pub fn marker_for(&self, peer: PeerId, path: &str) -> Option<&'static str> {
        self.lock().get(&peer).and_then(|ops| {
            ops.iter()
                .rev()
                .find(|op| op.path == path)
                .map(|op| op.kind.marker())
        })
    }
}
