//! Replay planning for reconnected peers.
//!
//! This module turns a drained [`PendingOperation`] into the concrete action
//! the local node must perform now that the peer is reachable again. It is a
//! pure function of the operation and the two ids involved; the daemon
//! interprets the returned [`ReplayAction`] and performs the I/O.

use sync_types::PeerId;

use crate::pending::{PendingKind, PendingOperation};

/// What to do with one drained operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayAction {
    /// Local holds the file; deliver it to the reconnected peer.
    SendDirect {
        /// Relative name.
        path: String,
    },
    /// A third party holds the file; broker it to the reconnected peer.
    Relay {
        /// Peer that holds the bytes.
        source: PeerId,
        /// Relative name.
        path: String,
    },
    /// Local wanted the file; pull it now.
    Pull {
        /// Peer to pull from.
        source: PeerId,
        /// Relative name.
        path: String,
        /// Save under the base name only.
        flatten: bool,
    },
    /// Another peer wanted a file local holds; push it to them.
    PushToRequester {
        /// Peer that asked for the file.
        requester: PeerId,
        /// Relative name.
        path: String,
    },
    /// Forward the delete to the reconnected peer.
    ForwardDelete {
        /// Relative name.
        path: String,
        /// Use DELETE_DIR instead of DELETE_FILE.
        is_dir: bool,
    },
    /// Nothing local can do for this operation.
    Skip {
        /// Why the operation was not replayed.
        reason: &'static str,
    },
}

impl ReplayAction {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ReplayAction::SendDirect { .. } => "send",
            ReplayAction::Relay { .. } => "relay",
            ReplayAction::Pull { .. } => "pull",
            ReplayAction::PushToRequester { .. } => "push-to-requester",
            ReplayAction::ForwardDelete { .. } => "delete",
            ReplayAction::Skip { .. } => "skip",
        }
    }
}

/// Decide how `op`, queued under the reconnected `peer`, is replayed by `local`.
pub fn plan(op: &PendingOperation, local: PeerId, peer: PeerId) -> ReplayAction {
    let path = op.path.clone();
    match op.kind {
        PendingKind::Send if op.source_id == local => ReplayAction::SendDirect { path },
        PendingKind::Send if op.source_id == peer => ReplayAction::Skip {
            reason: "peer is both source and target",
        },
        PendingKind::Send => ReplayAction::Relay {
            source: op.source_id,
            path,
        },

        PendingKind::Get if op.target_id == local && op.source_id != local => ReplayAction::Pull {
            source: op.source_id,
            path,
            flatten: op.flatten,
        },
        PendingKind::Get if op.source_id == local && op.target_id != local => {
            ReplayAction::PushToRequester {
                requester: op.target_id,
                path,
            }
        }
        PendingKind::Get => ReplayAction::Skip {
            reason: "local is neither requester nor holder",
        },

        PendingKind::Delete => ReplayAction::ForwardDelete {
            path,
            is_dir: op.is_dir,
        },
    }
}

/// Plan a whole drained batch, preserving order.
pub fn plan_all(
    ops: Vec<PendingOperation>,
    local: PeerId,
    peer: PeerId,
) -> Vec<(PendingOperation, ReplayAction)> {
    ops.into_iter()
        .map(|op| {
            let action = plan(&op, local, peer);
            (op, action)
        })
        .collect()
}
