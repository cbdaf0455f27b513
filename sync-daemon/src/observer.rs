//! Front-end callbacks.
//!
//! The node never renders anything itself. Status changes, refreshed
//! listings and failed replays are reported through [`SyncObserver`], always
//! from a background task.

use sync_core::PendingOperation;
use sync_types::{FileRecord, PeerId};
use tokio::sync::mpsc;

/// Receives node events. Every method defaults to doing nothing.
pub trait SyncObserver: Send + Sync {
    /// A peer was found online or offline.
    fn on_status_change(&self, _peer: PeerId, _online: bool) {}

    /// A peer's listing was refreshed, or its cached listing re-shown while offline.
    fn on_file_list_change(&self, _peer: PeerId, _files: &[FileRecord]) {}

    /// A drained operation could not be replayed and was dropped.
    fn on_replay_failed(&self, _peer: PeerId, _op: &PendingOperation, _error: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// An event forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// See [`SyncObserver::on_status_change`].
    StatusChanged {
        /// Peer concerned.
        peer: PeerId,
        /// New status.
        online: bool,
    },
    /// See [`SyncObserver::on_file_list_change`].
    FileListChanged {
        /// Peer concerned.
        peer: PeerId,
        /// Listing in name order.
        files: Vec<FileRecord>,
    },
    /// See [`SyncObserver::on_replay_failed`].
    ReplayFailed {
        /// Peer whose queue was drained.
        peer: PeerId,
        /// The dropped operation.
        op: PendingOperation,
        /// Why it failed.
        error: String,
    },
}

/// Observer that forwards every event on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<NodeEvent>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: NodeEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl SyncObserver for ChannelObserver {
    fn on_status_change(&self, peer: PeerId, online: bool) {
        self.forward(NodeEvent::StatusChanged { peer, online });
    }

    fn on_file_list_change(&self, peer: PeerId, files: &[FileRecord]) {
        self.forward(NodeEvent::FileListChanged {
            peer,
            files: files.to_vec(),
        });
    }

    fn on_replay_failed(&self, peer: PeerId, op: &PendingOperation, error: &str) {
        self.forward(NodeEvent::ReplayFailed {
            peer,
            op: op.clone(),
            error: error.to_string(),
        });
    }
}
