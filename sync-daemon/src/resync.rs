//! Replay of pending operations when a peer comes back.
//!
//! The plan for each operation comes from [`sync_core::resync::plan`]; this
//! module performs it. Drained operations are never re-queued: a replay that
//! fails is logged, reported to the observer, and dropped.

use crate::error::Result;
use crate::node::Node;
use crate::transfer::OnUnreachable;
use sync_core::resync::plan_all;
use sync_core::{PendingOperation, ReplayAction};
use sync_types::{DeleteStatus, PeerId};

/// One operation whose replay failed.
#[derive(Debug, Clone)]
pub struct ReplayFailure {
    /// The dropped operation.
    pub op: PendingOperation,
    /// Label of the planned action.
    pub action: &'static str,
    /// Why it failed.
    pub error: String,
}

/// Outcome of draining one peer's queue.
#[derive(Debug, Clone)]
pub struct ResyncReport {
    /// Peer whose queue was drained.
    pub peer: PeerId,
    /// Operations performed.
    pub replayed: usize,
    /// Operations local could do nothing about.
    pub skipped: usize,
    /// Deletes the peer acknowledged with an error status.
    pub rejected: usize,
    /// Operations that failed and were dropped.
    pub failures: Vec<ReplayFailure>,
}

impl ResyncReport {
    fn new(peer: PeerId) -> Self {
        Self {
            peer,
            replayed: 0,
            skipped: 0,
            rejected: 0,
            failures: Vec::new(),
        }
    }

    /// Number of drained operations accounted for.
    pub fn total(&self) -> usize {
        self.replayed + self.skipped + self.rejected + self.failures.len()
    }
}

impl Node {
    /// Drain `peer`'s pending queue and replay it in order.
    ///
    /// Called when `peer` transitions to online. Operations queued while the
    /// replay runs stay for the next transition.
    pub async fn resync(&self, peer: PeerId) -> Result<ResyncReport> {
        let identity = self.peer(peer)?.clone();
        let local = self.local().id;
        let mut report = ResyncReport::new(peer);

        let batch = self.pending().drain_all(peer);
        if batch.is_empty() {
            return Ok(report);
        }
        tracing::info!(
            "Resync with peer {}: replaying {} pending operations",
            peer,
            batch.len()
        );

        for (op, action) in plan_all(batch, local, peer) {
            let label = action.label();
            let result = match action {
                ReplayAction::SendDirect { path } => self
                    .send_with(peer, &path, OnUnreachable::Fail)
                    .await
                    .map(|_| true),
                ReplayAction::Relay { source, path } => self
                    .relay_with(source, &path, &[peer], OnUnreachable::Fail)
                    .await
                    .map(|_| true),
                ReplayAction::Pull {
                    source,
                    path,
                    flatten,
                } => self
                    .pull_with(source, &path, flatten, OnUnreachable::Fail)
                    .await
                    .map(|_| true),
                ReplayAction::PushToRequester { requester, path } => self
                    .send_with(requester, &path, OnUnreachable::Fail)
                    .await
                    .map(|_| true),
                ReplayAction::ForwardDelete { path, is_dir } => {
                    // Deletes queued without metadata take the kind from the refreshed listing.
                    let is_dir = self
                        .cached_kind(&identity.address, &path)
                        .unwrap_or(is_dir);
                    self.forward_delete(&identity, &path, is_dir, op.source_id)
                        .await
                        .map(|status| status == DeleteStatus::Ok)
                }
                ReplayAction::Skip { reason } => {
                    tracing::debug!("Skipping pending {} of {}: {}", label, op.path, reason);
                    report.skipped += 1;
                    continue;
                }
            };

            match result {
                Ok(true) => report.replayed += 1,
                Ok(false) => report.rejected += 1,
                Err(e) => {
                    tracing::warn!(
                        "Replay of pending {} of {} for peer {} failed: {}",
                        label,
                        op.path,
                        peer,
                        e
                    );
                    let error = e.to_string();
                    self.observer().on_replay_failed(peer, &op, &error);
                    report.failures.push(ReplayFailure {
                        op,
                        action: label,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "Resync with peer {} done: {} replayed, {} skipped, {} rejected, {} failed",
            peer,
            report.replayed,
            report.skipped,
            report.rejected,
            report.failures.len()
        );
        Ok(report)
    }
}
