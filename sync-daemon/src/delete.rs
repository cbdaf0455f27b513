//! Delete, locally or on a peer.
//!
//! A remote delete is sent on its own task and handed back as a
//! [`DeleteTicket`], so the caller can await the ack or drop the ticket and
//! let it finish in the background. An offline peer gets one pending
//! `Delete` per cached entry instead.

use crate::error::{NodeError, Result};
use crate::node::{Node, Selection};
use std::sync::Arc;
use sync_core::{PeerIdentity, PendingOperation};
use sync_types::{path, DeleteStatus, LogAction, PeerId};
use tokio::task::JoinHandle;

/// What [`Node::delete`] did.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// Removed from the local shared root.
    Deleted,
    /// The peer is offline; `queued` operations were registered as pending.
    Pending {
        /// Number of pending deletes added.
        queued: usize,
    },
    /// The request is on its way to an online peer.
    Dispatched(DeleteTicket),
}

/// Handle to an in-flight remote delete.
#[derive(Debug)]
pub struct DeleteTicket {
    /// Peer the request went to.
    pub peer: PeerId,
    /// Name being deleted.
    pub name: String,
    handle: JoinHandle<Result<DeleteStatus>>,
}

impl DeleteTicket {
    /// Wait for the peer's ack.
    ///
    /// A dial failure has already been queued as a pending delete by the time
    /// this returns `NodeError::Unreachable`.
    pub async fn wait(self) -> Result<DeleteStatus> {
        self.handle
            .await
            .map_err(|e| NodeError::Task(e.to_string()))?
    }
}

impl Node {
    /// Delete `selection` on the peer holding it.
    pub async fn delete(self: &Arc<Self>, selection: &Selection) -> Result<DeleteOutcome> {
        let target = self.peer(selection.peer)?.clone();
        let name = path::normalize(&selection.name)?;

        if target.is_local {
            let is_dir = self.shared().remove(&name).await?;
            self.snapshots().remove_under(&target.address, &name);
            tracing::info!(
                "Deleted local {} {}",
                if is_dir { "directory" } else { "file" },
                name
            );
            self.announce(LogAction::Delete, &name, target.id, target.id)
                .await;
            return Ok(DeleteOutcome::Deleted);
        }

        // Unknown only when the peer is unreachable and nothing is cached; the
        // replay then reads the kind from the peer's refreshed listing.
        let is_dir = self
            .selection_is_dir(&Selection::new(target.id, name.clone()))
            .await?
            .unwrap_or(false);

        if !self.is_online(&target) {
            let queued = self.defer_delete(&target, &name, is_dir);
            return Ok(DeleteOutcome::Pending { queued });
        }

        self.snapshots().remove_under(&target.address, &name);

        let node = Arc::clone(self);
        let peer = target.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let origin = node.local().id;
            match node.forward_delete(&peer, &task_name, is_dir, origin).await {
                Err(e) if e.is_soft() => {
                    node.pending().enqueue(
                        peer.id,
                        PendingOperation::delete(task_name.clone(), is_dir, origin, peer.id),
                    );
                    tracing::info!(
                        "Delete of {} on peer {} registered as pending",
                        task_name,
                        peer.id
                    );
                    Err(NodeError::Unreachable(peer.id))
                }
                other => other,
            }
        });

        Ok(DeleteOutcome::Dispatched(DeleteTicket {
            peer: target.id,
            name,
            handle,
        }))
    }

    /// Send DELETE_FILE or DELETE_DIR to `target` and announce a successful ack.
    ///
    /// Connectivity failures mark the peer offline and come back as
    /// [`NodeError::Unreachable`]; queuing is left to the caller.
    pub(crate) async fn forward_delete(
        &self,
        target: &PeerIdentity,
        name: &str,
        is_dir: bool,
        origin: PeerId,
    ) -> Result<DeleteStatus> {
        match self.client().delete(&target.address, name, is_dir).await {
            Ok(DeleteStatus::Ok) => {
                tracing::info!("Peer {} deleted {}", target.id, name);
                self.snapshots().remove_under(&target.address, name);
                self.announce(LogAction::Delete, name, origin, target.id)
                    .await;
                Ok(DeleteStatus::Ok)
            }
            Ok(DeleteStatus::Error) => {
                tracing::warn!("Peer {} could not delete {}", target.id, name);
                Ok(DeleteStatus::Error)
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!("Delete of {} on peer {} failed: {}", name, target.id, e);
                self.mark_unreachable(target);
                Err(NodeError::Unreachable(target.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Queue deletes for an offline peer, one per cached entry under `name`.
    fn defer_delete(&self, target: &PeerIdentity, name: &str, is_dir: bool) -> usize {
        let origin = self.local().id;
        let removed = self.snapshots().remove_under(&target.address, name);

        let ops: Vec<PendingOperation> = if removed.is_empty() {
            vec![PendingOperation::delete(name, is_dir, origin, target.id)]
        } else {
            removed
                .into_iter()
                .map(|record| {
                    PendingOperation::delete(record.name, record.is_directory, origin, target.id)
                })
                .collect()
        };

        let queued = ops.len();
        for op in ops {
            self.pending().enqueue(target.id, op);
        }
        tracing::info!(
            "Delete of {} on peer {} registered as pending ({} operations)",
            name,
            target.id,
            queued
        );
        queued
    }
}
