//! The node context.
//!
//! [`Node`] owns the peer set and the shared root, and holds the three
//! shared stores (liveness, snapshots, pending queue) behind `Arc`s so the
//! server, the scheduler and user-triggered operations all see the same
//! state. Operations live in their own modules as further `impl Node` blocks.

use crate::activity::{ActivityEntry, ActivityLog};
use crate::config::Config;
use crate::error::Result;
use crate::observer::{NoopObserver, SyncObserver};
use crate::shared::SharedRoot;
use chrono::Utc;
use std::sync::Arc;
use sync_client::{PeerClient, TcpTransport};
use sync_core::{
    diff, LivenessTracker, PeerIdentity, PeerRegistry, PeerState, PendingQueue, SnapshotCache,
    Transition,
};
use sync_types::{FileRecord, LogAction, PeerId};

/// A file or directory chosen on some peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Peer holding the entry.
    pub peer: PeerId,
    /// Shared-root relative name.
    pub name: String,
}

impl Selection {
    /// Select `name` on `peer`.
    pub fn new(peer: PeerId, name: impl Into<String>) -> Self {
        Self {
            peer,
            name: name.into(),
        }
    }
}

/// Result of [`Node::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Entries in name order.
    pub files: Vec<FileRecord>,
    /// True when the peer was unreachable and the cached snapshot was used.
    pub stale: bool,
}

/// One row of [`Node::peer_statuses`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatus {
    /// Peer id.
    pub id: PeerId,
    /// `host:port` address.
    pub address: String,
    /// Last known liveness.
    pub state: PeerState,
    /// Operations queued for the peer.
    pub pending: usize,
}

/// A running peerfs node.
pub struct Node {
    registry: PeerRegistry,
    shared: SharedRoot,
    client: PeerClient,
    liveness: Arc<LivenessTracker>,
    snapshots: Arc<SnapshotCache>,
    pending: Arc<PendingQueue>,
    observer: Arc<dyn SyncObserver>,
    activity: Option<ActivityLog>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("local", self.local())
            .field("shared", &self.shared)
            .field("peers", &self.registry.len())
            .field("pending", &self.pending.total())
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Create a node with fresh stores and no observer.
    pub fn new(registry: PeerRegistry, shared: SharedRoot, client: PeerClient) -> Self {
        Self {
            registry,
            shared,
            client,
            liveness: Arc::new(LivenessTracker::new()),
            snapshots: Arc::new(SnapshotCache::new()),
            pending: Arc::new(PendingQueue::new()),
            observer: Arc::new(NoopObserver),
            activity: None,
        }
    }

    /// Build a node from configuration: peer list, shared root, TCP transport.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let registry = config.load_peers()?;
        let shared = SharedRoot::open(&config.node.shared_root).await?;
        let client = PeerClient::new(TcpTransport::new(config.transport()));

        let mut node = Self::new(registry, shared, client);
        if config.activity_log.enabled {
            node = node.with_activity_log(ActivityLog::new(&config.activity_log.path));
        }

        tracing::info!(
            "Node {} at {} (shared root: {}, {} peers)",
            node.local().id,
            node.local().address,
            node.shared.path().display(),
            node.registry.len()
        );
        Ok(node)
    }

    /// Report events to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Record completed actions to `log`.
    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.activity = Some(log);
        self
    }

    /// Share externally owned stores.
    pub fn with_stores(
        mut self,
        liveness: Arc<LivenessTracker>,
        snapshots: Arc<SnapshotCache>,
        pending: Arc<PendingQueue>,
    ) -> Self {
        self.liveness = liveness;
        self.snapshots = snapshots;
        self.pending = pending;
        self
    }

    /// This node's identity.
    pub fn local(&self) -> &PeerIdentity {
        self.registry.local()
    }

    /// The peer set.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// The replicated directory.
    pub fn shared(&self) -> &SharedRoot {
        &self.shared
    }

    /// Outbound requests.
    pub fn client(&self) -> &PeerClient {
        &self.client
    }

    /// Liveness per address.
    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.liveness
    }

    /// Last known listing per address.
    pub fn snapshots(&self) -> &Arc<SnapshotCache> {
        &self.snapshots
    }

    /// Deferred operations per peer.
    pub fn pending(&self) -> &Arc<PendingQueue> {
        &self.pending
    }

    /// The activity log, if enabled.
    pub fn activity(&self) -> Option<&ActivityLog> {
        self.activity.as_ref()
    }

    pub(crate) fn observer(&self) -> &dyn SyncObserver {
        self.observer.as_ref()
    }

    /// Identity of `id`.
    pub fn peer(&self, id: PeerId) -> Result<&PeerIdentity> {
        Ok(self.registry.by_id(id)?)
    }

    /// Whether `peer` is believed reachable. The local node always is.
    pub fn is_online(&self, peer: &PeerIdentity) -> bool {
        peer.is_local || self.liveness.get_status(&peer.address)
    }

    /// Listing of `peer`: a scan for the local node, a live GET_FILES otherwise.
    ///
    /// An unreachable peer yields its cached snapshot, flagged stale.
    pub async fn list(&self, peer: PeerId) -> Result<Listing> {
        let identity = self.peer(peer)?;
        if identity.is_local {
            let files = self.shared.list().await?;
            self.snapshots.replace(&identity.address, files.clone());
            return Ok(Listing {
                files,
                stale: false,
            });
        }

        match self.client.get_files(&identity.address).await {
            Ok(files) => {
                self.snapshots.replace(&identity.address, files);
                Ok(Listing {
                    files: self.snapshots.records(&identity.address),
                    stale: false,
                })
            }
            Err(e) if e.is_unreachable() => {
                tracing::debug!("Listing {} from cache: {}", identity.id, e);
                Ok(Listing {
                    files: self.snapshots.records(&identity.address),
                    stale: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Local entries `peer` is missing or holds an older copy of.
    pub async fn outdated_on(&self, peer: PeerId) -> Result<Vec<FileRecord>> {
        let local = self.list(self.local().id).await?;
        let remote = self.list(peer).await?;
        Ok(diff::missing_or_outdated(&local.files, &remote.files))
    }

    /// Status of every remote peer, in registry order.
    pub fn peer_statuses(&self) -> Vec<PeerStatus> {
        self.registry
            .remotes()
            .map(|peer| PeerStatus {
                id: peer.id,
                address: peer.address.clone(),
                state: self.liveness.state(&peer.address),
                pending: self.pending.len(peer.id),
            })
            .collect()
    }

    /// Whether `selection` names a directory, if that can be known right now.
    ///
    /// Local entries are checked on disk. Remote ones come from the snapshot,
    /// and an uncached remote entry from a live GET_FILES. `None` means the
    /// peer is unreachable and nothing about the entry is recorded.
    pub(crate) async fn selection_is_dir(&self, selection: &Selection) -> Result<Option<bool>> {
        let identity = self.peer(selection.peer)?;
        if identity.is_local {
            return Ok(Some(
                self.shared
                    .stat(&selection.name)
                    .await?
                    .map(|record| record.is_directory)
                    .unwrap_or(false),
            ));
        }

        if let Some(kind) = self.cached_kind(&identity.address, &selection.name) {
            return Ok(Some(kind));
        }
        if !self.is_online(identity) {
            return Ok(None);
        }

        match self.client.get_files(&identity.address).await {
            Ok(files) => {
                self.snapshots.replace(&identity.address, files);
                // Absent from a live listing: treat as a file and let the peer refuse it.
                Ok(Some(
                    self.cached_kind(&identity.address, &selection.name)
                        .unwrap_or(false),
                ))
            }
            Err(e) if e.is_unreachable() => {
                tracing::debug!("Listing peer {} failed: {}", identity.id, e);
                self.mark_unreachable(identity);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Directory-ness of `name` recorded in `address`'s snapshot.
    pub(crate) fn cached_kind(&self, address: &str, name: &str) -> Option<bool> {
        if let Some(record) = self.snapshots.get(address, name) {
            return Some(record.is_directory);
        }
        self.snapshots
            .entries_under(address, name)
            .iter()
            .any(|record| record.name != name)
            .then_some(true)
    }

    /// Record a liveness result for `peer` and report a change to the observer.
    ///
    /// The event comes from the state the write replaced, so concurrent
    /// callers report one change between them.
    pub(crate) fn update_status(&self, peer: &PeerIdentity, online: bool) -> Transition {
        let next = PeerState::observed(online);
        let previous = self.liveness.swap(&peer.address, online);

        if previous != next {
            if online {
                tracing::info!("Peer {} ({}) is online", peer.id, peer.address);
            } else {
                tracing::info!("Peer {} ({}) is offline", peer.id, peer.address);
            }
            self.observer.on_status_change(peer.id, online);
        }
        Transition::between(previous, next)
    }

    /// Mark `peer` offline after a failed dial so its next success triggers a resync.
    pub(crate) fn mark_unreachable(&self, peer: &PeerIdentity) {
        if !peer.is_local {
            self.update_status(peer, false);
        }
    }

    /// Append to the activity log if enabled. Failures are only logged.
    pub(crate) async fn record(
        &self,
        action: LogAction,
        file_name: &str,
        origin: PeerId,
        target: PeerId,
    ) {
        let Some(log) = &self.activity else {
            return;
        };
        let entry = ActivityEntry {
            action,
            file_name: file_name.to_string(),
            origin_id: origin,
            target_id: target,
            at: Utc::now(),
        };
        if let Err(e) = log.append(&entry).await {
            tracing::warn!("Failed to write activity log {}: {}", log.path().display(), e);
        }
    }
}
