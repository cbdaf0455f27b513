//! Periodic sync tick.
//!
//! Each tick refreshes every peer's listing, which doubles as the liveness
//! probe: a GET_FILES that succeeds means online. A peer that comes back gets
//! its pending queue replayed before its listing is shown.

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::node::Node;
use crate::resync::ResyncReport;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{PeerIdentity, Transition};
use sync_types::PeerId;
use tokio::time::interval;

/// What one tick observed.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Remote peers that answered.
    pub online: Vec<PeerId>,
    /// Remote peers that did not.
    pub offline: Vec<PeerId>,
    /// Non-empty replays triggered by peers coming back.
    pub resynced: Vec<ResyncReport>,
}

impl Node {
    /// Refresh every peer once.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        match self.shared().list().await {
            Ok(files) => {
                self.snapshots().replace(&self.local().address, files.clone());
                self.observer().on_file_list_change(self.local().id, &files);
            }
            Err(e) => tracing::error!("Scan of shared root failed: {}", e),
        }

        let remotes: Vec<PeerIdentity> = self.registry().remotes().cloned().collect();
        for peer in remotes {
            match self.refresh(&peer).await {
                (true, resync) => {
                    report.online.push(peer.id);
                    report.resynced.extend(resync);
                }
                (false, _) => report.offline.push(peer.id),
            }
        }

        tracing::debug!(
            "Tick: {} online, {} offline, {} resynced",
            report.online.len(),
            report.offline.len(),
            report.resynced.len()
        );
        report
    }

    /// Probe one peer and replay its queue if it just came back.
    pub async fn probe(&self, peer: PeerId) -> Result<bool> {
        let identity = self.peer(peer)?.clone();
        if identity.is_local {
            return Ok(true);
        }

        let online = self.client().probe(&identity.address).await;
        if self.update_status(&identity, online) == Transition::CameOnline {
            self.resync(peer).await?;
        }
        Ok(online)
    }

    async fn refresh(&self, peer: &PeerIdentity) -> (bool, Option<ResyncReport>) {
        let files = match self.client().get_files(&peer.address).await {
            Ok(files) => files,
            Err(e) => {
                if e.is_unreachable() {
                    tracing::debug!("Peer {} unreachable: {}", peer.id, e);
                } else {
                    tracing::warn!("Peer {} returned a bad listing: {}", peer.id, e);
                }
                self.update_status(peer, false);
                let cached = self.snapshots().records(&peer.address);
                self.observer().on_file_list_change(peer.id, &cached);
                return (false, None);
            }
        };

        self.snapshots().replace(&peer.address, files);
        let mut resync = None;
        if self.update_status(peer, true) == Transition::CameOnline {
            match self.resync(peer.id).await {
                Ok(report) => {
                    if report.total() > 0 {
                        // Replays changed the peer's tree; show the new one.
                        if let Ok(files) = self.client().get_files(&peer.address).await {
                            self.snapshots().replace(&peer.address, files);
                        }
                        resync = Some(report);
                    }
                }
                Err(e) => tracing::error!("Resync with peer {} failed: {}", peer.id, e),
            }
        }

        let listing = self.snapshots().records(&peer.address);
        self.observer().on_file_list_change(peer.id, &listing);
        (true, resync)
    }
}

/// Spawn the periodic sync task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_scheduler_task(
    node: Arc<Node>,
    config: SchedulerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Sync scheduler disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Sync scheduler started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            let report = node.tick().await;
            for resync in report.resynced.iter().filter(|r| !r.failures.is_empty()) {
                tracing::warn!(
                    "Peer {}: {} pending operations could not be replayed",
                    resync.peer,
                    resync.failures.len()
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChannelObserver, NodeEvent};
    use crate::test_support::{three_peer_node, PEER2_ADDR, PEER3_ADDR};
    use chrono::Utc;
    use sync_client::MockTransport;
    use sync_core::PendingOperation;
    use sync_types::{FileRecord, FilesList, Message};

    fn listing(names: &[&str]) -> Message {
        Message::FilesList(FilesList {
            files: names
                .iter()
                .map(|name| FileRecord::file(*name, Utc::now()))
                .collect(),
        })
    }

    #[tokio::test]
    async fn tick_updates_liveness_and_snapshots() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        transport.queue_reply(PEER2_ADDR, listing(&["a.txt"]));
        transport.set_online(PEER3_ADDR, false);
        node.snapshots()
            .replace(PEER3_ADDR, vec![FileRecord::file("cached.txt", Utc::now())]);

        let report = node.tick().await;

        assert_eq!(report.online, vec![PeerId::new(2)]);
        assert_eq!(report.offline, vec![PeerId::new(3)]);
        assert!(node.liveness().get_status(PEER2_ADDR));
        assert!(!node.liveness().get_status(PEER3_ADDR));
        assert!(node.snapshots().get(PEER2_ADDR, "a.txt").is_some());
        assert!(node.snapshots().get(PEER3_ADDR, "cached.txt").is_some());
    }

    #[tokio::test]
    async fn peer_coming_back_drains_its_queue() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        node.shared().write("a.txt", b"a").await.unwrap();
        node.liveness().set_status(PEER2_ADDR, false);
        node.pending().enqueue(
            PeerId::new(2),
            PendingOperation::send("a.txt", PeerId::new(1), PeerId::new(2)),
        );
        transport.queue_reply(PEER2_ADDR, listing(&[]));
        transport.queue_reply(PEER2_ADDR, listing(&["a.txt"]));
        transport.set_online(PEER3_ADDR, false);

        let report = node.tick().await;

        assert_eq!(report.resynced.len(), 1);
        assert_eq!(report.resynced[0].replayed, 1);
        assert!(node.pending().is_empty(PeerId::new(2)));
        assert!(node.snapshots().get(PEER2_ADDR, "a.txt").is_some());
    }

    #[tokio::test]
    async fn status_events_fire_on_change_only() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        let (observer, mut events) = ChannelObserver::new();
        let node = node.with_observer(Arc::new(observer));
        transport.set_online(PEER3_ADDR, false);
        transport.queue_reply(PEER2_ADDR, listing(&[]));
        transport.queue_reply(PEER2_ADDR, listing(&[]));

        node.tick().await;
        node.tick().await;

        let mut status = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let NodeEvent::StatusChanged { peer, online } = event {
                status.push((peer, online));
            }
        }
        assert_eq!(
            status,
            vec![(PeerId::new(2), true), (PeerId::new(3), false)]
        );
    }

    #[tokio::test]
    async fn probe_resyncs_on_reconnect() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        node.shared().write("a.txt", b"a").await.unwrap();
        node.pending().enqueue(
            PeerId::new(2),
            PendingOperation::send("a.txt", PeerId::new(1), PeerId::new(2)),
        );

        assert!(node.probe(PeerId::new(2)).await.unwrap());
        assert!(node.pending().is_empty(PeerId::new(2)));
        assert_eq!(transport.probes_of(PEER2_ADDR), 1);
    }

    #[tokio::test]
    async fn scheduler_task_disabled() {
        let (_dir, node) = three_peer_node(MockTransport::new()).await;
        let config = SchedulerConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_scheduler_task(Arc::new(node), config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }
}
