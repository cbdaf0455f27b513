//! SYNC_LOGS gossip.
//!
//! Every completed delete or transfer is broadcast to the peers that were not
//! part of it, so their snapshot caches stay current without polling. An
//! entry is applied to disk only by the peer it names as target.

use crate::node::Node;
use crate::transfer::Outcome;
use chrono::Utc;
use std::sync::Arc;
use sync_types::{FileRecord, LogAction, PeerId, SyncLogEntry};

impl Node {
    /// Record and broadcast one completed action. Returns the number of peers reached.
    ///
    /// Skips the local node, `target`, and peers currently believed offline.
    pub async fn announce(
        &self,
        action: LogAction,
        file_name: &str,
        origin: PeerId,
        target: PeerId,
    ) -> usize {
        self.record(action, file_name, origin, target).await;

        let entry = SyncLogEntry {
            action,
            file_name: file_name.to_string(),
            origin_id: origin,
            target_id: target,
        };

        let mut reached = 0;
        for peer in self.registry().remotes().filter(|peer| peer.id != target) {
            if !self.is_online(peer) {
                tracing::debug!("Not gossiping {} to offline peer {}", action, peer.id);
                continue;
            }
            match self.client().sync_logs(&peer.address, vec![entry.clone()]).await {
                Ok(()) => reached += 1,
                Err(e) => {
                    tracing::warn!("Gossip of {} {} to peer {} failed: {}", action, file_name, peer.id, e);
                    if e.is_unreachable() {
                        self.mark_unreachable(peer);
                    }
                }
            }
        }

        tracing::debug!("{} {} announced to {} peers", action, file_name, reached);
        reached
    }

    /// Apply one received SYNC_LOGS entry.
    ///
    /// As target: DELETE removes the path locally and TRANSFER pulls the file
    /// from its origin on a background task. As bystander: the target's
    /// snapshot is updated.
    pub async fn apply_sync_log(self: &Arc<Self>, entry: SyncLogEntry) {
        let local = self.local().id;

        if entry.target_id != local {
            let Ok(target) = self.peer(entry.target_id) else {
                tracing::warn!("SYNC_LOGS names unknown peer {}", entry.target_id);
                return;
            };
            match entry.action {
                LogAction::Delete => {
                    self.snapshots().remove_under(&target.address, &entry.file_name);
                }
                LogAction::Transfer | LogAction::Create => {
                    self.snapshots().append(
                        &target.address,
                        FileRecord::file(entry.file_name.clone(), Utc::now()),
                    );
                }
            }
            return;
        }

        match entry.action {
            LogAction::Delete => match self.shared().remove(&entry.file_name).await {
                Ok(_) => {
                    self.snapshots()
                        .remove_under(&self.local().address, &entry.file_name);
                    self.record(LogAction::Delete, &entry.file_name, entry.origin_id, local)
                        .await;
                    tracing::info!("Removed {} as requested by peer {}", entry.file_name, entry.origin_id);
                }
                Err(e) => tracing::debug!("Gossiped delete of {} not applied: {}", entry.file_name, e),
            },
            LogAction::Transfer if entry.origin_id != local => {
                let node = Arc::clone(self);
                tokio::spawn(async move {
                    match node.request_file(entry.origin_id, &entry.file_name, false).await {
                        Ok(Outcome::Done) => {}
                        Ok(Outcome::Pending) => tracing::info!(
                            "Pull of {} from peer {} registered as pending",
                            entry.file_name,
                            entry.origin_id
                        ),
                        Err(e) => tracing::warn!(
                            "Pull of {} from peer {} failed: {}",
                            entry.file_name,
                            entry.origin_id,
                            e
                        ),
                    }
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{three_peer_node, PEER2_ADDR, PEER3_ADDR};
    use sync_client::MockTransport;
    use sync_types::{Message, MessageType};

    #[tokio::test]
    async fn announce_skips_target_and_offline_peers() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        node.liveness().set_status(PEER2_ADDR, true);
        node.liveness().set_status(PEER3_ADDR, true);

        let reached = node
            .announce(LogAction::Delete, "report.pdf", PeerId::new(1), PeerId::new(2))
            .await;

        assert_eq!(reached, 1);
        assert_eq!(transport.attempts_to(PEER2_ADDR), 0);
        let sent = transport.delivered_to(PEER3_ADDR);
        assert!(matches!(
            &sent[0],
            Message::SyncLogs(logs) if logs.logs[0].action == LogAction::Delete
                && logs.logs[0].target_id == PeerId::new(2)
        ));

        node.liveness().set_status(PEER3_ADDR, false);
        let reached = node
            .announce(LogAction::Transfer, "a.txt", PeerId::new(1), PeerId::new(2))
            .await;
        assert_eq!(reached, 0);
        assert_eq!(transport.attempts_to(PEER3_ADDR), 1);
    }

    #[tokio::test]
    async fn bystander_updates_target_snapshot() {
        let (_dir, node) = three_peer_node(MockTransport::new()).await;
        let node = Arc::new(node);
        node.snapshots()
            .replace(PEER2_ADDR, vec![FileRecord::file("report.pdf", Utc::now())]);

        node.apply_sync_log(SyncLogEntry {
            action: LogAction::Delete,
            file_name: "report.pdf".into(),
            origin_id: PeerId::new(3),
            target_id: PeerId::new(2),
        })
        .await;
        node.apply_sync_log(SyncLogEntry {
            action: LogAction::Transfer,
            file_name: "new.txt".into(),
            origin_id: PeerId::new(3),
            target_id: PeerId::new(2),
        })
        .await;

        let names: Vec<_> = node
            .snapshots()
            .records(PEER2_ADDR)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["new.txt"]);
    }

    #[tokio::test]
    async fn delete_addressed_to_us_removes_locally() {
        let (_dir, node) = three_peer_node(MockTransport::new()).await;
        let node = Arc::new(node);
        node.shared().write("old.txt", b"x").await.unwrap();

        node.apply_sync_log(SyncLogEntry {
            action: LogAction::Delete,
            file_name: "old.txt".into(),
            origin_id: PeerId::new(2),
            target_id: PeerId::new(1),
        })
        .await;

        assert!(node.shared().stat("old.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transfer_addressed_to_us_pulls_from_origin() {
        let transport = MockTransport::new();
        let (_dir, node) = three_peer_node(transport.clone()).await;
        let node = Arc::new(node);
        node.liveness().set_status(PEER2_ADDR, true);
        transport.queue_reply(
            PEER2_ADDR,
            Message::FileContent(sync_types::FileContent {
                name: "docs/a.txt".into(),
                content: b"hello".to_vec(),
            }),
        );

        node.apply_sync_log(SyncLogEntry {
            action: LogAction::Transfer,
            file_name: "docs/a.txt".into(),
            origin_id: PeerId::new(2),
            target_id: PeerId::new(1),
        })
        .await;

        for _ in 0..50 {
            if node.shared().stat("docs/a.txt").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(node.shared().read("docs/a.txt").await.unwrap(), b"hello");
        assert_eq!(
            transport.delivered_to(PEER2_ADDR)[0].message_type(),
            MessageType::GetFile
        );
    }
}
