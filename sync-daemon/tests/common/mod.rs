//! A cluster of real nodes on 127.0.0.1 ephemeral ports.

#![allow(dead_code)]

use peerfs_sync_daemon::{Node, SharedRoot, SyncServer};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sync_client::{PeerClient, TcpTransport, TcpTransportConfig};
use sync_core::{PeerIdentity, PeerRegistry};
use sync_types::PeerId;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub fn transport_config() -> TcpTransportConfig {
    TcpTransportConfig {
        dial_timeout: Duration::from_millis(300),
        probe_timeout: Duration::from_millis(300),
        io_timeout: Duration::from_secs(2),
        max_message_size: MAX_MESSAGE_SIZE,
    }
}

pub struct Cluster {
    _dir: TempDir,
    pub nodes: Vec<Arc<Node>>,
    addresses: Vec<SocketAddr>,
    servers: Vec<Option<JoinHandle<()>>>,
}

impl Cluster {
    /// `size` nodes with ids 1..=size, all serving.
    pub async fn start(size: usize) -> Self {
        let mut cluster = Self::build(size).await;
        for id in 1..=size {
            cluster.serve(id).await;
        }
        cluster
    }

    /// `size` nodes with ids 1..=size, none serving yet.
    pub async fn build(size: usize) -> Self {
        let dir = TempDir::new().unwrap();

        // Reserve ports first so every registry knows every address.
        let mut addresses = Vec::new();
        for _ in 0..size {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addresses.push(listener.local_addr().unwrap());
        }

        let mut nodes = Vec::new();
        for local in 0..size {
            let peers = addresses
                .iter()
                .enumerate()
                .map(|(i, addr)| PeerIdentity::new(i as u32 + 1, addr.to_string(), i == local))
                .collect();
            let registry = PeerRegistry::new(peers).unwrap();
            let shared = SharedRoot::open(dir.path().join(format!("node{}", local + 1)))
                .await
                .unwrap();
            let client = PeerClient::new(TcpTransport::new(transport_config()));
            nodes.push(Arc::new(Node::new(registry, shared, client)));
        }

        Self {
            _dir: dir,
            nodes,
            addresses,
            servers: (0..size).map(|_| None).collect(),
        }
    }

    pub fn node(&self, id: usize) -> &Arc<Node> {
        &self.nodes[id - 1]
    }

    pub fn address(&self, id: usize) -> String {
        self.addresses[id - 1].to_string()
    }

    /// Start serving node `id` on its reserved port.
    pub async fn serve(&mut self, id: usize) {
        let addr = self.addresses[id - 1];
        let mut attempts = 0;
        let listener = loop {
            match TcpListener::bind(addr).await {
                Ok(listener) => break listener,
                Err(e) if attempts < 50 => {
                    attempts += 1;
                    tracing::debug!("Rebinding {} failed: {}", addr, e);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(e) => panic!("cannot bind {addr}: {e}"),
            }
        };
        let server = SyncServer::from_listener(Arc::clone(self.node(id)), listener, MAX_MESSAGE_SIZE)
            .with_read_timeout(Duration::from_secs(2));
        self.servers[id - 1] = Some(server.spawn());
    }

    /// Stop serving node `id`; its port refuses connections afterwards.
    pub async fn halt(&mut self, id: usize) {
        if let Some(handle) = self.servers[id - 1].take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for handle in self.servers.iter().flatten() {
            handle.abort();
        }
    }
}

pub fn id(value: u32) -> PeerId {
    PeerId::new(value)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
