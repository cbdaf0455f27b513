//! Fixtures shared by unit tests.

use crate::node::Node;
use crate::shared::SharedRoot;
use sync_client::{MockTransport, PeerClient};
use sync_core::{PeerIdentity, PeerRegistry};
use tempfile::TempDir;

pub(crate) const LOCAL_ADDR: &str = "127.0.0.1:9001";
pub(crate) const PEER2_ADDR: &str = "127.0.0.1:9002";
pub(crate) const PEER3_ADDR: &str = "127.0.0.1:9003";

/// Node 1 of {1 local, 2, 3}, talking through `transport`.
pub(crate) async fn three_peer_node(transport: MockTransport) -> (TempDir, Node) {
    let dir = TempDir::new().unwrap();
    let registry = PeerRegistry::new(vec![
        PeerIdentity::new(1, LOCAL_ADDR, true),
        PeerIdentity::new(2, PEER2_ADDR, false),
        PeerIdentity::new(3, PEER3_ADDR, false),
    ])
    .unwrap();
    let shared = SharedRoot::open(dir.path().join("shared")).await.unwrap();
    let node = Node::new(registry, shared, PeerClient::new(transport));
    (dir, node)
}
