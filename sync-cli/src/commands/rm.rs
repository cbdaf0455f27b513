//! Delete on a peer.

use anyhow::Result;
use std::sync::Arc;
use sync_daemon::{DeleteOutcome, Node, NodeError, Selection};
use sync_types::{DeleteStatus, PeerId};

/// Run the rm command, waiting for the peer's ack.
pub async fn run(node: &Arc<Node>, peer: PeerId, name: &str) -> Result<()> {
    match node.delete(&Selection::new(peer, name)).await? {
        DeleteOutcome::Deleted => println!("Deleted {}", name),
        DeleteOutcome::Pending { queued } => println!(
            "Peer {} is offline; delete of {} registered as pending ({} operation(s))",
            peer, name, queued
        ),
        DeleteOutcome::Dispatched(ticket) => match ticket.wait().await {
            Ok(DeleteStatus::Ok) => println!("Peer {} deleted {}", peer, name),
            Ok(DeleteStatus::Error) => {
                println!("Peer {} could not delete {} (missing?)", peer, name)
            }
            Err(NodeError::Unreachable(_)) => println!(
                "Peer {} went offline; delete of {} registered as pending",
                peer, name
            ),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}
