//! Show node status.

use anyhow::Result;
use sync_core::PeerState;
use sync_daemon::Node;

/// Run the status command.
pub fn run(node: &Node) -> Result<()> {
    let local = node.local();
    println!("=== peerfs status ===");
    println!();
    println!("Node:");
    println!("  ID:     {}", local.id);
    println!("  Addr:   {}", local.address);
    println!("  Shared: {}", node.shared().path().display());
    println!();

    println!("Peers:");
    for peer in node.peer_statuses() {
        let state = match peer.state {
            PeerState::Online => "online",
            PeerState::Offline => "offline",
            PeerState::Unknown => "unknown",
        };
        let pending = if peer.pending > 0 {
            format!(" ({} pending)", peer.pending)
        } else {
            String::new()
        };
        println!("  [{}] {:<21} {}{}", peer.id, peer.address, state, pending);
    }

    Ok(())
}
