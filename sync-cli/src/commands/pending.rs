//! Inspect queued operations and the activity log.

use anyhow::Result;
use sync_core::PendingKind;
use sync_daemon::Node;

/// Run the pending command.
pub fn run(node: &Node) -> Result<()> {
    let peers = node.pending().peers_with_pending();
    if peers.is_empty() {
        println!("No pending operations");
        return Ok(());
    }

    for peer in peers {
        println!("Peer {}:", peer);
        for op in node.pending().peek(peer) {
            let verb = match op.kind {
                PendingKind::Send => format!("send from {}", op.source_id),
                PendingKind::Get => format!("get into {}", op.target_id),
                PendingKind::Delete if op.is_dir => "delete directory".to_string(),
                PendingKind::Delete => "delete".to_string(),
            };
            println!("  {} {} ({})", op.kind.marker(), op.path, verb);
        }
    }
    Ok(())
}

/// Run the activity command.
pub async fn activity(node: &Node) -> Result<()> {
    let Some(log) = node.activity() else {
        println!("Activity log disabled; set [activity_log] enabled = true");
        return Ok(());
    };

    let entries = log.entries().await?;
    if entries.is_empty() {
        println!("No activity recorded in {}", log.path().display());
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<8} {}  {} -> {}",
            entry.at.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.file_name,
            entry.origin_id,
            entry.target_id
        );
    }
    Ok(())
}
