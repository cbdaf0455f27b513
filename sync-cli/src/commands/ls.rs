//! List and compare shared folders.

use anyhow::Result;
use sync_daemon::Node;
use sync_types::{FileRecord, PeerId};

/// Run the ls command.
pub async fn run(node: &Node, peer: PeerId) -> Result<()> {
    let listing = node.list(peer).await?;
    if listing.stale {
        println!("Peer {} is offline; showing last known listing", peer);
    }
    if listing.files.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    for record in &listing.files {
        let marker = node.pending().marker_for(peer, &record.name).unwrap_or(" ");
        println!("{} {}", marker, format_record(record));
    }
    Ok(())
}

/// Run the diff command.
pub async fn diff(node: &Node, peer: PeerId) -> Result<()> {
    let outdated = node.outdated_on(peer).await?;
    if outdated.is_empty() {
        println!("Peer {} is up to date", peer);
        return Ok(());
    }

    println!("Missing or older on peer {}:", peer);
    for record in &outdated {
        println!("  {}", format_record(record));
    }
    Ok(())
}

fn format_record(record: &FileRecord) -> String {
    let name = if record.is_directory {
        format!("{}/", record.name)
    } else {
        record.name.clone()
    };
    format!(
        "{}  {}",
        record.modified_at.format("%Y-%m-%d %H:%M:%S"),
        name
    )
}
