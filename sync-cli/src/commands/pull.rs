//! Pull files from a peer.

use anyhow::Result;
use sync_daemon::{Node, Outcome, Selection};
use sync_types::PeerId;

use super::print_report;

/// Run the pull command.
///
/// Directories are pulled with their structure; `flatten` applies to single
/// files only.
pub async fn run(node: &Node, peer: PeerId, name: &str, flatten: bool) -> Result<()> {
    if flatten {
        match node.request_file(peer, name, true).await? {
            Outcome::Done => println!("Pulled {}", name),
            Outcome::Pending => println!(
                "Peer {} is offline; pull of {} registered as pending",
                peer, name
            ),
        }
        return Ok(());
    }

    let report = node.transfer_file(&Selection::new(peer, name), &[]).await?;
    print_report(report);
    Ok(())
}
