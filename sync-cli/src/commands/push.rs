//! Push and relay files to peers.

use anyhow::Result;
use sync_daemon::{Node, Selection};
use sync_types::PeerId;

use super::print_report;

/// Run the push command: send a local entry to `targets`.
pub async fn run(node: &Node, name: &str, targets: &[PeerId]) -> Result<()> {
    let selection = Selection::new(node.local().id, name);
    let report = node.transfer_file(&selection, targets).await?;
    print_report(report);
    Ok(())
}

/// Run the relay command: copy an entry from `source` to `targets`.
///
/// Including the local id among `targets` also pulls the entry here.
pub async fn relay(node: &Node, source: PeerId, name: &str, targets: &[PeerId]) -> Result<()> {
    let report = node
        .transfer_file(&Selection::new(source, name), targets)
        .await?;
    print_report(report);
    Ok(())
}
