//! CLI command implementations.
//!
//! Every command except `serve` is a [`NodeCommand`]; the same enum is parsed
//! from the `serve` console, so one-shot and interactive use behave alike.

use anyhow::Result;
use clap::Subcommand;
use std::sync::Arc;
use sync_daemon::Node;

pub mod ls;
pub mod pending;
pub mod pull;
pub mod push;
pub mod rm;
pub mod serve;
pub mod status;

/// Operations on a running node.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Show peers, liveness and pending counts
    Status,

    /// List a peer's shared folder (cached listing if it is offline)
    Ls {
        /// Peer id
        peer: u32,
    },

    /// Show local files a peer is missing or holds an older copy of
    Diff {
        /// Peer id
        peer: u32,
    },

    /// Pull a file or directory from a peer
    Pull {
        /// Peer holding the entry
        peer: u32,
        /// Name relative to the shared root
        name: String,
        /// Save a file under its base name only
        #[arg(long)]
        flatten: bool,
    },

    /// Send a local file or directory to peers
    Push {
        /// Name relative to the shared root
        name: String,
        /// Target peer ids
        #[arg(required = true)]
        targets: Vec<u32>,
    },

    /// Copy a file or directory from one peer to others
    Relay {
        /// Peer holding the entry
        source: u32,
        /// Name relative to the shared root
        name: String,
        /// Target peer ids
        #[arg(required = true)]
        targets: Vec<u32>,
    },

    /// Delete a file or directory on a peer
    Rm {
        /// Peer holding the entry
        peer: u32,
        /// Name relative to the shared root
        name: String,
    },

    /// Show operations queued for offline peers
    Pending,

    /// Show the activity log
    Activity,
}

impl NodeCommand {
    /// Run against `node`, printing to stdout.
    pub async fn execute(self, node: &Arc<Node>) -> Result<()> {
        match self {
            NodeCommand::Status => status::run(node),
            NodeCommand::Ls { peer } => ls::run(node, peer.into()).await,
            NodeCommand::Diff { peer } => ls::diff(node, peer.into()).await,
            NodeCommand::Pull {
                peer,
                name,
                flatten,
            } => pull::run(node, peer.into(), &name, flatten).await,
            NodeCommand::Push { name, targets } => push::run(node, &name, &ids(&targets)).await,
            NodeCommand::Relay {
                source,
                name,
                targets,
            } => push::relay(node, source.into(), &name, &ids(&targets)).await,
            NodeCommand::Rm { peer, name } => rm::run(node, peer.into(), &name).await,
            NodeCommand::Pending => pending::run(node),
            NodeCommand::Activity => pending::activity(node).await,
        }
    }
}

fn ids(values: &[u32]) -> Vec<sync_types::PeerId> {
    values.iter().copied().map(Into::into).collect()
}

/// Print a transfer report the way every transfer command does.
pub(crate) fn print_report(report: sync_daemon::TransferReport) {
    if report.count > 0 {
        println!("Transferred {} file(s)", report.count);
    }
    if report.has_pending() {
        println!(
            "{} file(s) registered as pending; they will be sent when the peer is back",
            report.pending
        );
    }
    if report.count == 0 && !report.has_pending() {
        println!("Nothing to transfer");
    }
}
