//! # peerfs
//!
//! Command-line front-end for a peerfs node.
//!
//! ## Commands
//!
//! - `serve`: Run the node (server + scheduler) with an interactive console
//! - `status`: Show peers, liveness and pending counts
//! - `ls`: List a peer's shared folder
//! - `diff`: Show local files a peer is missing or has an older copy of
//! - `pull` / `push` / `relay`: Move files between peers
//! - `rm`: Delete a file or directory on a peer
//! - `pending`: Show queued operations
//! - `activity`: Show the activity log
//!
//! ## Example
//!
//! ```bash
//! # Run node 1 of the peer set in config/peers.json
//! peerfs --config node1.toml serve
//!
//! # From another shell, push a file to peers 2 and 3
//! peerfs --config node1.toml push report.pdf 2 3
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use sync_daemon::{Config, Node};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{serve, NodeCommand};

/// Command-line front-end for a peerfs node.
#[derive(Parser, Debug)]
#[command(name = "peerfs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Node configuration file (default: peerfs.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the node: serve peers, tick the scheduler, read commands from stdin
    Serve,

    #[command(flatten)]
    Node(NodeCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve => serve::run(config).await?,
        Commands::Node(command) => {
            let node = Arc::new(
                Node::from_config(&config)
                    .await
                    .context("Failed to start node")?,
            );
            // One pass so liveness is known before acting.
            node.tick().await;
            command.execute(&node).await?;
        }
    }

    Ok(())
}
