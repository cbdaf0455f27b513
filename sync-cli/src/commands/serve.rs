//! Serve command - run the node until interrupted.
//!
//! Starts the TCP server and the sync scheduler, prints observer events as
//! they arrive, and reads [`NodeCommand`] lines from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use sync_daemon::{spawn_scheduler_task, ChannelObserver, Config, Node, NodeEvent, SyncServer};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::NodeCommand;

/// One console line.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "console")]
struct ConsoleLine {
    #[command(subcommand)]
    command: NodeCommand,
}

/// Run the serve command.
pub async fn run(config: Config) -> Result<()> {
    let (observer, events) = ChannelObserver::new();
    let node = Arc::new(
        Node::from_config(&config)
            .await
            .context("Failed to start node")?
            .with_observer(Arc::new(observer)),
    );

    let server = SyncServer::bind(Arc::clone(&node), config.node.max_message_size)
        .await
        .context("Failed to bind listener")?
        .with_read_timeout(Duration::from_millis(config.network.io_timeout_ms));
    let server_handle = server.spawn();
    let scheduler_handle = spawn_scheduler_task(Arc::clone(&node), config.scheduler.clone());
    let events_handle = tokio::spawn(print_events(events));

    println!(
        "peerfs node {} serving {} on {}",
        node.local().id,
        node.shared().path().display(),
        node.local().address
    );
    println!("Type 'help' for commands, 'quit' to stop.");

    tokio::select! {
        result = console(&node) => result?,
        _ = tokio::signal::ctrl_c() => println!(),
    }

    println!("Shutting down...");
    scheduler_handle.abort();
    server_handle.abort();
    events_handle.abort();
    Ok(())
}

async fn console(node: &Arc<Node>) -> Result<()> {
    let mut lines = stdin_lines();

    loop {
        let Some(line) = lines.recv().await else {
            // Stdin closed: keep serving until interrupted.
            std::future::pending::<()>().await;
            return Ok(());
        };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => return Ok(()),
            _ => {}
        }

        match ConsoleLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => {
                if let Err(e) = parsed.command.execute(node).await {
                    println!("Error: {:#}", e);
                }
            }
            // Covers `help` too.
            Err(e) => println!("{}", e),
        }
    }
}

/// Stdin lines read on a plain thread, so a pending read never holds up shutdown.
fn stdin_lines() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn print_events(mut events: UnboundedReceiver<NodeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            NodeEvent::StatusChanged { peer, online } => {
                println!(
                    "* peer {} is {}",
                    peer,
                    if online { "online" } else { "offline" }
                );
            }
            NodeEvent::FileListChanged { peer, files } => {
                tracing::debug!("Peer {} lists {} entries", peer, files.len());
            }
            NodeEvent::ReplayFailed { peer, op, error } => {
                println!(
                    "* pending {} {} for peer {} dropped: {}",
                    op.kind.marker(),
                    op.path,
                    peer,
                    error
                );
            }
        }
    }
}
