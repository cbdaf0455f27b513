//! # sync-daemon
//!
//! A peerfs node: serves its shared root to peers and replicates files to
//! and from them.
//!
//! Every peer in the configured set runs the same node. There is no leader:
//! each node answers requests for its own files and drives transfers, deletes
//! and relays on behalf of its user.
//!
//! ## Architecture
//!
//! ```text
//!   user / CLI ──► Node ──► PeerClient ──TCP──► peer SyncServer ──► handler
//!                   │                                                │
//!                   ├── LivenessTracker   (who is online)            │
//!                   ├── SnapshotCache     (what they last held)      │
//!                   └── PendingQueue      (what they missed)  ◄──────┘
//!                            ▲                                 SYNC_LOGS
//!                            └── scheduler tick ─► resync on reconnect
//! ```
//!
//! ## Offline peers
//!
//! Operations aimed at a peer that is offline, or whose dial fails, are
//! queued under that peer and replayed in order once the scheduler sees it
//! come back. Failed replays are dropped and reported to the
//! [`SyncObserver`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod config;
pub mod delete;
pub mod error;
pub mod gossip;
pub mod handler;
pub mod node;
pub mod observer;
pub mod resync;
pub mod scheduler;
pub mod server;
pub mod shared;
pub mod transfer;

#[cfg(test)]
mod test_support;

pub use activity::{ActivityEntry, ActivityLog};
pub use config::{Config, ConfigError};
pub use delete::{DeleteOutcome, DeleteTicket};
pub use error::{NodeError, Result};
pub use node::{Listing, Node, PeerStatus, Selection};
pub use observer::{ChannelObserver, NodeEvent, NoopObserver, SyncObserver};
pub use resync::{ReplayFailure, ResyncReport};
pub use scheduler::{spawn_scheduler_task, TickReport};
pub use server::SyncServer;
pub use shared::SharedRoot;
pub use transfer::{Outcome, TransferReport};
