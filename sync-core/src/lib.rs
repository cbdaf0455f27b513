//! # sync-core
//!
//! Pure replication logic for peerfs (no network, no disk).
//!
//! This crate holds the state every other part of a node shares and the
//! decisions that do not need I/O to be made:
//! - [`PeerRegistry`] - the static peer set
//! - [`LivenessTracker`] - last probe result per peer and its transitions
//! - [`SnapshotCache`] - last known listing per peer
//! - [`PendingQueue`] - deferred operations per unreachable peer
//! - [`resync::plan`] - how a drained operation is replayed
//! - [`diff::missing_or_outdated`] - listing comparison
//!
//! The stores are internally synchronized and meant to be shared behind an
//! `Arc`. The actual I/O is performed by `sync-client` and `sync-daemon`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod liveness;
pub mod pending;
pub mod registry;
pub mod resync;
pub mod snapshot;

pub use liveness::{LivenessTracker, PeerState, Transition};
pub use pending::{PendingKind, PendingOperation, PendingQueue};
pub use registry::{PeerEntry, PeerIdentity, PeerRegistry, RegistryError};
pub use resync::ReplayAction;
pub use snapshot::SnapshotCache;
