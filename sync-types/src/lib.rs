//! # sync-types
//!
//! Wire format types for the peerfs replication protocol.
//!
//! This crate provides the foundational types used across all peerfs crates:
//! - [`PeerId`] - Peer identity
//! - [`FileRecord`] - One entry of a shared-folder listing
//! - [`Message`] - Protocol messages (GET_FILES, SEND_FILE, SYNC_LOGS, etc.)
//! - [`path`] - Normalization of shared-root relative names
//! - [`SyncError`] - Error types
//!
//! Every message travels as a single JSON object terminated by a newline,
//! one request per TCP connection.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
pub mod path;
mod record;

pub use error::SyncError;
pub use ids::PeerId;
pub use messages::{
    DeleteAck, DeleteRequest, DeleteStatus, ErrorReply, FileContent, FilesList, GetFile, LogAction,
    Message, MessageType, SendFile, SyncLogEntry, SyncLogs,
};
pub use record::FileRecord;
