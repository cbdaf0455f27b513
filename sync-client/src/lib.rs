//! # sync-client
//!
//! Outbound side of the peerfs replication protocol.
//!
//! Every request is a single TCP connection carrying one JSON line each way.
//! This crate owns that exchange and nothing else: deciding what to do when
//! a peer is unreachable is left to `sync-daemon`.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable transport layer (TCP, mock)
//! - **Bounded Dials**: every connection attempt has a timeout
//! - **Typed Requests**: [`PeerClient`] maps replies onto results
//!
//! ## Example
//!
//! ```ignore
//! use sync_client::{PeerClient, TcpTransport, TcpTransportConfig};
//!
//! let client = PeerClient::new(TcpTransport::new(TcpTransportConfig::default()));
//! let files = client.get_files("127.0.0.1:9002").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod transport;

pub use client::{ClientError, PeerClient};
pub use transport::{
    encode_frame, read_frame, write_frame, MockTransport, TcpTransport, TcpTransportConfig,
    Transport, TransportError, DEFAULT_MAX_MESSAGE_SIZE,
};
