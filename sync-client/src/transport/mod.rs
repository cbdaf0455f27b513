//! Transport abstraction for peerfs.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (TCP, mock for testing).
//!
//! # Design
//!
//! Every exchange is one connection, one request and at most one reply:
//! - `request()` writes a message and waits for the single reply
//! - `send()` writes a fire-and-forget message and closes
//! - `probe()` only checks that the address accepts connections
//!
//! There is no session state: a failed dial means "unreachable right now",
//! independent of anything that happened before.
//!
//! # Example
//!
//! ```ignore
//! let transport = TcpTransport::new(TcpTransportConfig::default());
//! let reply = transport.request("127.0.0.1:9001", &Message::GetFiles).await?;
//! ```

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::{
    encode_frame, read_frame, write_frame, TcpTransport, TcpTransportConfig,
    DEFAULT_MAX_MESSAGE_SIZE,
};

use async_trait::async_trait;
use sync_types::{Message, SyncError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Dial failed.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// Address that was dialed.
        address: String,
        /// Underlying reason.
        reason: String,
    },

    /// Dial or exchange did not finish in time.
    #[error("timed out talking to {0}")]
    Timeout(String),

    /// Peer closed the connection before replying.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Reply exceeded the size bound.
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Bytes read before giving up.
        size: usize,
        /// Configured bound.
        max: usize,
    },

    /// Reply could not be decoded, or request could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] SyncError),
}

impl TransportError {
    /// Whether the peer should be treated as unreachable right now.
    ///
    /// Connectivity failures degrade operations to pending; codec failures do not.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { .. }
                | TransportError::Timeout(_)
                | TransportError::ConnectionClosed
                | TransportError::SendFailed(_)
                | TransportError::ReceiveFailed(_)
        )
    }
}

/// Transport trait for exchanging protocol messages with a peer address.
///
/// Implementations handle the underlying connection mechanism
/// (TCP, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` to `address` and wait for its one reply.
    async fn request(&self, address: &str, message: &Message) -> Result<Message, TransportError>;

    /// Send `message` to `address` without waiting for a reply.
    async fn send(&self, address: &str, message: &Message) -> Result<(), TransportError>;

    /// Whether `address` accepts a connection within the probe timeout.
    async fn probe(&self, address: &str) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn request(&self, address: &str, message: &Message) -> Result<Message, TransportError> {
        (**self).request(address, message).await
    }

    async fn send(&self, address: &str, message: &Message) -> Result<(), TransportError> {
        (**self).send(address, message).await
    }

    async fn probe(&self, address: &str) -> bool {
        (**self).probe(address).await
    }
}
