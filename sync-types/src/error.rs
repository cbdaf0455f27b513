//! Error types for peerfs wire handling.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or validating wire data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The object carried no `type` discriminator
    #[error("message has no type field")]
    MissingMessageType,

    /// The `type` discriminator names no known message
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A name is not a valid shared-root relative path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::UnknownMessageType("PING".into());
        assert_eq!(err.to_string(), "unknown message type: PING");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
