//! Error types for a peerfs node.

use sync_client::ClientError;
use sync_core::RegistryError;
use sync_types::{PeerId, SyncError};

/// Main error type for node operations.
///
/// Connectivity failures are usually absorbed into pending operations before
/// they reach this type; [`NodeError::is_soft`] tells the remaining ones apart.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Unknown peer id or invalid peer set.
    #[error("peer registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Request to a peer failed.
    #[error("peer request failed: {0}")]
    Client(#[from] ClientError),

    /// Name rejected by path validation.
    #[error("invalid name: {0}")]
    Path(#[from] SyncError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local path does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A file was expected but the path is a directory.
    #[error("{0} is a directory")]
    IsDirectory(String),

    /// A peer needed right now is unreachable and the operation cannot be queued.
    #[error("peer {0} is unreachable")]
    Unreachable(PeerId),

    /// The file does not fit in one protocol frame.
    #[error("{name} needs a {size} byte frame, limit is {max}")]
    TooLarge {
        /// Relative name of the file.
        name: String,
        /// Encoded frame size.
        size: usize,
        /// Configured frame bound.
        max: usize,
    },

    /// Selection and targets match no transfer branch.
    #[error("no valid transfer operation for this selection")]
    NoTransferOperation,

    /// A spawned operation panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl NodeError {
    /// Whether the failure is a connectivity problem rather than a hard error.
    pub fn is_soft(&self) -> bool {
        match self {
            NodeError::Unreachable(_) => true,
            NodeError::Client(e) => e.is_unreachable(),
            _ => false,
        }
    }
}

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sync_client::TransportError;

    #[test]
    fn connectivity_errors_are_soft() {
        assert!(NodeError::Unreachable(PeerId::new(2)).is_soft());

        let dial = ClientError::Transport(TransportError::Timeout("10.0.0.2:9000".into()));
        assert!(NodeError::from(dial).is_soft());
    }

    #[test]
    fn filesystem_and_protocol_errors_are_hard() {
        assert!(!NodeError::NotFound("a.txt".into()).is_soft());
        assert!(!NodeError::from(ClientError::Remote("missing".into())).is_soft());
        assert!(!NodeError::NoTransferOperation.is_soft());
        let too_large = NodeError::TooLarge {
            name: "big.bin".into(),
            size: 2048,
            max: 1024,
        };
        assert!(!too_large.is_soft());
    }

    #[test]
    fn messages_name_the_path() {
        assert_eq!(
            NodeError::IsDirectory("docs".into()).to_string(),
            "docs is a directory"
        );
    }
}
