//! PeerClient - typed requests against a peer address.
//!
//! This module provides [`PeerClient`], one method per request in the
//! protocol. Each call is a single connection; replies of the wrong type are
//! protocol errors, dial failures are connectivity errors that callers turn
//! into pending operations.
//!
//! # Example
//!
//! ```ignore
//! use sync_client::{MockTransport, PeerClient};
//!
//! let client = PeerClient::new(MockTransport::new());
//! let files = client.get_files("127.0.0.1:9002").await?;
//! ```

use std::sync::Arc;
use sync_types::{
    DeleteRequest, DeleteStatus, FileRecord, GetFile, Message, MessageType, SendFile,
    SyncLogEntry, SyncLogs,
};
use thiserror::Error;

use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer answered with an ERROR reply.
    #[error("peer reported: {0}")]
    Remote(String),

    /// The peer answered with a reply of the wrong type.
    #[error("expected {expected} reply, got {got}")]
    UnexpectedReply {
        /// Reply type the request calls for.
        expected: MessageType,
        /// Reply type received.
        got: MessageType,
    },
}

impl ClientError {
    /// Whether the peer should be treated as offline right now.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_unreachable())
    }
}

/// Typed access to peers over a shared [`Transport`].
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct PeerClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for PeerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerClient").finish_non_exhaustive()
    }
}

impl PeerClient {
    /// Create a client over `transport`.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a client over an already shared transport.
    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Whether `address` accepts connections right now.
    pub async fn probe(&self, address: &str) -> bool {
        self.transport.probe(address).await
    }

    /// GET_FILES: the peer's full listing.
    pub async fn get_files(&self, address: &str) -> Result<Vec<FileRecord>, ClientError> {
        match self.transport.request(address, &Message::GetFiles).await? {
            Message::FilesList(list) => Ok(list.files),
            other => Err(unexpected(MessageType::FilesList, other)),
        }
    }

    /// GET_FILE: the bytes of one file.
    ///
    /// A missing file or a directory comes back as [`ClientError::Remote`].
    pub async fn get_file(&self, address: &str, name: &str) -> Result<Vec<u8>, ClientError> {
        let request = Message::GetFile(GetFile {
            name: name.to_string(),
        });
        match self.transport.request(address, &request).await? {
            Message::FileContent(file) => Ok(file.content),
            other => Err(unexpected(MessageType::FileContent, other)),
        }
    }

    /// SEND_FILE with content. No reply is awaited.
    pub async fn send_file(
        &self,
        address: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<(), ClientError> {
        let message = Message::SendFile(SendFile::file(name, content));
        Ok(self.transport.send(address, &message).await?)
    }

    /// SEND_FILE announcing an empty directory. No reply is awaited.
    pub async fn send_directory(&self, address: &str, name: &str) -> Result<(), ClientError> {
        let message = Message::SendFile(SendFile::directory(name));
        Ok(self.transport.send(address, &message).await?)
    }

    /// DELETE_FILE or DELETE_DIR, returning the acknowledged status.
    pub async fn delete(
        &self,
        address: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<DeleteStatus, ClientError> {
        let body = DeleteRequest {
            name: name.to_string(),
        };
        let request = if is_dir {
            Message::DeleteDir(body)
        } else {
            Message::DeleteFile(body)
        };
        match self.transport.request(address, &request).await? {
            Message::DeleteAck(ack) => Ok(ack.status),
            other => Err(unexpected(MessageType::DeleteAck, other)),
        }
    }

    /// SYNC_LOGS gossip. No reply is awaited.
    pub async fn sync_logs(
        &self,
        address: &str,
        logs: Vec<SyncLogEntry>,
    ) -> Result<(), ClientError> {
        let message = Message::SyncLogs(SyncLogs { logs });
        Ok(self.transport.send(address, &message).await?)
    }
}

fn unexpected(expected: MessageType, got: Message) -> ClientError {
    match got {
        Message::Error(reply) => ClientError::Remote(reply.error),
        other => ClientError::UnexpectedReply {
            expected,
            got: other.message_type(),
        },
    }
}
