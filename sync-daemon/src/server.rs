//! TCP accept loop.
//!
//! One connection carries one request: read a JSON line, dispatch it, write
//! the reply if there is one, close. A bad connection never takes the
//! listener down.

use crate::error::Result;
use crate::handler::dispatch;
use crate::node::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sync_client::{encode_frame, read_frame, write_frame, TransportError};
use sync_types::{ErrorReply, Message, SyncError};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Listener serving the local node's shared root to peers.
pub struct SyncServer {
    node: Arc<Node>,
    listener: TcpListener,
    max_message_size: usize,
    read_timeout: Duration,
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

impl SyncServer {
    /// Bind the local peer's configured address.
    pub async fn bind(node: Arc<Node>, max_message_size: usize) -> Result<Self> {
        let address = node.local().address.clone();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!("Listening on {}", address);
        Ok(Self::from_listener(node, listener, max_message_size))
    }

    /// Serve on an already bound listener.
    pub fn from_listener(node: Arc<Node>, listener: TcpListener, max_message_size: usize) -> Self {
        Self {
            node,
            listener,
            max_message_size,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Give up on a connection that has not sent a full request within `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is aborted.
    pub async fn run(self) {
        loop {
            let (stream, remote) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            tracing::debug!("Connection from {}", remote);

            let node = Arc::clone(&self.node);
            let max = self.max_message_size;
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                handle_connection(node, stream, max, read_timeout).await;
            });
        }
    }

    /// Run the accept loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

async fn handle_connection(
    node: Arc<Node>,
    mut stream: TcpStream,
    max_message_size: usize,
    read_timeout: Duration,
) {
    let remote = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let frame = match tokio::time::timeout(read_timeout, read_frame(&mut stream, max_message_size))
        .await
    {
        Ok(Ok(frame)) => frame,
        Ok(Err(TransportError::ConnectionClosed)) => {
            tracing::debug!("{} closed without a request", remote);
            return;
        }
        Ok(Err(e)) => {
            tracing::warn!("Bad request from {}: {}", remote, e);
            return;
        }
        Err(_) => {
            tracing::warn!("Request timeout for {}", remote);
            return;
        }
    };

    let message = match Message::from_bytes(&frame) {
        Ok(message) => message,
        Err(SyncError::UnknownMessageType(kind)) => {
            tracing::warn!("Unknown message type {} from {}", kind, remote);
            return;
        }
        Err(e) => {
            tracing::warn!("Undecodable request from {}: {}", remote, e);
            return;
        }
    };

    if let Some(reply) = dispatch(&node, message).await {
        let reply = within_limit(reply, max_message_size, &remote);
        if let Err(e) = write_frame(&mut stream, &reply).await {
            tracing::warn!("Reply to {} failed: {}", remote, e);
            return;
        }
    }
    let _ = stream.shutdown().await;
}

/// Peers apply the same frame limit, so a larger reply would be dropped unread.
fn within_limit(reply: Message, max: usize, remote: &str) -> Message {
    match encode_frame(&reply, max) {
        Ok(_) => reply,
        Err(e) => {
            tracing::warn!("Refusing reply to {}: {}", remote, e);
            Message::Error(ErrorReply {
                error: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::three_peer_node;
    use sync_client::MockTransport;
    use tokio::io::AsyncReadExt;

    async fn serve() -> (tempfile::TempDir, SocketAddr, JoinHandle<()>) {
        let (dir, node) = three_peer_node(MockTransport::new()).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = SyncServer::from_listener(Arc::new(node), listener, 1024)
            .with_read_timeout(Duration::from_secs(2));
        let addr = server.local_addr().unwrap();
        (dir, addr, server.spawn())
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn answers_get_files() {
        let (_dir, addr, handle) = serve().await;

        let reply = exchange(addr, b"{\"type\":\"GET_FILES\"}\n").await;
        assert_eq!(
            Message::from_bytes(&reply).unwrap(),
            Message::FilesList(sync_types::FilesList { files: vec![] })
        );
        handle.abort();
    }

    #[tokio::test]
    async fn oversized_file_reply_becomes_error() {
        let (dir, addr, handle) = serve().await;
        tokio::fs::write(dir.path().join("shared").join("big.bin"), vec![7u8; 4096])
            .await
            .unwrap();

        let request = b"{\"type\":\"GET_FILE\",\"name\":\"big.bin\"}\n";
        let reply = exchange(addr, request).await;
        assert!(reply.len() <= 1024 + 1);
        assert!(matches!(
            Message::from_bytes(&reply).unwrap(),
            Message::Error(_)
        ));
        handle.abort();
    }

    #[tokio::test]
    async fn unknown_and_malformed_requests_close_quietly() {
        let (_dir, addr, handle) = serve().await;

        assert!(exchange(addr, b"{\"type\":\"PING\"}\n").await.is_empty());
        assert!(exchange(addr, b"not json\n").await.is_empty());

        // Still serving.
        let reply = exchange(addr, b"{\"type\":\"GET_FILES\"}\n").await;
        assert!(!reply.is_empty());
        handle.abort();
    }
}
