//! TcpTransport - one TCP connection per exchange.
//!
//! Frames are a single JSON object terminated by `\n`. The reader also accepts
//! a frame cut short by the peer closing its write half.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use sync_types::Message;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default bound for one frame (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for TcpTransport.
#[derive(Clone, Debug)]
pub struct TcpTransportConfig {
    /// Bound on establishing a connection for a request or send.
    pub dial_timeout: Duration,
    /// Bound on a liveness probe.
    pub probe_timeout: Duration,
    /// Bound on writing a request and reading its reply.
    pub io_timeout: Duration,
    /// Largest reply accepted.
    pub max_message_size: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_millis(1500),
            probe_timeout: Duration::from_millis(1000),
            io_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// TcpTransport implements the Transport trait over plain TCP.
#[derive(Clone, Debug, Default)]
pub struct TcpTransport {
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Create a transport with the given bounds.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    /// The bounds in use.
    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }

    async fn dial(&self, address: &str, limit: Duration) -> Result<TcpStream, TransportError> {
        match timeout(limit, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TransportError::Timeout(address.to_string())),
        }
    }
}

/// Encode `message` as one frame, refusing it if the body exceeds `max` bytes.
///
/// The receiver applies the same bound, so a frame refused here would have
/// been dropped on arrival.
pub fn encode_frame(message: &Message, max: usize) -> Result<Vec<u8>, TransportError> {
    let bytes = message.to_bytes()?;
    let size = bytes.len().saturating_sub(1);
    if size > max {
        return Err(TransportError::MessageTooLarge { size, max });
    }
    Ok(bytes)
}

/// Write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), TransportError> {
    write_encoded(writer, &message.to_bytes()?).await
}

async fn write_encoded<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), TransportError> {
    writer
        .write_all(bytes)
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
}

/// Read one raw frame of at most `max` bytes, newline excluded.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: R,
    max: usize,
) -> Result<Vec<u8>, TransportError> {
    // One extra byte so an oversized frame is detectable.
    let mut reader = BufReader::new(reader.take(max as u64 + 2));
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() > max {
        return Err(TransportError::MessageTooLarge {
            size: buf.len(),
            max,
        });
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(TransportError::ConnectionClosed);
    }
    Ok(buf)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn request(&self, address: &str, message: &Message) -> Result<Message, TransportError> {
        let max = self.config.max_message_size;
        let bytes = encode_frame(message, max)?;
        let mut stream = self.dial(address, self.config.dial_timeout).await?;

        let exchange = async {
            write_encoded(&mut stream, &bytes).await?;
            let frame = read_frame(&mut stream, max).await?;
            Ok::<_, TransportError>(Message::from_bytes(&frame)?)
        };

        let reply = timeout(self.config.io_timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(address.to_string()))??;

        tracing::debug!(
            "{} -> {}: {}",
            message.message_type(),
            address,
            reply.message_type()
        );
        Ok(reply)
    }

    async fn send(&self, address: &str, message: &Message) -> Result<(), TransportError> {
        let bytes = encode_frame(message, self.config.max_message_size)?;
        let mut stream = self.dial(address, self.config.dial_timeout).await?;

        let exchange = async {
            write_encoded(&mut stream, &bytes).await?;
            stream
                .shutdown()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        };

        timeout(self.config.io_timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(address.to_string()))??;

        tracing::debug!("{} -> {} (no reply)", message.message_type(), address);
        Ok(())
    }

    async fn probe(&self, address: &str) -> bool {
        match self.dial(address, self.config.probe_timeout).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", address, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{FilesList, GetFile};
    use tokio::net::TcpListener;

    async fn one_shot_server(reply: Option<Message>) -> (String, tokio::task::JoinHandle<Message>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.split();
            let frame = read_frame(read, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap();
            let request = Message::from_bytes(&frame).unwrap();
            if let Some(reply) = reply {
                write_frame(&mut write, &reply).await.unwrap();
            }
            request
        });
        (address, handle)
    }

    #[tokio::test]
    async fn request_round_trips_one_frame() {
        let (address, server) =
            one_shot_server(Some(Message::FilesList(FilesList { files: vec![] }))).await;
        let transport = TcpTransport::default();

        let reply = transport
            .request(&address, &Message::GetFiles)
            .await
            .unwrap();

        assert_eq!(reply, Message::FilesList(FilesList { files: vec![] }));
        assert_eq!(server.await.unwrap(), Message::GetFiles);
    }

    #[tokio::test]
    async fn send_does_not_wait_for_reply() {
        let (address, server) = one_shot_server(None).await;
        let transport = TcpTransport::default();
        let message = Message::GetFile(GetFile {
            name: "a.txt".into(),
        });

        transport.send(&address, &message).await.unwrap();
        assert_eq!(server.await.unwrap(), message);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let transport = TcpTransport::default();
        assert!(!transport.probe(&address).await);

        let err = transport
            .request(&address, &Message::GetFiles)
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn probe_succeeds_on_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        assert!(TcpTransport::default().probe(&address).await);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let data = vec![b'x'; 64];
        let err = read_frame(&data[..], 16).await.unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { max: 16, .. }));
    }

    #[tokio::test]
    async fn oversized_request_fails_before_dialing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let transport = TcpTransport::new(TcpTransportConfig {
            max_message_size: 16,
            ..TcpTransportConfig::default()
        });
        let message = Message::GetFile(GetFile {
            name: "a-rather-long-file-name.txt".into(),
        });

        let err = transport.send(&address, &message).await.unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { max: 16, .. }));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn encode_frame_bounds_the_body_only() {
        let body = Message::GetFiles.to_bytes().unwrap().len() - 1;
        assert!(encode_frame(&Message::GetFiles, body).is_ok());
        assert!(encode_frame(&Message::GetFiles, body - 1).is_err());
    }

    #[tokio::test]
    async fn frame_without_newline_is_accepted() {
        let data = br#"{"type":"GET_FILES"}"#;
        let frame = read_frame(&data[..], 1024).await.unwrap();
        assert_eq!(Message::from_bytes(&frame).unwrap(), Message::GetFiles);
    }

    #[tokio::test]
    async fn empty_stream_is_closed() {
        let err = read_frame(&b""[..], 1024).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }
}
