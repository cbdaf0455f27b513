//! Mock transport for testing.
//!
//! Allows queueing replies per address, marking addresses unreachable, and
//! capturing every attempted exchange for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use sync_types::Message;

/// Mock transport for testing.
///
/// Every address is reachable unless marked offline. Clones share state.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    offline: HashSet<String>,
    replies: HashMap<String, VecDeque<Message>>,
    attempts: Vec<String>,
    delivered: Vec<(String, Message)>,
    probes: Vec<String>,
    fail_next: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` reachable or not.
    pub fn set_online(&self, address: &str, online: bool) {
        let mut inner = self.inner.lock().unwrap();
        if online {
            inner.offline.remove(address);
        } else {
            inner.offline.insert(address.to_string());
        }
    }

    /// Queue a reply for the next `request()` to `address`.
    pub fn queue_reply(&self, address: &str, reply: Message) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .replies
            .entry(address.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Cause the next request or send, to any address, to fail to dial.
    pub fn fail_next(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next = Some(reason.to_string());
    }

    /// Every message that reached an address, in order.
    pub fn delivered(&self) -> Vec<(String, Message)> {
        let inner = self.inner.lock().unwrap();
        inner.delivered.clone()
    }

    /// Messages that reached `address`, in order.
    pub fn delivered_to(&self, address: &str) -> Vec<Message> {
        let inner = self.inner.lock().unwrap();
        inner
            .delivered
            .iter()
            .filter(|(to, _)| to == address)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Number of requests and sends attempted against `address`, reachable or not.
    pub fn attempts_to(&self, address: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.attempts.iter().filter(|to| *to == address).count()
    }

    /// Number of probes issued against `address`.
    pub fn probes_of(&self, address: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.probes.iter().filter(|to| *to == address).count()
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }

    fn deliver(&self, address: &str, message: &Message) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.push(address.to_string());

        if let Some(reason) = inner.fail_next.take() {
            return Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason,
            });
        }
        if inner.offline.contains(address) {
            return Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        inner
            .delivered
            .push((address.to_string(), message.clone()));
        Ok(())
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, address: &str, message: &Message) -> Result<Message, TransportError> {
        self.deliver(address, message)?;

        let mut inner = self.inner.lock().unwrap();
        inner
            .replies
            .get_mut(address)
            .and_then(VecDeque::pop_front)
            .ok_or(TransportError::ConnectionClosed)
    }

    async fn send(&self, address: &str, message: &Message) -> Result<(), TransportError> {
        self.deliver(address, message)
    }

    async fn probe(&self, address: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.probes.push(address.to_string());
        !inner.offline.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{DeleteAck, DeleteRequest, DeleteStatus, GetFile};

    const ADDR: &str = "127.0.0.1:9002";

    #[tokio::test]
    async fn queued_replies_come_back_in_order() {
        let transport = MockTransport::new();
        transport.queue_reply(
            ADDR,
            Message::DeleteAck(DeleteAck {
                status: DeleteStatus::Ok,
            }),
        );
        transport.queue_reply(
            ADDR,
            Message::DeleteAck(DeleteAck {
                status: DeleteStatus::Error,
            }),
        );

        let request = Message::DeleteFile(DeleteRequest {
            name: "a.txt".into(),
        });
        let first = transport.request(ADDR, &request).await.unwrap();
        let second = transport.request(ADDR, &request).await.unwrap();

        assert!(matches!(
            first,
            Message::DeleteAck(DeleteAck {
                status: DeleteStatus::Ok
            })
        ));
        assert!(matches!(
            second,
            Message::DeleteAck(DeleteAck {
                status: DeleteStatus::Error
            })
        ));
    }

    #[tokio::test]
    async fn request_without_reply_is_closed() {
        let transport = MockTransport::new();
        let result = transport.request(ADDR, &Message::GetFiles).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn offline_address_refuses_and_counts_attempt() {
        let transport = MockTransport::new();
        transport.set_online(ADDR, false);

        let err = transport.send(ADDR, &Message::GetFiles).await.unwrap_err();
        assert!(err.is_unreachable());
        assert!(!transport.probe(ADDR).await);
        assert_eq!(transport.attempts_to(ADDR), 1);
        assert_eq!(transport.probes_of(ADDR), 1);
        assert!(transport.delivered().is_empty());

        transport.set_online(ADDR, true);
        transport.send(ADDR, &Message::GetFiles).await.unwrap();
        assert_eq!(transport.delivered_to(ADDR), vec![Message::GetFiles]);
    }

    #[tokio::test]
    async fn forced_failure_applies_once() {
        let transport = MockTransport::new();
        transport.fail_next("network unreachable");

        let message = Message::GetFile(GetFile {
            name: "a.txt".into(),
        });
        assert!(transport.send(ADDR, &message).await.is_err());
        transport.send(ADDR, &message).await.unwrap();
        assert_eq!(transport.delivered_to(ADDR).len(), 1);
    }

    #[tokio::test]
    async fn clone_shares_state_and_reset_clears() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.send(ADDR, &Message::GetFiles).await.unwrap();
        transport2.send(ADDR, &Message::GetFiles).await.unwrap();
        assert_eq!(transport1.delivered().len(), 2);

        transport2.reset();
        assert!(transport1.delivered().is_empty());
        assert_eq!(transport1.attempts_to(ADDR), 0);
    }
}
