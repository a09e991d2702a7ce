use crate::domain::{DomainError, DomainResult, MessageQueue, QueueMessage, ReceiptHandle};
use crate::queue::inject_trace_context;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Poll interval while a receive call waits for visible messages
const RECEIVE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct StoredMessage {
    payload: Bytes,
    attributes: HashMap<String, String>,
    visible_at: Instant,
    receipt: Option<String>,
    receive_count: u32,
}

/// At-least-once queue held in process memory.
///
/// A received message stays invisible for the visibility timeout and is then
/// handed out again with a fresh receipt handle unless it was deleted.
/// Deleting with a stale receipt handle is a no-op. Uses tokio's clock, so
/// tests can drive redelivery with `tokio::time::pause`/`advance`.
pub struct InMemoryMessageQueue {
    queues: Mutex<HashMap<String, Vec<StoredMessage>>>,
    visibility_timeout: Duration,
    next_receipt: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryMessageQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            visibility_timeout,
            next_receipt: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// While set, every operation fails with a transient `RepositoryError`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Messages not yet deleted, in flight or not
    pub async fn pending_count(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, Vec::len)
    }

    /// Payloads of all messages not yet deleted, in send order
    pub async fn pending_payloads(&self, queue: &str) -> Vec<Bytes> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Times each pending message has been handed out
    pub async fn receive_counts(&self, queue: &str) -> Vec<u32> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.receive_count).collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "message queue unavailable"
            )));
        }
        Ok(())
    }

    async fn take_visible(&self, queue: &str, max_messages: usize) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let Some(messages) = queues.get_mut(queue) else {
            return Vec::new();
        };

        let mut received = Vec::new();
        for message in messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if message.visible_at > now {
                continue;
            }

            let receipt = format!(
                "{}:{}",
                queue,
                self.next_receipt.fetch_add(1, Ordering::Relaxed)
            );
            message.receipt = Some(receipt.clone());
            message.visible_at = now + self.visibility_timeout;
            message.receive_count += 1;

            received.push(QueueMessage {
                payload: message.payload.clone(),
                receipt_handle: ReceiptHandle::new(receipt),
                attributes: message.attributes.clone(),
            });
        }
        received
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn send(&self, queue: &str, payload: Bytes) -> DomainResult<()> {
        self.check_available()?;

        let mut attributes = HashMap::new();
        inject_trace_context(&mut attributes);

        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push(StoredMessage {
                payload,
                attributes,
                visible_at: Instant::now(),
                receipt: None,
                receive_count: 0,
            });
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        wait: Duration,
    ) -> DomainResult<Vec<QueueMessage>> {
        self.check_available()?;

        let deadline = Instant::now() + wait;
        loop {
            let received = self.take_visible(queue, max_messages).await;
            if !received.is_empty() || Instant::now() >= deadline {
                debug!(queue = %queue, message_count = received.len(), "receive complete");
                return Ok(received);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(RECEIVE_POLL.min(remaining)).await;
        }
    }

    async fn delete(&self, queue: &str, receipt_handle: &ReceiptHandle) -> DomainResult<()> {
        self.check_available()?;

        let mut queues = self.queues.lock().await;
        if let Some(messages) = queues.get_mut(queue) {
            let before = messages.len();
            messages.retain(|m| m.receipt.as_deref() != Some(receipt_handle.as_str()));
            if messages.len() == before {
                debug!(queue = %queue, receipt_handle = %receipt_handle, "stale receipt handle ignored");
            }
        }
        Ok(())
    }
}
