use crate::domain::{DomainError, DomainResult, MessageQueue, QueueMessage, ReceiptHandle};
use crate::nats::NatsClient;
use crate::queue::{inject_trace_context, TRACE_ATTRIBUTES};
use anyhow::Context;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

/// Ack payload understood by the JetStream server
const ACK: &[u8] = b"+ACK";

/// Shortest pull expiry sent to the server; a zero expiry is rejected.
const MIN_FETCH_EXPIRY: Duration = Duration::from_millis(100);

fn fetch_expiry(wait: Duration) -> Duration {
    wait.max(MIN_FETCH_EXPIRY)
}

/// `MessageQueue` over NATS JetStream.
///
/// Each logical queue is a work-queue stream with one durable pull consumer.
/// The receipt handle of a message is its ack subject. Deleting a message is
/// a `+ACK` request to that subject, confirmed by the server's reply.
pub struct JetStreamQueue {
    nats: Arc<NatsClient>,
    visibility_timeout: Duration,
    consumers: RwLock<HashMap<String, PullConsumer>>,
}

impl JetStreamQueue {
    pub fn new(nats: Arc<NatsClient>, visibility_timeout: Duration) -> Self {
        Self {
            nats,
            visibility_timeout,
            consumers: RwLock::new(HashMap::new()),
        }
    }

    /// Creates the stream and consumer for `queue` if they do not exist yet.
    pub async fn ensure_queue(&self, queue: &str) -> anyhow::Result<PullConsumer> {
        if let Some(consumer) = self.consumers.read().await.get(queue) {
            return Ok(consumer.clone());
        }

        let mut consumers = self.consumers.write().await;
        if let Some(consumer) = consumers.get(queue) {
            return Ok(consumer.clone());
        }

        let stream_name = self.nats.ensure_queue_stream(queue).await?;
        let consumer = self
            .nats
            .create_pull_consumer(&stream_name, self.visibility_timeout)
            .await?;

        consumers.insert(queue.to_string(), consumer.clone());
        Ok(consumer)
    }
}

fn headers_from_attributes(attributes: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in attributes {
        headers.insert(key.as_str(), value.as_str());
    }
    headers
}

fn attributes_from_headers(headers: &HeaderMap) -> HashMap<String, String> {
    TRACE_ATTRIBUTES
        .iter()
        .filter_map(|key| {
            headers
                .get(*key)
                .map(|value| (key.to_string(), value.as_str().to_string()))
        })
        .collect()
}

#[async_trait]
impl MessageQueue for JetStreamQueue {
    #[instrument(skip(self, payload), fields(queue = %queue, payload_size = payload.len()))]
    async fn send(&self, queue: &str, payload: Bytes) -> DomainResult<()> {
        self.ensure_queue(queue)
            .await
            .map_err(DomainError::RepositoryError)?;

        let mut attributes = HashMap::new();
        inject_trace_context(&mut attributes);

        let ack = self
            .nats
            .jetstream()
            .publish_with_headers(queue.to_string(), headers_from_attributes(&attributes), payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;

        debug!(queue = %queue, "message sent");
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        wait: Duration,
    ) -> DomainResult<Vec<QueueMessage>> {
        let consumer = self
            .ensure_queue(queue)
            .await
            .map_err(DomainError::RepositoryError)?;

        let mut batch = consumer
            .batch()
            .max_messages(max_messages)
            .expires(fetch_expiry(wait))
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut received = Vec::new();
        while let Some(msg) = batch.next().await {
            match msg {
                Ok(message) => {
                    let Some(reply) = message.reply.as_ref() else {
                        warn!(queue = %queue, subject = %message.subject, "message without ack subject skipped");
                        continue;
                    };

                    received.push(QueueMessage {
                        payload: message.payload.clone(),
                        receipt_handle: ReceiptHandle::new(reply.to_string()),
                        attributes: message
                            .headers
                            .as_ref()
                            .map(attributes_from_headers)
                            .unwrap_or_default(),
                    });
                }
                Err(e) => {
                    error!(queue = %queue, error = %e, "Error receiving message");
                }
            }
        }

        Ok(received)
    }

    async fn delete(&self, queue: &str, receipt_handle: &ReceiptHandle) -> DomainResult<()> {
        debug!(queue = %queue, receipt_handle = %receipt_handle, "acknowledging message");

        self.nats
            .client()
            .request(receipt_handle.as_str().to_string(), Bytes::from_static(ACK))
            .await
            .context("Ack was not confirmed by the server")?;

        Ok(())
    }
}
