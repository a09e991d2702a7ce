use crate::domain::result::{DomainError, DomainResult};
use crate::domain::FinancialRecord;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Opaque token used to acknowledge (delete) a received message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed out by `MessageQueue::receive`.
///
/// Stays invisible to other receivers until its visibility timeout elapses;
/// if it is not deleted by then it is delivered again.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub payload: Bytes,
    pub receipt_handle: ReceiptHandle,
    /// Transport metadata (trace context lives here)
    pub attributes: HashMap<String, String>,
}

/// At-least-once queue transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, queue: &str, payload: Bytes) -> DomainResult<()>;

    /// Returns up to `max_messages`, waiting at most `wait` for the first one.
    /// An empty result is not an error.
    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        wait: Duration,
    ) -> DomainResult<Vec<QueueMessage>>;

    async fn delete(&self, queue: &str, receipt_handle: &ReceiptHandle) -> DomainResult<()>;
}

/// Body of a queue message: a whole tagged batch on the work queue, a single
/// record on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueuePayload {
    Batch(Vec<FinancialRecord>),
    Record(Box<FinancialRecord>),
}

impl QueuePayload {
    pub fn encode(&self) -> DomainResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| DomainError::RepositoryError(anyhow::anyhow!("failed to encode queue payload: {}", e)))
    }

    pub fn decode(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload).map_err(|e| DomainError::MalformedMessage(e.to_string()))
    }

    pub fn into_batch(self) -> DomainResult<Vec<FinancialRecord>> {
        match self {
            QueuePayload::Batch(records) if !records.is_empty() => Ok(records),
            QueuePayload::Batch(_) => Err(DomainError::MalformedMessage("empty batch".to_string())),
            QueuePayload::Record(_) => Err(DomainError::MalformedMessage(
                "expected a batch of records, got a single record".to_string(),
            )),
        }
    }

    pub fn into_record(self) -> DomainResult<FinancialRecord> {
        match self {
            QueuePayload::Record(record) => Ok(*record),
            QueuePayload::Batch(_) => Err(DomainError::MalformedMessage(
                "expected a single record, got a batch".to_string(),
            )),
        }
    }
}
