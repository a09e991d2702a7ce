use crate::domain::BatchWriter;
use common::domain::QueuePayload;
use common::queue::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, error, warn};

/// Tower service feeding work-queue messages to the [`BatchWriter`].
///
/// Acknowledges once every record is committed or on the dead-letter queue.
/// If any dead-letter send failed the message is retained, so redelivery
/// escalates the batch again. Undecodable messages are acknowledged.
#[derive(Clone)]
pub struct BatchWriterConsumerService {
    writer: Arc<BatchWriter>,
}

impl BatchWriterConsumerService {
    pub fn new(writer: Arc<BatchWriter>) -> Self {
        Self { writer }
    }
}

impl Service<ConsumeRequest> for BatchWriterConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let writer = Arc::clone(&self.writer);

        Box::pin(async move {
            let records = match QueuePayload::decode(&req.payload).and_then(QueuePayload::into_batch)
            {
                Ok(records) => records,
                Err(e) => {
                    error!(
                        queue = %req.queue,
                        error = %e,
                        "dropping undecodable work-queue message"
                    );
                    return Ok(ConsumeResponse::ack());
                }
            };

            match writer.write_batch(records).await {
                Ok(resolution) if resolution.is_resolved() => {
                    debug!(
                        batch_id = ?resolution.batch_id,
                        successful = resolution.outcome.successful_records,
                        failed = resolution.outcome.failed_records,
                        "batch resolved"
                    );
                    Ok(ConsumeResponse::ack())
                }
                Ok(resolution) => {
                    warn!(
                        queue = %req.queue,
                        batch_id = ?resolution.batch_id,
                        dead_letter_failures = resolution.dead_letter_failures,
                        "retaining batch for redelivery"
                    );
                    Ok(ConsumeResponse::retain(format!(
                        "{} records not dead-lettered",
                        resolution.dead_letter_failures
                    )))
                }
                Err(e) => {
                    error!(queue = %req.queue, error = %e, "dropping malformed batch");
                    Ok(ConsumeResponse::ack())
                }
            }
        })
    }
}
