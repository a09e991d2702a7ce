use crate::domain::{MessageQueue, QueueMessage};
use crate::queue::{ConsumeRequest, ConsumeResponse};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

/// Pause after a failed receive before polling again
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// Polls one queue and drives each message through a tower service stack.
///
/// Messages are handled one at a time. The service's `ConsumeResponse`
/// decides whether the message is deleted (`Ack`) or left for redelivery
/// after the visibility timeout (`Retain`). A service error is treated as
/// `Retain`, so one bad message never stops the loop.
pub struct QueueConsumer<S> {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    batch_size: usize,
    max_wait: Duration,
    service: S,
}

impl<S> QueueConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error> + Send + 'static,
    S::Future: Send + 'static,
{
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        queue_name: impl Into<String>,
        batch_size: usize,
        max_wait: Duration,
        service: S,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            batch_size,
            max_wait,
            service,
        }
    }

    /// Run the consumer loop until cancellation.
    ///
    /// The token is checked before every poll and raced against the receive
    /// wait. A batch that has been received is always processed to the end.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        debug!(queue = %self.queue_name, "starting queue consumer");

        loop {
            if ctx.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                _ = ctx.cancelled() => break,
                result = self.queue.receive(&self.queue_name, self.batch_size, self.max_wait) => result,
            };

            match received {
                Ok(messages) => {
                    self.process_messages(messages).await;
                }
                Err(e) => {
                    error!(queue = %self.queue_name, error = %e, "failed to receive messages");
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                    }
                }
            }
        }

        info!(queue = %self.queue_name, "received shutdown signal, consumer stopped");
        Ok(())
    }

    /// Single poll-and-process iteration. Returns the number of acknowledged messages.
    pub async fn fetch_and_process(&mut self) -> Result<usize> {
        let messages = self
            .queue
            .receive(&self.queue_name, self.batch_size, self.max_wait)
            .await?;
        Ok(self.process_messages(messages).await)
    }

    async fn process_messages(&mut self, messages: Vec<QueueMessage>) -> usize {
        if messages.is_empty() {
            debug!(queue = %self.queue_name, "no messages received");
            return 0;
        }

        debug!(queue = %self.queue_name, message_count = messages.len(), "received messages");

        let mut acked = 0;
        for msg in messages {
            let request = ConsumeRequest::new(
                self.queue_name.clone(),
                msg.payload.clone(),
                msg.attributes.clone(),
            );

            let result = match ServiceExt::<ConsumeRequest>::ready(&mut self.service).await {
                Ok(service) => service.call(request).await,
                Err(e) => Err(e),
            };

            let response = result.unwrap_or_else(|e| {
                error!(
                    queue = %self.queue_name,
                    error = %e,
                    "service error processing message"
                );
                ConsumeResponse::retain(e.to_string())
            });

            match response {
                ConsumeResponse::Ack => {
                    match self.queue.delete(&self.queue_name, &msg.receipt_handle).await {
                        Ok(()) => acked += 1,
                        Err(e) => error!(
                            queue = %self.queue_name,
                            error = %e,
                            "failed to delete message"
                        ),
                    }
                }
                ConsumeResponse::Retain(reason) => {
                    warn!(
                        queue = %self.queue_name,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "message retained for redelivery"
                    );
                }
            }
        }

        acked
    }
}
