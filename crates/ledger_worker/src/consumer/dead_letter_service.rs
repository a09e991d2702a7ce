use crate::domain::DeadLetterReconciler;
use common::domain::QueuePayload;
use common::queue::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{error, warn};

/// Tower service feeding dead-letter messages to the [`DeadLetterReconciler`].
///
/// Acks only when the record is confirmed stored (inserted now or already
/// present). Anything else stays queued for redelivery.
#[derive(Clone)]
pub struct DeadLetterConsumerService {
    reconciler: Arc<DeadLetterReconciler>,
}

impl DeadLetterConsumerService {
    pub fn new(reconciler: Arc<DeadLetterReconciler>) -> Self {
        Self { reconciler }
    }
}

impl Service<ConsumeRequest> for DeadLetterConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let reconciler = Arc::clone(&self.reconciler);

        Box::pin(async move {
            let record =
                match QueuePayload::decode(&req.payload).and_then(QueuePayload::into_record) {
                    Ok(record) => record,
                    Err(e) => {
                        error!(
                            queue = %req.queue,
                            error = %e,
                            "dropping undecodable dead-letter message"
                        );
                        return Ok(ConsumeResponse::ack());
                    }
                };

            match reconciler.reconcile(record).await {
                Ok(outcome) if outcome.is_resolved() => Ok(ConsumeResponse::ack()),
                Ok(outcome) => Ok(ConsumeResponse::retain(format!("{:?}", outcome))),
                Err(e) => {
                    warn!(queue = %req.queue, error = %e, "reconcile failed, retaining message");
                    Ok(ConsumeResponse::retain(e.to_string()))
                }
            }
        })
    }
}
