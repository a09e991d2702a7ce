use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::queue::{extract_trace_context, ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Tower layer opening one span per consumed message, parented on the
/// publisher's trace context carried in the message attributes.
#[derive(Clone, Default)]
pub struct QueueConsumeTracingLayer;

impl QueueConsumeTracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for QueueConsumeTracingLayer {
    type Service = QueueConsumeTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        QueueConsumeTracingService { inner: service }
    }
}

#[derive(Clone)]
pub struct QueueConsumeTracingService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for QueueConsumeTracingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let span = info_span!(
            target: "queue",
            "queue_consume",
            otel.name = %format!("{} process", req.queue),
            messaging.system = "nats",
            messaging.operation = "process",
            messaging.destination.name = %req.queue,
            messaging.message.body.size = req.payload.len(),
            otel.status_code = field::Empty,
        );
        span.set_parent(extract_trace_context(&req.attributes));

        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;

                match &result {
                    Ok(_) => {
                        Span::current().record("otel.status_code", "OK");
                    }
                    Err(e) => {
                        Span::current().record("otel.status_code", "ERROR");
                        tracing::error!(error = %e, "message processing failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
