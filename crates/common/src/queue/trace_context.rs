use opentelemetry::{
    global,
    propagation::{Extractor, Injector},
    Context,
};
use std::collections::HashMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// W3C Trace Context attribute names
pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";

/// Attribute names carried across the queue for trace propagation
pub const TRACE_ATTRIBUTES: [&str; 2] = [TRACEPARENT, TRACESTATE];

struct AttributeInjector<'a>(&'a mut HashMap<String, String>);

impl Injector for AttributeInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

struct AttributeExtractor<'a>(&'a HashMap<String, String>);

impl Extractor for AttributeExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Inject the current span's trace context into message attributes.
///
/// Called by queue adapters on send so consumers can continue the trace.
pub fn inject_trace_context(attributes: &mut HashMap<String, String>) {
    global::get_text_map_propagator(|propagator| {
        let ctx = tracing::Span::current().context();
        propagator.inject_context(&ctx, &mut AttributeInjector(attributes));
    });
}

/// Extract the publisher's trace context from message attributes.
pub fn extract_trace_context(attributes: &HashMap<String, String>) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&AttributeExtractor(attributes)))
}

/// Make the publisher's span the parent of the current span.
pub fn set_parent_from_attributes(attributes: &HashMap<String, String>) {
    let ctx = extract_trace_context(attributes);
    tracing::Span::current().set_parent(ctx);
}
