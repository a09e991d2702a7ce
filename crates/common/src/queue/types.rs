use bytes::Bytes;
use std::collections::HashMap;

/// One received queue message, owned so it can travel through tower layers.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    /// Logical queue the message was received from
    pub queue: String,
    pub payload: Bytes,
    /// Transport attributes (trace context)
    pub attributes: HashMap<String, String>,
}

impl ConsumeRequest {
    pub fn new(queue: impl Into<String>, payload: Bytes, attributes: HashMap<String, String>) -> Self {
        Self {
            queue: queue.into(),
            payload,
            attributes,
        }
    }
}

/// Disposition of a consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    /// Delete the message from the queue
    Ack,
    /// Leave the message in place; it is redelivered after the visibility timeout
    Retain(Option<String>),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn retain(reason: impl Into<String>) -> Self {
        Self::Retain(Some(reason.into()))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Self::Retain(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_request_new() {
        let req = ConsumeRequest::new("work", Bytes::from("payload"), HashMap::new());

        assert_eq!(req.queue, "work");
        assert_eq!(req.payload, Bytes::from("payload"));
        assert!(req.attributes.is_empty());
    }

    #[test]
    fn test_consume_response_retain_keeps_reason() {
        let resp = ConsumeResponse::retain("insert failed");
        assert!(resp.is_retain());
        assert!(!resp.is_ack());
        assert_eq!(resp, ConsumeResponse::Retain(Some("insert failed".to_string())));
    }
}
