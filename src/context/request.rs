//! # Request and Response
//!
//! Already-decoded request and response value objects. Both sides own a [`MessagePipeline`]
//! that streaming APIs use to transform individual messages.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode, Uri};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::pipeline::{MessageInterceptor, MessagePipeline};

/// Inbound request of an exchange
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique identifier for this request (for tracing and reporting)
    pub id: String,

    /// Identifier of the calling client (API key, subscription, or remote address)
    pub client_identifier: String,

    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,

    /// Remote address of the client, if known
    pub remote_address: Option<String>,

    /// Timestamp when the request was received
    pub timestamp: DateTime<Utc>,

    messages: MessagePipeline,
}

impl Request {
    /// Create a request with a generated id
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client_identifier: String::new(),
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_address: None,
            timestamp: Utc::now(),
            messages: MessagePipeline::new(),
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_client_identifier<S: Into<String>>(mut self, client_identifier: S) -> Self {
        self.client_identifier = client_identifier.into();
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Install a message interceptor on the request-side message stream
    pub fn on_message(&mut self, interceptor: Arc<dyn MessageInterceptor>) {
        self.messages.push(interceptor);
    }

    pub fn message_pipeline(&self) -> &MessagePipeline {
        &self.messages
    }

    pub fn message_pipeline_mut(&mut self) -> &mut MessagePipeline {
        &mut self.messages
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"))
    }
}

/// Outbound response of an exchange
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,

    /// Whether the response has been fully written by a policy or the endpoint
    pub ended: bool,

    messages: MessagePipeline,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            ended: false,
            messages: MessagePipeline::new(),
        }
    }

    /// Get a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Write a complete response and mark it ended
    pub fn end<B: Into<Bytes>>(&mut self, status: StatusCode, body: B) {
        self.status = status;
        self.body = body.into();
        self.ended = true;
    }

    /// Install a message interceptor on the response-side message stream
    pub fn on_message(&mut self, interceptor: Arc<dyn MessageInterceptor>) {
        self.messages.push(interceptor);
    }

    pub fn message_pipeline(&self) -> &MessagePipeline {
        &self.messages
    }

    pub fn message_pipeline_mut(&mut self) -> &mut MessagePipeline {
        &mut self.messages
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = Request::default()
            .with_id("req-1")
            .with_client_identifier("client-1");

        assert_eq!(request.id, "req-1");
        assert_eq!(request.client_identifier, "client-1");
        assert_eq!(request.path(), "/");
        assert!(request.message_pipeline().is_empty());
    }

    #[test]
    fn test_response_end() {
        let mut response = Response::new();
        response.end(StatusCode::NO_CONTENT, "");

        assert!(response.ended);
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
}
