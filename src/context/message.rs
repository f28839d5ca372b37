//! # Messages
//!
//! A [`Message`] is one unit flowing through the message sub-pipeline of a streaming API.
//! Messages carry their own attribute map so that pipeline stages can annotate them
//! (for example with the analytics recordability decision) without side tables.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Set on a message once its analytics recordability has been decided
pub const ATTR_INTERNAL_MESSAGE_RECORDABLE: &str = "gateway.internal.message.recordable";

/// Counter snapshot taken when the message was first counted on the exchange
pub const ATTR_INTERNAL_MESSAGE_COUNTERS: &str = "gateway.internal.message.counters";

/// Set on a message when it was recorded together with a message log
pub const ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING: &str =
    "gateway.internal.message.recordable.withLogging";

/// Individual message of a streaming exchange
#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    content: Bytes,
    headers: HeaderMap,
    metadata: HashMap<String, Value>,
    attributes: HashMap<String, Value>,
    error: bool,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with a generated id
    pub fn new<C: Into<Bytes>>(content: C) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), content)
    }

    /// Create a message with an explicit id
    pub fn with_id<I: Into<String>, C: Into<Bytes>>(id: I, content: C) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            headers: HeaderMap::new(),
            metadata: HashMap::new(),
            attributes: HashMap::new(),
            error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a message flagged as an error message
    pub fn error<C: Into<Bytes>>(content: C) -> Self {
        let mut message = Self::new(content);
        message.error = true;
        message
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Content as UTF-8, lossy
    pub fn content_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn set_content<C: Into<Bytes>>(&mut self, content: C) {
        self.content = content.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.metadata
    }

    /// Whether the message reports an error condition
    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Boolean attribute, `None` when absent or not a boolean
    pub fn bool_attribute(&self, name: &str) -> Option<bool> {
        self.attributes.get(name).and_then(Value::as_bool)
    }

    pub fn set_attribute<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Builder-style attribute setter
    pub fn with_attribute<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style metadata setter
    pub fn with_metadata<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}
