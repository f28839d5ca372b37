//! Execution failure payload attached to an interruption.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

/// Default content type used when rendering a failure
pub const DEFAULT_FAILURE_CONTENT_TYPE: &str = "application/json";

/// Failure carried by an interruption
///
/// The value is built once with the consuming setters below and is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    status_code: u16,
    message: Option<String>,
    key: Option<String>,
    parameters: HashMap<String, Value>,
    content_type: Option<String>,
}

impl ExecutionFailure {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            message: None,
            key: None,
            parameters: HashMap::new(),
            content_type: None,
        }
    }

    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameter<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn get_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn get_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn get_parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn get_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Render the failure as an error body
    ///
    /// JSON content types get a structured document, anything else gets the plain message.
    pub fn render(&self) -> RenderedFailure {
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_FAILURE_CONTENT_TYPE.to_string());

        let body = if content_type.contains("json") {
            let mut document = json!({
                "message": self.message.clone().unwrap_or_default(),
                "http_status_code": self.status_code,
            });
            if let Some(key) = &self.key {
                document["key"] = Value::String(key.clone());
            }
            if !self.parameters.is_empty() {
                document["parameters"] = json!(self.parameters);
            }
            document.to_string()
        } else {
            self.message.clone().unwrap_or_default()
        };

        RenderedFailure {
            status_code: self.status_code,
            content_type,
            body,
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code)?;
        if let Some(key) = &self.key {
            write!(f, " [{}]", key)?;
        }
        if let Some(message) = &self.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

/// Failure ready to be written to the client
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFailure {
    pub status_code: u16,
    pub content_type: String,
    pub body: String,
}
