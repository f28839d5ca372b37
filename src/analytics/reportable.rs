//! # Reportable Records
//!
//! Records emitted by the analytics stages and handed to a [`Reporter`](super::reporter::Reporter):
//! one [`MessageMetrics`] per recorded message and, when logging applies, one [`MessageLog`]
//! carrying a captured copy of the message.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::types::{ConnectorType, ExecutionPhase, MessageOperation};

/// Metrics of one recorded message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetrics {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub api_id: Option<String>,
    pub client_identifier: String,

    /// Fresh identifier of this record
    pub correlation_id: String,

    /// Correlation id of the record this one derives from, `None` for top-level messages
    pub parent_correlation_id: Option<String>,

    pub operation: MessageOperation,
    pub connector_type: ConnectorType,
    pub connector_id: Option<String>,

    /// Messages this record stands for
    pub count: i64,

    /// Messages counted on the exchange so far
    pub message_count: i64,

    /// Errors counted on the exchange so far, `-1` when this message was not an error
    pub error_count: i64,

    pub error: bool,
    pub content_length: usize,
}

impl MessageMetrics {
    /// Generate a correlation id for a new record
    pub fn new_correlation_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Captured copy of a message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedMessage {
    pub id: String,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

/// Captured message, shaped by the connector side and phase it was observed on
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageLogPayload {
    EntrypointRequest(LoggedMessage),
    EntrypointResponse(LoggedMessage),
    EndpointRequest(LoggedMessage),
    EndpointResponse(LoggedMessage),
}

impl MessageLogPayload {
    /// Wrap `message` in the variant matching `connector` and `phase`
    pub fn for_side(connector: ConnectorType, phase: ExecutionPhase, message: LoggedMessage) -> Self {
        match (connector, phase.is_request_side()) {
            (ConnectorType::Entrypoint, true) => Self::EntrypointRequest(message),
            (ConnectorType::Entrypoint, false) => Self::EntrypointResponse(message),
            (ConnectorType::Endpoint, true) => Self::EndpointRequest(message),
            (ConnectorType::Endpoint, false) => Self::EndpointResponse(message),
        }
    }

    pub fn message(&self) -> &LoggedMessage {
        match self {
            Self::EntrypointRequest(message)
            | Self::EntrypointResponse(message)
            | Self::EndpointRequest(message)
            | Self::EndpointResponse(message) => message,
        }
    }
}

/// Log of one recorded message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLog {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub api_id: Option<String>,
    pub client_identifier: String,
    pub correlation_id: String,
    pub parent_correlation_id: Option<String>,
    pub operation: MessageOperation,
    pub connector_type: ConnectorType,
    pub connector_id: Option<String>,
    pub message: MessageLogPayload,
}

/// Anything a reporter accepts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Reportable {
    MessageMetrics(MessageMetrics),
    MessageLog(MessageLog),
}

impl Reportable {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageMetrics(_) => "message_metrics",
            Self::MessageLog(_) => "message_log",
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            Self::MessageMetrics(metrics) => &metrics.request_id,
            Self::MessageLog(log) => &log.request_id,
        }
    }
}

impl From<MessageMetrics> for Reportable {
    fn from(metrics: MessageMetrics) -> Self {
        Self::MessageMetrics(metrics)
    }
}

impl From<MessageLog> for Reportable {
    fn from(log: MessageLog) -> Self {
        Self::MessageLog(log)
    }
}
