//! # Core Types Module
//!
//! Small enums shared by every stage of the pipeline: the execution phase a chain runs in,
//! the side of the exchange a connector sits on, and the message operation reported to
//! analytics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of an exchange a policy chain executes in
///
/// Each phase selects one of the four policy hooks and, for message phases,
/// the side of the message stream the chain installs interceptors on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
    Request,
    Response,
    MessageRequest,
    MessageResponse,
}

impl ExecutionPhase {
    /// All phases in exchange order
    pub const ALL: [ExecutionPhase; 4] = [
        ExecutionPhase::Request,
        ExecutionPhase::MessageRequest,
        ExecutionPhase::MessageResponse,
        ExecutionPhase::Response,
    ];

    /// Whether this phase operates on individual messages
    pub fn is_message_phase(&self) -> bool {
        matches!(self, Self::MessageRequest | Self::MessageResponse)
    }

    /// Whether this phase belongs to the request side of the exchange
    pub fn is_request_side(&self) -> bool {
        matches!(self, Self::Request | Self::MessageRequest)
    }

    /// Label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Response => "RESPONSE",
            Self::MessageRequest => "MESSAGE_REQUEST",
            Self::MessageResponse => "MESSAGE_RESPONSE",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the exchange a connector sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorType {
    /// Client-facing connector
    Entrypoint,
    /// Backend-facing connector
    Endpoint,
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entrypoint => write!(f, "ENTRYPOINT"),
            Self::Endpoint => write!(f, "ENDPOINT"),
        }
    }
}

/// Direction of a reported message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageOperation {
    /// Request-side message (client publishes)
    Publish,
    /// Response-side message (client subscribes)
    Subscribe,
}

impl MessageOperation {
    /// Operation matching a message phase
    pub fn for_phase(phase: ExecutionPhase) -> Self {
        if phase.is_request_side() {
            Self::Publish
        } else {
            Self::Subscribe
        }
    }
}
