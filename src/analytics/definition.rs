//! # Analytics Definition
//!
//! Declarative analytics settings of an API: whether analytics are on, how messages are
//! sampled and what gets captured into message logs. Deserialized from API definitions
//! with `serde` (camelCase keys).
//!
//! ```yaml
//! enabled: true
//! messageSampling:
//!   type: COUNT
//!   value: "10"
//! logging:
//!   mode: { entrypoint: false, endpoint: true }
//!   phase: { request: true, response: false }
//!   content: { messagePayload: true, messageHeaders: true }
//!   messageCondition: "{#message.id == '1'}"
//! ```

use serde::{Deserialize, Serialize};

use crate::core::types::{ConnectorType, ExecutionPhase};

/// Analytics settings of one API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Analytics {
    pub enabled: bool,
    pub message_sampling: Option<Sampling>,
    pub logging: Option<Logging>,
}

impl Analytics {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.message_sampling = Some(sampling);
        self
    }

    pub fn with_logging(mut self, logging: Logging) -> Self {
        self.logging = Some(logging);
        self
    }
}

/// Kind of message sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingType {
    /// Every Nth message
    Count,
    /// Each message with a fixed probability
    Probability,
    /// At most one message per time window
    Temporal,
}

/// Message sampling configuration
///
/// `value` is kept as text because its meaning depends on `type`: a count, a probability
/// or a humantime duration such as `"1s"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    #[serde(rename = "type")]
    pub sampling_type: SamplingType,
    pub value: Option<String>,
}

impl Sampling {
    pub fn new<S: Into<String>>(sampling_type: SamplingType, value: S) -> Self {
        Self {
            sampling_type,
            value: Some(value.into()),
        }
    }

    pub fn count(value: u64) -> Self {
        Self::new(SamplingType::Count, value.to_string())
    }

    pub fn probability(value: f64) -> Self {
        Self::new(SamplingType::Probability, value.to_string())
    }

    pub fn temporal<S: Into<String>>(period: S) -> Self {
        Self::new(SamplingType::Temporal, period)
    }
}

/// Message log configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Logging {
    pub mode: LoggingMode,
    pub phase: LoggingPhase,
    pub content: LoggingContent,

    /// Request-level condition
    ///
    /// Kept with the definition for the request/response logging layer that owns it.
    /// Message analytics never evaluate it: only `message_condition` gates message logs.
    pub condition: Option<String>,

    /// Per-message condition
    pub message_condition: Option<String>,
}

impl Logging {
    /// Whether messages observed on `connector` during `phase` should be logged
    pub fn is_enabled_for(&self, connector: ConnectorType, phase: ExecutionPhase) -> bool {
        let connector_enabled = match connector {
            ConnectorType::Entrypoint => self.mode.entrypoint,
            ConnectorType::Endpoint => self.mode.endpoint,
        };
        let phase_enabled = if phase.is_request_side() {
            self.phase.request
        } else {
            self.phase.response
        };
        connector_enabled && phase_enabled
    }

    /// Message condition, ignoring blank values
    pub fn message_condition(&self) -> Option<&str> {
        self.message_condition
            .as_deref()
            .filter(|condition| !condition.trim().is_empty())
    }
}

/// Connector sides to log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingMode {
    pub entrypoint: bool,
    pub endpoint: bool,
}

/// Exchange sides to log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPhase {
    pub request: bool,
    pub response: bool,
}

/// Parts of a message captured into its log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingContent {
    pub message_headers: bool,
    pub message_payload: bool,
    pub message_metadata: bool,
}

impl Default for LoggingContent {
    fn default() -> Self {
        Self {
            message_headers: false,
            message_payload: true,
            message_metadata: false,
        }
    }
}
