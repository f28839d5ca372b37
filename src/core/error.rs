//! # Error Handling Module
//!
//! This module provides the error taxonomy of the execution pipeline using the `thiserror` crate.
//! It separates cooperative early exits (interruptions) from genuine faults so that callers
//! can render the right HTTP response, and maps every error to a status code.
//!
//! ## Error Categories
//! - **Interruption**: a policy asked the chain to stop; the response is already in its final state
//! - **Interruption with failure**: a policy asked the chain to stop and supplied an [`ExecutionFailure`]
//! - **Policy fault**: a policy hook failed unexpectedly
//! - **Configuration faults**: phase mismatches, malformed endpoint targets, invalid proxy/TLS settings
//! - **Reporter faults**: never escape the message stream, only logged
//!
//! ## Rust Concepts Used
//! - Enum-based error types instead of exception hierarchies
//! - `From` conversions so the `?` operator can lift library errors into `GatewayError`
//! - `Clone` on the error so the same failure can be observed by several stream subscribers

use http::StatusCode;
use std::convert::Infallible;
use thiserror::Error;

use crate::context::failure::ExecutionFailure;
use crate::core::types::ExecutionPhase;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error types produced by the execution pipeline
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display` for each variant.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Cooperative interruption without payload
    #[error("Execution interrupted")]
    Interrupted,

    /// Cooperative interruption carrying a failure to render
    #[error("Execution interrupted with failure: {failure}")]
    InterruptedWithFailure { failure: ExecutionFailure },

    /// A policy hook failed unexpectedly
    #[error("Policy error ({policy}) during {phase}: {message}")]
    Policy {
        policy: String,
        phase: ExecutionPhase,
        message: String,
    },

    /// A policy was placed in a chain whose phase it cannot execute
    #[error("Policy {policy} cannot be executed during phase {phase}")]
    PhaseNotSupported { policy: String, phase: ExecutionPhase },

    /// Connector client could not be built from its configuration
    #[error("Connector build error: {message}")]
    ConnectorBuild { message: String },

    /// Condition could not be parsed or evaluated
    #[error("Expression error in '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// Reporter failed to accept a record
    #[error("Reporter error: {message}")]
    Reporter { message: String },

    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, network errors, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// HTTP client errors when talking to an endpoint
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },

    /// WebSocket client errors when talking to an endpoint
    #[error("WebSocket error: {message}")]
    WebSocket { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a connector build error
    pub fn connector_build<S: Into<String>>(message: S) -> Self {
        Self::ConnectorBuild {
            message: message.into(),
        }
    }

    /// Create a policy fault for the given policy and phase
    pub fn policy<P: Into<String>, M: Into<String>>(policy: P, phase: ExecutionPhase, message: M) -> Self {
        Self::Policy {
            policy: policy.into(),
            phase,
            message: message.into(),
        }
    }

    /// Create an expression error
    pub fn expression<E: Into<String>, M: Into<String>>(expression: E, message: M) -> Self {
        Self::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a reporter error
    pub fn reporter<S: Into<String>>(message: S) -> Self {
        Self::Reporter {
            message: message.into(),
        }
    }

    /// Wrap an [`ExecutionFailure`] into an interruption
    pub fn interrupted_with(failure: ExecutionFailure) -> Self {
        Self::InterruptedWithFailure { failure }
    }

    /// Whether this error is a cooperative exit rather than a fault
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted | Self::InterruptedWithFailure { .. })
    }

    /// Failure payload carried by an interruption, if any
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::InterruptedWithFailure { failure } => Some(failure),
            _ => None,
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InterruptedWithFailure { failure } => {
                StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Interrupted => StatusCode::OK,
            Self::HttpClient { .. } => StatusCode::BAD_GATEWAY,
            Self::WebSocket { .. } => StatusCode::BAD_GATEWAY,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Policy { .. }
            | Self::PhaseNotSupported { .. }
            | Self::ConnectorBuild { .. }
            | Self::Expression { .. }
            | Self::Reporter { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. }
            | Self::Io { .. }
            | Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for logs and error bodies
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Interrupted => "interrupted",
            Self::InterruptedWithFailure { .. } => "interrupted_with_failure",
            Self::Policy { .. } => "policy_error",
            Self::PhaseNotSupported { .. } => "phase_not_supported",
            Self::ConnectorBuild { .. } => "connector_build_error",
            Self::Expression { .. } => "expression_error",
            Self::Reporter { .. } => "reporter_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::HttpClient { .. } => "http_client_error",
            Self::WebSocket { .. } => "websocket_error",
        }
    }
}

impl From<Infallible> for GatewayError {
    fn from(infallible: Infallible) -> Self {
        match infallible {}
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpClient {
            message: err.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::ConnectorBuild {
            message: format!("Endpoint target is not valid: {}", err),
        }
    }
}

/// Convenience macro for creating internal errors
///
/// Usage: `internal_error!("Failed to process request: {}", request_id)`
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::core::error::GatewayError::internal(format!($($arg)*))
    };
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Invalid port: {}", port)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::GatewayError::config(format!($($arg)*))
    };
}
