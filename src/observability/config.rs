use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;

use crate::core::error::{GatewayError, GatewayResult};

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level, one of `trace`, `debug`, `info`, `warn`, `error`
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    File(String),
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            output: LogOutput::Stdout,
        }
    }
}

impl LogConfig {
    /// Parsed minimum level
    pub fn level(&self) -> GatewayResult<Level> {
        Level::from_str(self.level.trim())
            .map_err(|_| GatewayError::config(format!("Invalid log level '{}'", self.level)))
    }
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(GatewayError::config(format!("Invalid log format '{}'", other))),
        }
    }
}
