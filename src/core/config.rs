//! # Configuration Module
//!
//! Gateway-wide settings of the execution pipeline, loaded from YAML or JSON.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable overrides applied after parsing
//! - Validation collecting every problem into one error
//!
//! Environment variables follow the pattern `GATEWAY_<SECTION>_<FIELD>`, for example
//! `GATEWAY_LOG_LEVEL=debug` or `GATEWAY_SYSTEM_PROXY_HOST=proxy.internal`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::sync::Arc;

use crate::analytics::context::AnalyticsContext;
use crate::analytics::definition::Analytics;
use crate::analytics::reporter::ReporterConfig;
use crate::connector::proxy::SystemProxySettings;
use crate::context::components::ComponentRegistry;
use crate::core::error::{GatewayError, GatewayResult};
use crate::observability::config::LogConfig;

/// Main gateway configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Structured logging settings
    pub logging: LogConfig,

    /// Analytics settings applied to every API
    pub analytics: AnalyticsDefaults,

    /// Proxy used by endpoints that opt into the system proxy
    pub system_proxy: SystemProxySettings,

    /// Analytics reporter settings
    pub reporter: ReporterConfig,
}

/// Gateway-wide analytics limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsDefaults {
    /// Maximum captured payload size in message logs, in bytes
    pub logging_max_size: Option<usize>,

    /// Content types never captured in message logs, separated by `|` or `,`
    pub logging_excluded_response_types: Option<String>,
}

impl AnalyticsDefaults {
    /// Analytics context of an exchange served by an API with `analytics` settings
    pub fn context_for(&self, analytics: Analytics) -> AnalyticsContext {
        AnalyticsContext::new(
            analytics,
            self.logging_max_size,
            self.logging_excluded_response_types.clone(),
        )
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml_str(&content)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: GatewayConfig = serde_json::from_str(&content)
            .map_err(|e| GatewayError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content, then apply environment overrides and validate
    pub fn from_yaml_str(content: &str) -> GatewayResult<Self> {
        let mut config: GatewayConfig = serde_yaml::from_str(content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> GatewayResult<()> {
        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("GATEWAY_LOG_FORMAT") {
            self.logging.format = format
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid GATEWAY_LOG_FORMAT: {}", e)))?;
        }

        if let Ok(size) = env::var("GATEWAY_REPORTER_BUFFER_SIZE") {
            self.reporter.buffer_size = size
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid GATEWAY_REPORTER_BUFFER_SIZE: {}", e)))?;
        }

        self.system_proxy.apply_env_overrides();
        Ok(())
    }

    /// Configuration validation with detailed error messages
    pub fn validate(&self) -> GatewayResult<()> {
        let mut errors = Vec::new();

        if let Err(error) = self.logging.level() {
            errors.push(error.to_string());
        }

        if self.reporter.buffer_size == 0 {
            errors.push("reporter buffer_size must be greater than 0".to_string());
        }

        if self.analytics.logging_max_size == Some(0) {
            errors.push("analytics logging_max_size must be greater than 0 when set".to_string());
        }

        if let Some(port) = &self.system_proxy.port {
            if !matches!(port.trim().parse::<u16>(), Ok(port) if port > 0) {
                errors.push(format!("system_proxy port '{}' is not a valid port", port));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::config(format!(
                "Configuration validation failed: {}",
                errors.join("; ")
            )))
        }
    }

    /// Component registry exposing the gateway-wide settings to connectors
    pub fn components(&self) -> ComponentRegistry {
        let components = ComponentRegistry::new();
        components.register(Arc::new(self.system_proxy.clone()));
        components
    }
}
