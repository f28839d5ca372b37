//! Immutable per-exchange analytics snapshot.

use std::fmt;
use std::sync::Arc;

use crate::analytics::definition::{Analytics, Logging};
use crate::analytics::sampling::{self, MessageSamplingStrategy};

/// Analytics settings resolved once for an exchange
///
/// Built when the exchange starts and only read afterwards, by hooks and policies alike.
#[derive(Clone)]
pub struct AnalyticsContext {
    analytics: Analytics,
    enabled: bool,
    logging_max_size: Option<usize>,
    logging_excluded_response_types: Option<String>,
    sampling: Arc<dyn MessageSamplingStrategy>,
}

impl AnalyticsContext {
    pub fn new(
        analytics: Analytics,
        logging_max_size: Option<usize>,
        logging_excluded_response_types: Option<String>,
    ) -> Self {
        let sampling = sampling::strategy_for(analytics.message_sampling.as_ref());
        Self {
            enabled: analytics.enabled,
            analytics,
            logging_max_size,
            logging_excluded_response_types,
            sampling,
        }
    }

    /// Context with analytics turned off
    pub fn disabled() -> Self {
        Self::new(Analytics::default(), None, None)
    }

    /// Replace the sampling strategy derived from the definition
    pub fn with_sampling_strategy(mut self, sampling: Arc<dyn MessageSamplingStrategy>) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn logging(&self) -> Option<&Logging> {
        self.analytics.logging.as_ref()
    }

    pub fn message_sampling_strategy(&self) -> &Arc<dyn MessageSamplingStrategy> {
        &self.sampling
    }

    /// Maximum captured payload size, in bytes
    pub fn logging_max_size(&self) -> Option<usize> {
        self.logging_max_size
    }

    /// Response content types never captured in logs
    pub fn logging_excluded_response_types(&self) -> Option<&str> {
        self.logging_excluded_response_types.as_deref()
    }

    /// Whether a captured payload with `content_type` must be left out of logs
    pub fn is_excluded_content_type(&self, content_type: &str) -> bool {
        let Some(excluded) = self.logging_excluded_response_types() else {
            return false;
        };
        let content_type = content_type.to_ascii_lowercase();
        excluded
            .split(|c: char| c == '|' || c == ',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| content_type.contains(&pattern.to_ascii_lowercase()))
    }
}

impl fmt::Debug for AnalyticsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsContext")
            .field("enabled", &self.enabled)
            .field("analytics", &self.analytics)
            .field("logging_max_size", &self.logging_max_size)
            .field("sampling", &self.sampling)
            .finish()
    }
}
