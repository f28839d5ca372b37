// Logging configuration
pub mod config;

// Subscriber installation
pub mod logging;

// Metric names
pub mod metrics;

pub use config::{LogConfig, LogFormat, LogOutput};
pub use logging::init_logging;
pub use metrics::describe_metrics;
