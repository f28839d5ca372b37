pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalyticsDefaults, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use types::{ConnectorType, ExecutionPhase, MessageOperation};
