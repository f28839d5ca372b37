//! # Message Analytics
//!
//! Sampling, counting and reporting of the messages flowing through streaming exchanges.
//!
//! ## Components
//! - [`definition`]: declarative analytics settings of an API
//! - [`context`]: the immutable per-exchange [`AnalyticsContext`]
//! - [`counters`]: concurrent per-exchange [`MessageCounters`]
//! - [`sampling`]: count, probability and temporal [`MessageSamplingStrategy`] implementations
//! - [`helper`]: the recordability decision with its error override
//! - [`reportable`] and [`reporter`]: emitted records and their sinks
//! - [`hook`]: the [`AnalyticsMessageHook`] wiring it all into message streams

pub mod context;
pub mod counters;
pub mod definition;
pub mod helper;
pub mod hook;
pub mod reportable;
pub mod reporter;
pub mod sampling;

pub use context::AnalyticsContext;
pub use counters::{Counters, MessageCounters};
pub use definition::{Analytics, Logging, LoggingContent, LoggingMode, LoggingPhase, Sampling, SamplingType};
pub use helper::MessageAnalyticsHelper;
pub use hook::AnalyticsMessageHook;
pub use reportable::{LoggedMessage, MessageLog, MessageLogPayload, MessageMetrics, Reportable};
pub use reporter::{ChannelReporter, LoggingReporter, Reporter, ReporterConfig};
pub use sampling::MessageSamplingStrategy;
