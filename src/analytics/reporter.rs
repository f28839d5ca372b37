//! # Reporters
//!
//! A [`Reporter`] is the sink of analytics records. Reporting is fire-and-forget from the
//! pipeline's point of view: callers log a failed `report` and carry on.
//!
//! Two implementations ship with the crate:
//! - [`ChannelReporter`] pushes records into a bounded `tokio::sync::mpsc` channel drained by
//!   a background consumer; a full channel is reported as an error instead of blocking traffic
//! - [`LoggingReporter`] writes every record as a structured `tracing` event

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::analytics::reportable::Reportable;
use crate::core::error::{GatewayError, GatewayResult};

/// Sink accepting finished analytics records
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report(&self, reportable: Reportable) -> GatewayResult<()>;
}

/// Reporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Capacity of the channel between the pipeline and the consumer
    pub buffer_size: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
        }
    }
}

/// Reporter writing into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::Sender<Reportable>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end its records are delivered to
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Reportable>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_config(config: &ReporterConfig) -> (Self, mpsc::Receiver<Reportable>) {
        Self::new(config.buffer_size)
    }

    /// Like [`ChannelReporter::new`], with the receiving end exposed as a `Stream`
    pub fn with_stream(buffer_size: usize) -> (Self, ReceiverStream<Reportable>) {
        let (reporter, receiver) = Self::new(buffer_size);
        (reporter, ReceiverStream::new(receiver))
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, reportable: Reportable) -> GatewayResult<()> {
        self.sender.try_send(reportable).map_err(|err| match err {
            TrySendError::Full(record) => GatewayError::reporter(format!(
                "reporter buffer is full, dropping {} for request {}",
                record.kind(),
                record.request_id()
            )),
            TrySendError::Closed(_) => GatewayError::reporter("reporter channel is closed"),
        })
    }
}

/// Reporter emitting records as `tracing` events
#[derive(Debug, Clone, Default)]
pub struct LoggingReporter;

impl Reporter for LoggingReporter {
    fn report(&self, reportable: Reportable) -> GatewayResult<()> {
        let record = serde_json::to_string(&reportable)?;
        info!(
            target: "gateway::analytics",
            kind = reportable.kind(),
            request_id = %reportable.request_id(),
            record = %record,
            "Analytics record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::reportable::MessageMetrics;
    use crate::core::types::{ConnectorType, MessageOperation};
    use chrono::Utc;

    fn metrics(request_id: &str) -> Reportable {
        Reportable::MessageMetrics(MessageMetrics {
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            api_id: None,
            client_identifier: "client".to_string(),
            correlation_id: MessageMetrics::new_correlation_id(),
            parent_correlation_id: None,
            operation: MessageOperation::Subscribe,
            connector_type: ConnectorType::Endpoint,
            connector_id: None,
            count: 1,
            message_count: 1,
            error_count: -1,
            error: false,
            content_length: 0,
        })
    }

    #[tokio::test]
    async fn test_channel_reporter_delivers_records() {
        let (reporter, mut receiver) = ChannelReporter::new(4);
        reporter.report(metrics("req-1")).unwrap();

        let record = receiver.recv().await.unwrap();
        assert_eq!(record.request_id(), "req-1");
    }

    #[tokio::test]
    async fn test_full_channel_is_a_reporter_error() {
        let (reporter, _receiver) = ChannelReporter::new(1);
        reporter.report(metrics("req-1")).unwrap();

        let error = reporter.report(metrics("req-2")).unwrap_err();
        assert!(matches!(error, GatewayError::Reporter { .. }));
    }

    #[tokio::test]
    async fn test_closed_channel_is_a_reporter_error() {
        let (reporter, receiver) = ChannelReporter::new(1);
        drop(receiver);
        assert!(reporter.report(metrics("req-1")).is_err());
    }

    #[tokio::test]
    async fn test_stream_ends_when_reporters_are_dropped() {
        use futures::StreamExt;

        let (reporter, stream) = ChannelReporter::with_stream(4);
        reporter.report(metrics("req-1")).unwrap();
        reporter.report(metrics("req-2")).unwrap();
        drop(reporter);

        let ids: Vec<String> = stream.map(|record| record.request_id().to_string()).collect().await;
        assert_eq!(ids, vec!["req-1", "req-2"]);
    }

    #[test]
    fn test_logging_reporter_accepts_records() {
        assert!(LoggingReporter.report(metrics("req-1")).is_ok());
    }
}
