//! # Analytics Message Hook
//!
//! Observes the messages crossing one connector of a streaming exchange and reports a
//! sample of them.
//!
//! `pre` instruments the request-side stream, `post` the response-side stream. Nothing is
//! installed when metrics are disabled for the exchange or when it carries no analytics
//! context. Once installed, the interceptor handles every message as follows:
//!
//! 1. count the message once per exchange and decide whether it is recordable (a count or
//!    decision already stored on the message by an upstream stage is reused, error messages
//!    are always recordable)
//! 2. report a [`MessageMetrics`] for recordable messages
//! 3. report a [`MessageLog`] as well when logging is enabled for this connector side and
//!    phase and the optional message condition holds, then flag the message as logged
//! 4. hand the message on unchanged
//!
//! Reporter failures are logged and counted, never propagated into the stream.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::analytics::context::AnalyticsContext;
use crate::analytics::counters::Counters;
use crate::analytics::helper::MessageAnalyticsHelper;
use crate::analytics::reportable::{LoggedMessage, MessageLog, MessageLogPayload, MessageMetrics, Reportable};
use crate::analytics::reporter::Reporter;
use crate::context::execution::ExecutionContext;
use crate::context::message::{Message, ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING};
use crate::context::pipeline::MessageInterceptor;
use crate::core::error::GatewayResult;
use crate::core::types::{ConnectorType, ExecutionPhase, MessageOperation};
use crate::observability::metrics::{
    MESSAGES_LOGGED_TOTAL, MESSAGES_OBSERVED_TOTAL, MESSAGES_RECORDED_TOTAL, REPORTER_FAILURES_TOTAL,
};
use crate::policy::condition::MessageConditionFilter;
use crate::policy::hook::ChainHook;

pub const ANALYTICS_MESSAGE_HOOK_ID: &str = "hook-analytics-message";

/// Hook installing analytics interceptors on message streams
#[derive(Debug, Clone)]
pub struct AnalyticsMessageHook {
    reporter: Arc<dyn Reporter>,
    log_condition_filter: Arc<dyn MessageConditionFilter>,
    connector_type: ConnectorType,
}

impl AnalyticsMessageHook {
    /// Hook instrumenting the endpoint side of the exchange
    pub fn new(reporter: Arc<dyn Reporter>, log_condition_filter: Arc<dyn MessageConditionFilter>) -> Self {
        Self::for_connector(ConnectorType::Endpoint, reporter, log_condition_filter)
    }

    /// Hook instrumenting the given side of the exchange
    pub fn for_connector(
        connector_type: ConnectorType,
        reporter: Arc<dyn Reporter>,
        log_condition_filter: Arc<dyn MessageConditionFilter>,
    ) -> Self {
        Self {
            reporter,
            log_condition_filter,
            connector_type,
        }
    }

    pub fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }

    fn interceptor(&self, ctx: &ExecutionContext, phase: ExecutionPhase) -> Option<Arc<AnalyticsMessageInterceptor>> {
        if !ctx.metrics().is_enabled() {
            return None;
        }
        let analytics = ctx.internal().analytics_context()?;
        if !analytics.is_enabled() {
            return None;
        }

        Some(Arc::new(AnalyticsMessageInterceptor {
            phase,
            connector_type: self.connector_type,
            reporter: self.reporter.clone(),
            log_condition_filter: self.log_condition_filter.clone(),
            last_recorded: Mutex::new(None),
        }))
    }
}

#[async_trait]
impl ChainHook for AnalyticsMessageHook {
    fn id(&self) -> &str {
        ANALYTICS_MESSAGE_HOOK_ID
    }

    async fn pre(&self, _execution_id: &str, ctx: &mut ExecutionContext, phase: ExecutionPhase) -> GatewayResult<()> {
        if let Some(interceptor) = self.interceptor(ctx, phase) {
            ctx.request_mut().on_message(interceptor);
        }
        Ok(())
    }

    async fn post(&self, _execution_id: &str, ctx: &mut ExecutionContext, phase: ExecutionPhase) -> GatewayResult<()> {
        if let Some(interceptor) = self.interceptor(ctx, phase) {
            ctx.response_mut().on_message(interceptor);
        }
        Ok(())
    }
}

/// Per-stream analytics step installed by [`AnalyticsMessageHook`]
pub struct AnalyticsMessageInterceptor {
    phase: ExecutionPhase,
    connector_type: ConnectorType,
    reporter: Arc<dyn Reporter>,
    log_condition_filter: Arc<dyn MessageConditionFilter>,
    last_recorded: Mutex<Option<Instant>>,
}

impl fmt::Debug for AnalyticsMessageInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsMessageInterceptor")
            .field("phase", &self.phase)
            .field("connector_type", &self.connector_type)
            .finish()
    }
}

impl AnalyticsMessageInterceptor {
    fn elapsed_since_last_record(&self) -> Option<u64> {
        self.last_recorded
            .lock()
            .map(|instant| instant.elapsed().as_millis() as u64)
    }

    fn mark_recorded(&self) {
        *self.last_recorded.lock() = Some(Instant::now());
    }

    fn report(&self, reportable: Reportable) {
        let kind = reportable.kind();
        if let Err(error) = self.reporter.report(reportable) {
            warn!(kind = kind, error = %error, "Unable to report message analytics");
            counter!(REPORTER_FAILURES_TOTAL, "kind" => kind).increment(1);
        }
    }

    fn should_log(&self, ctx: &ExecutionContext, analytics: &AnalyticsContext, message: &Message) -> bool {
        let Some(logging) = analytics.logging() else {
            return false;
        };
        if !logging.is_enabled_for(self.connector_type, self.phase) {
            return false;
        }

        match logging.message_condition() {
            None => true,
            Some(condition) => self
                .log_condition_filter
                .filter(ctx, ANALYTICS_MESSAGE_HOOK_ID, condition, message)
                .unwrap_or_else(|error| {
                    warn!(condition = %condition, error = %error, "Unable to evaluate message log condition");
                    false
                }),
        }
    }

    fn metrics(&self, ctx: &ExecutionContext, message: &Message, counters: Counters) -> MessageMetrics {
        let request = ctx.request();
        MessageMetrics {
            timestamp: Utc::now(),
            request_id: request.id.clone(),
            api_id: ctx.metrics().api_id.clone(),
            client_identifier: request.client_identifier.clone(),
            correlation_id: MessageMetrics::new_correlation_id(),
            parent_correlation_id: None,
            operation: MessageOperation::for_phase(self.phase),
            connector_type: self.connector_type,
            connector_id: ctx.internal().connector_id(self.connector_type).map(str::to_string),
            count: 1,
            message_count: counters.message_count,
            error_count: counters.error_count,
            error: message.is_error(),
            content_length: message.content().len(),
        }
    }

    fn log(&self, ctx: &ExecutionContext, analytics: &AnalyticsContext, message: &Message, correlation_id: String) -> MessageLog {
        let request = ctx.request();
        MessageLog {
            timestamp: Utc::now(),
            request_id: request.id.clone(),
            api_id: ctx.metrics().api_id.clone(),
            client_identifier: request.client_identifier.clone(),
            correlation_id,
            parent_correlation_id: None,
            operation: MessageOperation::for_phase(self.phase),
            connector_type: self.connector_type,
            connector_id: ctx.internal().connector_id(self.connector_type).map(str::to_string),
            message: MessageLogPayload::for_side(self.connector_type, self.phase, capture(analytics, message)),
        }
    }
}

#[async_trait]
impl MessageInterceptor for AnalyticsMessageInterceptor {
    fn name(&self) -> &str {
        ANALYTICS_MESSAGE_HOOK_ID
    }

    async fn intercept(&self, ctx: &ExecutionContext, mut message: Message) -> GatewayResult<Option<Message>> {
        let Some(analytics) = ctx.internal().analytics_context() else {
            return Ok(Some(message));
        };

        let counters = MessageAnalyticsHelper::count_once(&mut message, ctx.internal().message_counters());
        counter!(MESSAGES_OBSERVED_TOTAL, "phase" => self.phase.as_str()).increment(1);

        let recordable = match MessageAnalyticsHelper::recordable(&message) {
            Some(decided) => MessageAnalyticsHelper::reuse_recordable(&mut message, decided),
            None => MessageAnalyticsHelper::compute_recordable(
                &mut message,
                analytics.message_sampling_strategy().as_ref(),
                counters.message_count,
                self.elapsed_since_last_record(),
            ),
        };

        if !recordable {
            return Ok(Some(message));
        }

        self.mark_recorded();
        counter!(MESSAGES_RECORDED_TOTAL, "phase" => self.phase.as_str()).increment(1);

        let metrics = self.metrics(ctx, &message, counters);
        let correlation_id = metrics.correlation_id.clone();
        self.report(Reportable::MessageMetrics(metrics));

        if self.should_log(ctx, analytics, &message) {
            let log = self.log(ctx, analytics, &message, correlation_id);
            self.report(Reportable::MessageLog(log));
            message.set_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING, true);
            counter!(MESSAGES_LOGGED_TOTAL, "phase" => self.phase.as_str()).increment(1);
        }

        debug!(message_id = %message.id(), ordinal = counters.message_count, "Recorded message");
        Ok(Some(message))
    }
}

/// Copy the parts of `message` the logging configuration asks for
fn capture(analytics: &AnalyticsContext, message: &Message) -> LoggedMessage {
    let content = analytics.logging().map(|logging| logging.content).unwrap_or_default();

    let excluded = message
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |content_type| analytics.is_excluded_content_type(content_type));

    let payload = (content.message_payload && !excluded)
        .then(|| truncate(message.content_str(), analytics.logging_max_size()));

    let headers = content.message_headers.then(|| {
        message
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.to_string(), value.to_string())))
            .collect::<HashMap<_, _>>()
    });

    let metadata = content.message_metadata.then(|| message.metadata().clone());

    LoggedMessage {
        id: message.id().to_string(),
        error: message.is_error(),
        payload,
        headers,
        metadata,
    }
}

fn truncate(mut payload: String, max_size: Option<usize>) -> String {
    if let Some(max_size) = max_size {
        if payload.len() > max_size {
            let mut boundary = max_size;
            while !payload.is_char_boundary(boundary) {
                boundary -= 1;
            }
            payload.truncate(boundary);
        }
    }
    payload
}
