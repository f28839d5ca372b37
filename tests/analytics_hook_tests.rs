//! # Analytics Hook Integration Tests
//!
//! Drives [`AnalyticsMessageHook`] through real message pipelines and inspects the records
//! handed to the reporter.

use futures::stream::{self, TryStreamExt};
use parking_lot::Mutex;
use std::sync::Arc;

use reactive_gateway::analytics::{
    Analytics, AnalyticsContext, AnalyticsMessageHook, ChannelReporter, Logging, LoggingContent, LoggingMode,
    LoggingPhase, MessageLogPayload, Reportable, Reporter,
};
use reactive_gateway::context::{
    ExecutionContext, Message, Request, RequestMetrics, Response, ATTR_INTERNAL_MESSAGE_RECORDABLE,
    ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING,
};
use reactive_gateway::core::error::{GatewayError, GatewayResult};
use reactive_gateway::core::types::{ConnectorType, ExecutionPhase, MessageOperation};
use reactive_gateway::expression::ExpressionConditionEvaluator;
use reactive_gateway::policy::ChainHook;

/// Reporter keeping every record in memory
#[derive(Debug, Default)]
struct CollectingReporter {
    records: Mutex<Vec<Reportable>>,
}

impl CollectingReporter {
    fn records(&self) -> Vec<Reportable> {
        self.records.lock().clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, reportable: Reportable) -> GatewayResult<()> {
        self.records.lock().push(reportable);
        Ok(())
    }
}

/// Reporter rejecting every record
#[derive(Debug)]
struct FailingReporter;

impl Reporter for FailingReporter {
    fn report(&self, _reportable: Reportable) -> GatewayResult<()> {
        Err(GatewayError::reporter("sink unavailable"))
    }
}

fn endpoint_logging() -> Logging {
    Logging {
        mode: LoggingMode {
            entrypoint: false,
            endpoint: true,
        },
        phase: LoggingPhase {
            request: true,
            response: true,
        },
        content: LoggingContent::default(),
        ..Logging::default()
    }
}

fn context_with(analytics: Option<Analytics>, metrics_enabled: bool) -> ExecutionContext {
    let request = Request::default().with_id("req-1").with_client_identifier("client-1");
    let metrics = if metrics_enabled {
        RequestMetrics::enabled()
    } else {
        RequestMetrics::default()
    };

    let mut ctx = ExecutionContext::new(request, Response::default()).with_metrics(metrics);
    ctx.internal_mut().set_endpoint_connector_id("mock-endpoint");
    if let Some(analytics) = analytics {
        ctx.internal_mut()
            .set_analytics_context(Some(Arc::new(AnalyticsContext::new(analytics, None, None))));
    }
    ctx
}

fn hook(reporter: Arc<dyn Reporter>) -> AnalyticsMessageHook {
    AnalyticsMessageHook::new(reporter, Arc::new(ExpressionConditionEvaluator::new()))
}

async fn publish(ctx: &ExecutionContext, messages: Vec<Message>) -> Vec<Message> {
    ctx.request()
        .message_pipeline()
        .process(ctx, stream::iter(messages))
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_nothing_installed_when_metrics_disabled() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), false);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();

    assert!(ctx.request().message_pipeline().is_empty());
}

#[tokio::test]
async fn test_nothing_installed_without_analytics_context() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(None, true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    hook(reporter).post("exchange", &mut ctx, ExecutionPhase::MessageResponse).await.unwrap();

    assert!(ctx.request().message_pipeline().is_empty());
    assert!(ctx.response().message_pipeline().is_empty());
}

#[tokio::test]
async fn test_first_message_reports_metrics() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    let messages = publish(&ctx, vec![Message::new("payload")]).await;

    let records = reporter.records();
    assert_eq!(records.len(), 1);
    let Reportable::MessageMetrics(metrics) = &records[0] else {
        panic!("expected message metrics, got {:?}", records[0]);
    };
    assert_eq!(metrics.operation, MessageOperation::Publish);
    assert_eq!(metrics.connector_type, ConnectorType::Endpoint);
    assert_eq!(metrics.connector_id.as_deref(), Some("mock-endpoint"));
    assert_eq!(metrics.request_id, "req-1");
    assert_eq!(metrics.client_identifier, "client-1");
    assert!(!metrics.correlation_id.is_empty());
    assert_eq!(metrics.parent_correlation_id, None);
    assert_eq!(metrics.message_count, 1);
    assert_eq!(metrics.error_count, -1);
    assert_eq!(metrics.content_length, 7);

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].bool_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE), Some(true));
    assert_eq!(messages[0].bool_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING), None);
}

#[tokio::test]
async fn test_logging_reports_metrics_then_log() {
    let reporter = Arc::new(CollectingReporter::default());
    let analytics = Analytics::enabled().with_logging(endpoint_logging());
    let mut ctx = context_with(Some(analytics), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    let messages = publish(&ctx, vec![Message::with_id("m-1", "hello")]).await;

    let records = reporter.records();
    assert_eq!(records.len(), 2);
    let (Reportable::MessageMetrics(metrics), Reportable::MessageLog(log)) = (&records[0], &records[1]) else {
        panic!("expected metrics then log, got {:?}", records);
    };
    assert_eq!(log.correlation_id, metrics.correlation_id);
    match &log.message {
        MessageLogPayload::EndpointRequest(logged) => {
            assert_eq!(logged.id, "m-1");
            assert_eq!(logged.payload.as_deref(), Some("hello"));
        }
        other => panic!("unexpected payload shape: {:?}", other),
    }
    assert_eq!(
        messages[0].bool_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING),
        Some(true)
    );
}

#[tokio::test]
async fn test_message_condition_limits_logging() {
    let reporter = Arc::new(CollectingReporter::default());
    let logging = Logging {
        message_condition: Some("{#message.id == 'keep'}".to_string()),
        ..endpoint_logging()
    };
    let mut ctx = context_with(Some(Analytics::enabled().with_logging(logging)), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    publish(&ctx, vec![Message::with_id("drop", "a")]).await;

    let records = reporter.records();
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0], Reportable::MessageMetrics(_)));
}

#[tokio::test]
async fn test_preset_decision_is_reused() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    let message = Message::new("skip me").with_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE, false);
    let messages = publish(&ctx, vec![message]).await;

    assert!(reporter.records().is_empty());
    assert_eq!(messages.len(), 1);
    assert_eq!(ctx.internal().message_counters().message_count(), 1);
}

#[tokio::test]
async fn test_error_overrides_a_preset_negative_decision() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    let mut message = Message::new("failed downstream").with_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE, false);
    message.set_error(true);
    let messages = publish(&ctx, vec![message]).await;

    let records = reporter.records();
    assert_eq!(records.len(), 1);
    let Reportable::MessageMetrics(metrics) = &records[0] else {
        panic!("expected message metrics, got {:?}", records[0]);
    };
    assert!(metrics.error);
    assert_eq!(messages[0].bool_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE), Some(true));
}

#[tokio::test]
async fn test_both_connector_hooks_count_each_message_once() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);
    ctx.internal_mut().set_entrypoint_connector_id("http-get");

    let evaluator = Arc::new(ExpressionConditionEvaluator::new());
    let endpoint = AnalyticsMessageHook::for_connector(ConnectorType::Endpoint, reporter.clone(), evaluator.clone());
    let entrypoint = AnalyticsMessageHook::for_connector(ConnectorType::Entrypoint, reporter.clone(), evaluator);
    endpoint.pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    entrypoint.pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();

    publish(&ctx, vec![Message::new("one"), Message::new("two"), Message::new("three")]).await;

    assert_eq!(ctx.internal().message_counters().message_count(), 3);

    // The first message is the only one sampled, once per connector side with the same ordinal
    let records = reporter.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        let Reportable::MessageMetrics(metrics) = record else {
            panic!("expected message metrics, got {:?}", record);
        };
        assert_eq!(metrics.message_count, 1);
    }
}

#[tokio::test]
async fn test_request_level_condition_does_not_gate_message_logs() {
    let reporter = Arc::new(CollectingReporter::default());
    let logging = Logging {
        condition: Some("{#request.method == 'DELETE'}".to_string()),
        ..endpoint_logging()
    };
    let mut ctx = context_with(Some(Analytics::enabled().with_logging(logging)), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    publish(&ctx, vec![Message::new("logged")]).await;

    let records = reporter.records();
    assert_eq!(records.len(), 2);
    assert!(matches!(records[1], Reportable::MessageLog(_)));
}

#[tokio::test]
async fn test_errors_are_always_recorded_and_counted() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(reporter.clone()).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    publish(
        &ctx,
        vec![Message::new("first"), Message::new("second"), Message::error("boom"), Message::new("fourth")],
    )
    .await;

    let records = reporter.records();
    assert_eq!(records.len(), 2);
    let Reportable::MessageMetrics(error_metrics) = &records[1] else {
        panic!("expected message metrics");
    };
    assert!(error_metrics.error);
    assert_eq!(error_metrics.message_count, 3);
    assert_eq!(error_metrics.error_count, 1);

    let counters = ctx.internal().message_counters();
    assert_eq!(counters.message_count(), 4);
    assert_eq!(counters.error_count(), 1);
}

#[tokio::test]
async fn test_response_side_uses_subscribe_operation() {
    let reporter = Arc::new(CollectingReporter::default());
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(reporter.clone()).post("exchange", &mut ctx, ExecutionPhase::MessageResponse).await.unwrap();
    let _: Vec<Message> = ctx
        .response()
        .message_pipeline()
        .process(&ctx, stream::iter(vec![Message::new("event")]))
        .try_collect()
        .await
        .unwrap();

    let records = reporter.records();
    let Reportable::MessageMetrics(metrics) = &records[0] else {
        panic!("expected message metrics");
    };
    assert_eq!(metrics.operation, MessageOperation::Subscribe);
}

#[tokio::test]
async fn test_reporter_failure_does_not_break_the_stream() {
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(Arc::new(FailingReporter)).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    let messages = publish(&ctx, vec![Message::new("one"), Message::new("two")]).await;

    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn test_channel_reporter_receives_records() {
    let (reporter, mut receiver) = ChannelReporter::new(16);
    let mut ctx = context_with(Some(Analytics::enabled()), true);

    hook(Arc::new(reporter)).pre("exchange", &mut ctx, ExecutionPhase::MessageRequest).await.unwrap();
    publish(&ctx, vec![Message::new("one")]).await;

    let record = receiver.recv().await.unwrap();
    assert_eq!(record.kind(), "message_metrics");
    assert_eq!(record.request_id(), "req-1");
}
