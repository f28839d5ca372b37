//! # Conditional Policy
//!
//! Decorates a [`Policy`] with two optional conditions:
//!
//! - `condition` guards the REQUEST and RESPONSE hooks. It is evaluated once when the phase
//!   starts; a false result skips the wrapped hook and the phase completes normally.
//!   Without a condition the evaluator is never consulted.
//! - `message_condition` guards individual messages. The wrapped message hook always runs so
//!   the policy can register its interceptors; every interceptor it registered is then
//!   wrapped so that it only applies to messages matching the condition. Messages that do
//!   not match pass through untouched. Without a message condition nothing is wrapped.
//!
//! Request-side and response-side wrapping are independent installations: the message
//! condition is evaluated separately for each stream.
//!
//! ## Rust Concepts Used
//! - Struct composition (`Arc<dyn Policy>` inside the decorator) instead of inheritance
//! - Trait objects for the evaluator seams so tests can count interactions

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::context::execution::ExecutionContext;
use crate::context::message::Message;
use crate::context::pipeline::{MessageInterceptor, MessagePipeline};
use crate::core::error::GatewayResult;
use crate::core::types::ExecutionPhase;
use crate::policy::condition::{ConditionEvaluator, MessageConditionFilter};
use crate::policy::{Flow, Policy};

/// Policy guarded by optional request/response and message conditions
#[derive(Debug, Clone)]
pub struct ConditionalPolicy {
    policy: Arc<dyn Policy>,
    condition: Option<String>,
    message_condition: Option<String>,
    condition_evaluator: Arc<dyn ConditionEvaluator>,
    message_condition_filter: Arc<dyn MessageConditionFilter>,
}

impl ConditionalPolicy {
    /// Wrap `policy`; blank conditions are treated as absent
    pub fn new(
        policy: Arc<dyn Policy>,
        condition: Option<String>,
        message_condition: Option<String>,
        condition_evaluator: Arc<dyn ConditionEvaluator>,
        message_condition_filter: Arc<dyn MessageConditionFilter>,
    ) -> Self {
        Self {
            policy,
            condition: non_blank(condition),
            message_condition: non_blank(message_condition),
            condition_evaluator,
            message_condition_filter,
        }
    }

    /// Raw request/response condition
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Raw per-message condition
    pub fn message_condition(&self) -> Option<&str> {
        self.message_condition.as_deref()
    }

    pub fn inner(&self) -> &Arc<dyn Policy> {
        &self.policy
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> GatewayResult<bool> {
        match &self.condition {
            None => Ok(true),
            Some(condition) => {
                let matched = self.condition_evaluator.filter(ctx, self.policy.id(), condition)?;
                if !matched {
                    debug!(policy = %self.policy.id(), condition = %condition, "Condition not met, skipping policy");
                }
                Ok(matched)
            }
        }
    }

    fn wrap_message_steps(&self, pipeline: &mut MessagePipeline, mark: usize) {
        let Some(condition) = &self.message_condition else {
            return;
        };

        pipeline.wrap_from(mark, |step| {
            Arc::new(ConditionalMessageInterceptor {
                inner: step,
                policy_id: self.policy.id().to_string(),
                condition: condition.clone(),
                filter: self.message_condition_filter.clone(),
            }) as Arc<dyn MessageInterceptor>
        });
    }
}

#[async_trait]
impl Policy for ConditionalPolicy {
    fn id(&self) -> &str {
        self.policy.id()
    }

    fn supported_phases(&self) -> &[ExecutionPhase] {
        self.policy.supported_phases()
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        if self.should_execute(ctx)? {
            self.policy.on_request(ctx).await
        } else {
            Ok(Flow::Continue)
        }
    }

    async fn on_response(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        if self.should_execute(ctx)? {
            self.policy.on_response(ctx).await
        } else {
            Ok(Flow::Continue)
        }
    }

    async fn on_message_request(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        let mark = ctx.request().message_pipeline().len();
        let flow = self.policy.on_message_request(ctx).await?;
        self.wrap_message_steps(ctx.request_mut().message_pipeline_mut(), mark);
        Ok(flow)
    }

    async fn on_message_response(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        let mark = ctx.response().message_pipeline().len();
        let flow = self.policy.on_message_response(ctx).await?;
        self.wrap_message_steps(ctx.response_mut().message_pipeline_mut(), mark);
        Ok(flow)
    }
}

/// Applies `inner` only to messages matching `condition`
pub struct ConditionalMessageInterceptor {
    inner: Arc<dyn MessageInterceptor>,
    policy_id: String,
    condition: String,
    filter: Arc<dyn MessageConditionFilter>,
}

impl fmt::Debug for ConditionalMessageInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalMessageInterceptor")
            .field("inner", &self.inner.name())
            .field("policy_id", &self.policy_id)
            .field("condition", &self.condition)
            .finish()
    }
}

#[async_trait]
impl MessageInterceptor for ConditionalMessageInterceptor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn intercept(&self, ctx: &ExecutionContext, message: Message) -> GatewayResult<Option<Message>> {
        if self.filter.filter(ctx, &self.policy_id, &self.condition, &message)? {
            self.inner.intercept(ctx, message).await
        } else {
            Ok(Some(message))
        }
    }
}

fn non_blank(condition: Option<String>) -> Option<String> {
    condition.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl Policy for Noop {
        fn id(&self) -> &str {
            "noop"
        }
    }

    #[derive(Debug)]
    struct Never;

    impl ConditionEvaluator for Never {
        fn filter(&self, _ctx: &ExecutionContext, _policy_id: &str, _condition: &str) -> GatewayResult<bool> {
            Ok(false)
        }
    }

    impl MessageConditionFilter for Never {
        fn filter(&self, _: &ExecutionContext, _: &str, _: &str, _: &Message) -> GatewayResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_blank_conditions_are_absent() {
        let policy = ConditionalPolicy::new(
            Arc::new(Noop),
            Some("   ".to_string()),
            Some(String::new()),
            Arc::new(Never),
            Arc::new(Never),
        );

        assert_eq!(policy.id(), "noop");
        assert!(policy.condition().is_none());
        assert!(policy.message_condition().is_none());
    }

    #[test]
    fn test_accessors_expose_raw_conditions() {
        let policy = ConditionalPolicy::new(
            Arc::new(Noop),
            Some("{#request.headers['x'] == 'y'}".to_string()),
            Some("{#message.id == '1'}".to_string()),
            Arc::new(Never),
            Arc::new(Never),
        );

        assert_eq!(policy.condition(), Some("{#request.headers['x'] == 'y'}"));
        assert_eq!(policy.message_condition(), Some("{#message.id == '1'}"));
    }
}
