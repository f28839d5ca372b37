//! Condition evaluation seams used by [`ConditionalPolicy`](super::ConditionalPolicy)
//! and by message log filtering.

use std::fmt;

use crate::context::execution::ExecutionContext;
use crate::context::message::Message;
use crate::core::error::GatewayResult;

/// Evaluates a request/response level condition
pub trait ConditionEvaluator: Send + Sync + fmt::Debug {
    /// `Ok(true)` when the policy identified by `policy_id` should run
    fn filter(&self, ctx: &ExecutionContext, policy_id: &str, condition: &str) -> GatewayResult<bool>;
}

/// Evaluates a condition against one message of a stream
pub trait MessageConditionFilter: Send + Sync + fmt::Debug {
    /// `Ok(true)` when the policy identified by `policy_id` should apply to `message`
    fn filter(
        &self,
        ctx: &ExecutionContext,
        policy_id: &str,
        condition: &str,
        message: &Message,
    ) -> GatewayResult<bool>;
}
