//! # Legacy Policies
//!
//! Pre-reactive policies expose one blocking call per side of the exchange and report
//! their result through a [`LegacyOutcome`] instead of a [`Flow`]. The
//! [`LegacyPolicyAdapter`] maps them onto the REQUEST and RESPONSE hooks only; they have
//! no notion of individual messages, so chains reject them in message phases.

use async_trait::async_trait;
use std::fmt;
use tracing::debug;

use crate::context::execution::ExecutionContext;
use crate::context::failure::ExecutionFailure;
use crate::core::error::GatewayResult;
use crate::core::types::ExecutionPhase;
use crate::policy::{Flow, Policy};

/// Phases a legacy policy can be adapted to
pub const LEGACY_PHASES: [ExecutionPhase; 2] = [ExecutionPhase::Request, ExecutionPhase::Response];

/// Result of a legacy policy call
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyOutcome {
    /// Hand over to the next policy
    Next,
    /// Stop processing and answer with the given failure
    Fail(ExecutionFailure),
}

/// Request/response policy written against the blocking, pre-reactive contract
pub trait LegacyPolicy: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn on_request(&self, _ctx: &mut ExecutionContext) -> GatewayResult<LegacyOutcome> {
        Ok(LegacyOutcome::Next)
    }

    fn on_response(&self, _ctx: &mut ExecutionContext) -> GatewayResult<LegacyOutcome> {
        Ok(LegacyOutcome::Next)
    }
}

/// Exposes a [`LegacyPolicy`] through the four-phase [`Policy`] interface
#[derive(Debug)]
pub struct LegacyPolicyAdapter<P> {
    inner: P,
}

impl<P: LegacyPolicy> LegacyPolicyAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn to_flow(&self, ctx: &mut ExecutionContext, outcome: LegacyOutcome) -> Flow {
        match outcome {
            LegacyOutcome::Next => Flow::Continue,
            LegacyOutcome::Fail(failure) => {
                debug!(policy = %self.inner.id(), status = failure.status_code(), "Legacy policy failed the exchange");
                ctx.interrupt_with(failure)
            }
        }
    }
}

#[async_trait]
impl<P: LegacyPolicy> Policy for LegacyPolicyAdapter<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn supported_phases(&self) -> &[ExecutionPhase] {
        &LEGACY_PHASES
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        let outcome = self.inner.on_request(ctx)?;
        Ok(self.to_flow(ctx, outcome))
    }

    async fn on_response(&self, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        let outcome = self.inner.on_response(ctx)?;
        Ok(self.to_flow(ctx, outcome))
    }
}
