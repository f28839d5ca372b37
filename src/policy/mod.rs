//! # Policies
//!
//! A policy is a unit of behaviour applied to an exchange during one or more execution phases.
//! Every policy exposes the same four hooks; a chain only calls the hook matching its phase.
//!
//! Policy variants:
//! - native policies implementing [`Policy`] directly
//! - legacy request/response policies adapted through [`legacy::LegacyPolicyAdapter`]
//! - any policy decorated with conditions through [`conditional::ConditionalPolicy`]
//!
//! ## Interruption
//! Hooks return a [`Flow`] instead of mutating a flag and hoping the caller checks it.
//! `Flow::Continue` lets the chain move on, the two interrupt variants stop it. Policies
//! usually produce them through [`ExecutionContext::interrupt`] and
//! [`ExecutionContext::interrupt_with`], which also record the terminal state on the context.
//!
//! ## Rust Concepts Used
//! - `async_trait` for async hooks on trait objects
//! - Default trait methods so a policy only implements the hooks it cares about
//! - `Arc<dyn Policy>` for policies shared between chains and decorators

use async_trait::async_trait;
use std::fmt;

use crate::context::execution::ExecutionContext;
use crate::context::failure::ExecutionFailure;
use crate::core::error::GatewayResult;
use crate::core::types::ExecutionPhase;

pub mod chain;
pub mod condition;
pub mod conditional;
pub mod hook;
pub mod legacy;

pub use chain::PolicyChain;
pub use condition::{ConditionEvaluator, MessageConditionFilter};
pub use conditional::ConditionalPolicy;
pub use hook::ChainHook;
pub use legacy::{LegacyPolicy, LegacyPolicyAdapter};

/// Outcome of a single policy hook
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Let the next policy run
    Continue,
    /// Stop the chain; the response is already final
    Interrupt,
    /// Stop the chain and render the given failure
    InterruptWith(ExecutionFailure),
}

impl Flow {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Four-phase policy interface
#[async_trait]
pub trait Policy: Send + Sync + fmt::Debug {
    /// Identifier used for ordering diagnostics and logs
    fn id(&self) -> &str;

    /// Phases this policy may be placed in
    fn supported_phases(&self) -> &[ExecutionPhase] {
        &ExecutionPhase::ALL
    }

    async fn on_request(&self, _ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        Ok(Flow::Continue)
    }

    async fn on_response(&self, _ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Register request-side message handling, usually through `ctx.request_mut().on_message(..)`
    async fn on_message_request(&self, _ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Register response-side message handling, usually through `ctx.response_mut().on_message(..)`
    async fn on_message_response(&self, _ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
        Ok(Flow::Continue)
    }
}

/// Whether `policy` may run in `phase`
pub fn supports_phase(policy: &dyn Policy, phase: ExecutionPhase) -> bool {
    policy.supported_phases().contains(&phase)
}

/// Dispatch to the hook matching `phase`
pub async fn invoke(policy: &dyn Policy, phase: ExecutionPhase, ctx: &mut ExecutionContext) -> GatewayResult<Flow> {
    match phase {
        ExecutionPhase::Request => policy.on_request(ctx).await,
        ExecutionPhase::Response => policy.on_response(ctx).await,
        ExecutionPhase::MessageRequest => policy.on_message_request(ctx).await,
        ExecutionPhase::MessageResponse => policy.on_message_response(ctx).await,
    }
}
