//! # Policy Chain
//!
//! Executes an ordered list of policies for a single [`ExecutionPhase`].
//!
//! ## Execution Rules
//! - Policies run strictly in list order; a policy never starts before the previous one finished
//! - Only the hook matching the chain's phase is invoked
//! - An interruption stops the chain. Without a payload the chain fails with
//!   [`GatewayError::Interrupted`], with a payload it fails with
//!   [`GatewayError::InterruptedWithFailure`] carrying that exact payload
//! - A hook returning an error is a fault: it propagates immediately and later policies never run
//! - An empty chain completes immediately
//!
//! Phase compatibility is checked when the chain is built, so a legacy policy placed in a
//! message phase is rejected before any exchange reaches it.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::context::execution::{ExecutionContext, Interruption};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ExecutionPhase;
use crate::observability::metrics::{
    CHAIN_DURATION_SECONDS, CHAIN_INTERRUPTIONS_TOTAL, POLICY_EXECUTIONS_TOTAL, POLICY_FAILURES_TOTAL,
};
use crate::policy::hook::{self, ChainHook};
use crate::policy::{self as policies, Flow, Policy};

/// Ordered list of policies bound to one phase
#[derive(Debug, Clone)]
pub struct PolicyChain {
    id: String,
    phase: ExecutionPhase,
    policies: Vec<Arc<dyn Policy>>,
    hooks: Vec<Arc<dyn ChainHook>>,
}

impl PolicyChain {
    /// Build a chain, rejecting policies that cannot run in `phase`
    pub fn new<S: Into<String>>(id: S, phase: ExecutionPhase, policies: Vec<Arc<dyn Policy>>) -> GatewayResult<Self> {
        if let Some(unsupported) = policies
            .iter()
            .find(|policy| !policies::supports_phase(policy.as_ref(), phase))
        {
            return Err(GatewayError::PhaseNotSupported {
                policy: unsupported.id().to_string(),
                phase,
            });
        }

        Ok(Self {
            id: id.into(),
            phase,
            policies,
            hooks: Vec::new(),
        })
    }

    /// Chain with no policies
    pub fn empty<S: Into<String>>(id: S, phase: ExecutionPhase) -> Self {
        Self {
            id: id.into(),
            phase,
            policies: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Add a hook observing every execution of this chain
    pub fn add_hook(&mut self, hook: Arc<dyn ChainHook>) {
        self.hooks.push(hook);
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn ChainHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Ids of the chained policies, in execution order
    pub fn policy_ids(&self) -> Vec<&str> {
        self.policies.iter().map(|policy| policy.id()).collect()
    }

    /// Execute the chain against an exchange
    #[instrument(skip(self, ctx), fields(chain = %self.id, phase = %self.phase, request_id = %ctx.request().id))]
    pub async fn execute(&self, ctx: &mut ExecutionContext) -> GatewayResult<()> {
        let start = Instant::now();

        hook::execute_pre(&self.hooks, &self.id, ctx, self.phase).await?;
        let outcome = self.execute_policies(ctx).await;
        hook::execute_completion(&self.hooks, &self.id, ctx, self.phase, &outcome).await?;

        histogram!(CHAIN_DURATION_SECONDS, "phase" => self.phase.as_str()).record(start.elapsed().as_secs_f64());
        outcome
    }

    async fn execute_policies(&self, ctx: &mut ExecutionContext) -> GatewayResult<()> {
        if self.policies.is_empty() {
            debug!("Empty policy chain, nothing to execute");
            return Ok(());
        }

        for policy in &self.policies {
            if let Some(interruption) = ctx.interruption() {
                return Err(interruption.to_error());
            }

            debug!(policy = %policy.id(), "Executing policy");
            counter!(POLICY_EXECUTIONS_TOTAL, "phase" => self.phase.as_str()).increment(1);

            let flow = match policies::invoke(policy.as_ref(), self.phase, ctx).await {
                Ok(flow) => flow,
                Err(error) if error.is_interruption() => {
                    let interruption = match error.failure() {
                        Some(failure) => Interruption::WithFailure(failure.clone()),
                        None => Interruption::Plain,
                    };
                    ctx.record_interruption(interruption);
                    Flow::Interrupt
                }
                Err(error) => {
                    warn!(policy = %policy.id(), error = %error, "Policy failed");
                    counter!(POLICY_FAILURES_TOTAL, "phase" => self.phase.as_str()).increment(1);
                    return Err(error);
                }
            };

            match flow {
                Flow::Continue if !ctx.is_interrupted() => continue,
                Flow::Continue => {}
                Flow::Interrupt => ctx.record_interruption(Interruption::Plain),
                Flow::InterruptWith(failure) => ctx.record_interruption(Interruption::WithFailure(failure)),
            }

            debug!(policy = %policy.id(), "Policy interrupted the chain");
            counter!(CHAIN_INTERRUPTIONS_TOTAL, "phase" => self.phase.as_str()).increment(1);
            return Err(ctx
                .interruption()
                .map(Interruption::to_error)
                .unwrap_or(GatewayError::Interrupted));
        }

        Ok(())
    }
}
