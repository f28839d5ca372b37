//! Hooks observing a chain or an endpoint invocation.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::context::execution::ExecutionContext;
use crate::context::failure::ExecutionFailure;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ExecutionPhase;

/// Callback invoked around an execution unit
///
/// `pre` runs before the unit starts, then exactly one of `post`, `interrupt`,
/// `interrupt_with` or `error` runs once it has finished.
#[async_trait]
pub trait ChainHook: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    async fn pre(&self, _execution_id: &str, _ctx: &mut ExecutionContext, _phase: ExecutionPhase) -> GatewayResult<()> {
        Ok(())
    }

    async fn post(&self, _execution_id: &str, _ctx: &mut ExecutionContext, _phase: ExecutionPhase) -> GatewayResult<()> {
        Ok(())
    }

    async fn interrupt(
        &self,
        _execution_id: &str,
        _ctx: &mut ExecutionContext,
        _phase: ExecutionPhase,
    ) -> GatewayResult<()> {
        Ok(())
    }

    async fn interrupt_with(
        &self,
        _execution_id: &str,
        _ctx: &mut ExecutionContext,
        _phase: ExecutionPhase,
        _failure: &ExecutionFailure,
    ) -> GatewayResult<()> {
        Ok(())
    }

    async fn error(
        &self,
        _execution_id: &str,
        _ctx: &mut ExecutionContext,
        _phase: ExecutionPhase,
        _error: &GatewayError,
    ) -> GatewayResult<()> {
        Ok(())
    }
}

/// Run `pre` on every hook, in order
pub async fn execute_pre(
    hooks: &[Arc<dyn ChainHook>],
    execution_id: &str,
    ctx: &mut ExecutionContext,
    phase: ExecutionPhase,
) -> GatewayResult<()> {
    for hook in hooks {
        hook.pre(execution_id, ctx, phase).await?;
    }
    Ok(())
}

/// Run the completion callback matching `outcome` on every hook, in order
pub async fn execute_completion(
    hooks: &[Arc<dyn ChainHook>],
    execution_id: &str,
    ctx: &mut ExecutionContext,
    phase: ExecutionPhase,
    outcome: &GatewayResult<()>,
) -> GatewayResult<()> {
    for hook in hooks {
        match outcome {
            Ok(()) => hook.post(execution_id, ctx, phase).await?,
            Err(GatewayError::Interrupted) => hook.interrupt(execution_id, ctx, phase).await?,
            Err(GatewayError::InterruptedWithFailure { failure }) => {
                hook.interrupt_with(execution_id, ctx, phase, failure).await?
            }
            Err(error) => hook.error(execution_id, ctx, phase, error).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::request::{Request, Response};
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChainHook for Recording {
        fn id(&self) -> &str {
            "recording"
        }

        async fn pre(&self, id: &str, _ctx: &mut ExecutionContext, phase: ExecutionPhase) -> GatewayResult<()> {
            self.calls.lock().push(format!("pre:{}:{}", id, phase));
            Ok(())
        }

        async fn post(&self, id: &str, _ctx: &mut ExecutionContext, phase: ExecutionPhase) -> GatewayResult<()> {
            self.calls.lock().push(format!("post:{}:{}", id, phase));
            Ok(())
        }

        async fn interrupt_with(
            &self,
            _id: &str,
            _ctx: &mut ExecutionContext,
            _phase: ExecutionPhase,
            failure: &ExecutionFailure,
        ) -> GatewayResult<()> {
            self.calls.lock().push(format!("interrupt_with:{}", failure.status_code()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_completion_dispatches_by_outcome() {
        let recording = Arc::new(Recording::default());
        let hooks: Vec<Arc<dyn ChainHook>> = vec![recording.clone()];
        let mut ctx = ExecutionContext::new(Request::default(), Response::default());

        execute_pre(&hooks, "chain", &mut ctx, ExecutionPhase::Request).await.unwrap();
        execute_completion(&hooks, "chain", &mut ctx, ExecutionPhase::Request, &Ok(())).await.unwrap();
        let outcome = Err(GatewayError::interrupted_with(ExecutionFailure::new(429)));
        execute_completion(&hooks, "chain", &mut ctx, ExecutionPhase::Request, &outcome)
            .await
            .unwrap();

        assert_eq!(
            *recording.calls.lock(),
            vec!["pre:chain:REQUEST", "post:chain:REQUEST", "interrupt_with:429"]
        );
    }
}
