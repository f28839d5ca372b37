//! # Exchange Executor
//!
//! Drives one exchange through every phase:
//!
//! 1. `REQUEST` chain
//! 2. `MESSAGE_REQUEST` chain, which installs request-side message interceptors
//! 3. invoker hooks `pre`, observing request messages as the endpoint receives them
//! 4. request messages through the request pipeline
//! 5. endpoint invocation
//! 6. invoker hooks `post`, observing response messages as the endpoint produced them
//! 7. `MESSAGE_RESPONSE` chain, which installs response-side message interceptors
//! 8. response messages through the response pipeline
//! 9. `RESPONSE` chain
//!
//! An interruption stops the exchange where it happens. With a failure payload the failure is
//! rendered into the response, without one the response is left as the interrupting policy
//! wrote it. Faults are returned to the caller untouched.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, TryStreamExt};
use http::{HeaderValue, StatusCode};
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::context::execution::ExecutionContext;
use crate::context::failure::ExecutionFailure;
use crate::context::message::Message;
use crate::context::request::Response;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ExecutionPhase;
use crate::observability::metrics::EXCHANGES_TOTAL;
use crate::policy::chain::PolicyChain;
use crate::policy::hook::{self, ChainHook};

/// Backend side of an exchange
#[async_trait]
pub trait EndpointInvoker: Send + Sync + fmt::Debug {
    /// Connector id, recorded on the exchange and in analytics records
    fn id(&self) -> &str;

    /// Call the endpoint with the request messages that survived the request pipeline
    ///
    /// Returns the messages the endpoint produced. Request/response APIs pass no message and
    /// write the endpoint answer into the exchange response instead.
    async fn invoke(&self, ctx: &mut ExecutionContext, messages: Vec<Message>) -> GatewayResult<Vec<Message>>;

    /// Release downstream resources
    async fn close(&self) -> GatewayResult<()> {
        Ok(())
    }
}

/// Policy chains and endpoint of one API
#[derive(Debug, Clone)]
pub struct ExchangeExecutor {
    id: String,
    request: PolicyChain,
    message_request: PolicyChain,
    message_response: PolicyChain,
    response: PolicyChain,
    invoker: Arc<dyn EndpointInvoker>,
    invoker_hooks: Vec<Arc<dyn ChainHook>>,
}

impl ExchangeExecutor {
    /// Executor with empty chains in front of `invoker`
    pub fn new<S: Into<String>>(id: S, invoker: Arc<dyn EndpointInvoker>) -> Self {
        let id = id.into();
        Self {
            request: PolicyChain::empty(format!("{}-request", id), ExecutionPhase::Request),
            message_request: PolicyChain::empty(format!("{}-message-request", id), ExecutionPhase::MessageRequest),
            message_response: PolicyChain::empty(format!("{}-message-response", id), ExecutionPhase::MessageResponse),
            response: PolicyChain::empty(format!("{}-response", id), ExecutionPhase::Response),
            id,
            invoker,
            invoker_hooks: Vec::new(),
        }
    }

    /// Use `chain` for the phase it was built for
    pub fn with_chain(mut self, chain: PolicyChain) -> Self {
        match chain.phase() {
            ExecutionPhase::Request => self.request = chain,
            ExecutionPhase::MessageRequest => self.message_request = chain,
            ExecutionPhase::MessageResponse => self.message_response = chain,
            ExecutionPhase::Response => self.response = chain,
        }
        self
    }

    /// Add a hook run around the endpoint invocation
    pub fn with_invoker_hook(mut self, hook: Arc<dyn ChainHook>) -> Self {
        self.invoker_hooks.push(hook);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chain(&self, phase: ExecutionPhase) -> &PolicyChain {
        match phase {
            ExecutionPhase::Request => &self.request,
            ExecutionPhase::MessageRequest => &self.message_request,
            ExecutionPhase::MessageResponse => &self.message_response,
            ExecutionPhase::Response => &self.response,
        }
    }

    pub fn invoker(&self) -> &Arc<dyn EndpointInvoker> {
        &self.invoker
    }

    /// Run the exchange, returning the response messages that reached the client side
    ///
    /// An interrupted exchange returns `Ok` with no message; check
    /// [`ExecutionContext::is_interrupted`] to tell it apart from a completed one.
    #[instrument(skip(self, ctx, messages), fields(executor = %self.id, request_id = %ctx.request().id))]
    pub async fn execute(&self, ctx: &mut ExecutionContext, messages: Vec<Message>) -> GatewayResult<Vec<Message>> {
        ctx.internal_mut().set_endpoint_connector_id(self.invoker.id());

        match self.run(ctx, messages).await {
            Ok(messages) => {
                counter!(EXCHANGES_TOTAL, "outcome" => "completed").increment(1);
                Ok(messages)
            }
            Err(error) if error.is_interruption() => {
                debug!(error = %error, "Exchange interrupted");
                if let Some(failure) = error.failure() {
                    render_failure(ctx.response_mut(), failure);
                }
                counter!(EXCHANGES_TOTAL, "outcome" => "interrupted").increment(1);
                Ok(Vec::new())
            }
            Err(error) => {
                warn!(error = %error, "Exchange failed");
                counter!(EXCHANGES_TOTAL, "outcome" => "failed").increment(1);
                Err(error)
            }
        }
    }

    async fn run(&self, ctx: &mut ExecutionContext, messages: Vec<Message>) -> GatewayResult<Vec<Message>> {
        let execution_id = ctx.request().id.clone();

        self.request.execute(ctx).await?;
        self.message_request.execute(ctx).await?;

        hook::execute_pre(&self.invoker_hooks, &execution_id, ctx, ExecutionPhase::MessageRequest).await?;
        let outbound = process(ctx, ExecutionPhase::MessageRequest, messages).await?;

        let invocation = self.invoker.invoke(ctx, outbound).await;
        let completion = invocation.as_ref().map(|_| ()).map_err(GatewayError::clone);
        hook::execute_completion(
            &self.invoker_hooks,
            &execution_id,
            ctx,
            ExecutionPhase::MessageResponse,
            &completion,
        )
        .await?;
        let inbound = invocation?;

        self.message_response.execute(ctx).await?;
        let delivered = process(ctx, ExecutionPhase::MessageResponse, inbound).await?;

        self.response.execute(ctx).await?;
        Ok(delivered)
    }
}

/// Run `messages` through the pipeline of the side matching `phase`
async fn process(ctx: &ExecutionContext, phase: ExecutionPhase, messages: Vec<Message>) -> GatewayResult<Vec<Message>> {
    if messages.is_empty() {
        return Ok(messages);
    }
    let pipeline = if phase.is_request_side() {
        ctx.request().message_pipeline()
    } else {
        ctx.response().message_pipeline()
    };
    pipeline.process(ctx, stream::iter(messages)).try_collect().await
}

/// Write `failure` as the final response
pub fn render_failure(response: &mut Response, failure: &ExecutionFailure) {
    let rendered = failure.render();
    response.status = StatusCode::from_u16(rendered.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if let Ok(content_type) = HeaderValue::from_str(&rendered.content_type) {
        response.headers.insert(http::header::CONTENT_TYPE, content_type);
    }
    response.body = Bytes::from(rendered.body);
    response.ended = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::request::Request;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl EndpointInvoker for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, _ctx: &mut ExecutionContext, messages: Vec<Message>) -> GatewayResult<Vec<Message>> {
            Ok(messages)
        }
    }

    #[tokio::test]
    async fn test_empty_executor_echoes_messages() {
        let executor = ExchangeExecutor::new("api", Arc::new(Echo));
        let mut ctx = ExecutionContext::new(Request::default(), Response::new());

        let delivered = executor
            .execute(&mut ctx, vec![Message::new("a"), Message::new("b")])
            .await
            .unwrap();

        assert_eq!(delivered.len(), 2);
        assert_eq!(ctx.internal().endpoint_connector_id(), Some("echo"));
        assert!(!ctx.is_interrupted());
    }

    #[test]
    fn test_render_failure() {
        let mut response = Response::new();
        render_failure(
            &mut response,
            &ExecutionFailure::new(429).message("Too many requests").key("RATE_LIMIT"),
        );

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.ended);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["key"], "RATE_LIMIT");
    }

    #[test]
    fn test_chains_are_placed_by_phase() {
        let executor = ExchangeExecutor::new("api", Arc::new(Echo))
            .with_chain(PolicyChain::empty("custom", ExecutionPhase::MessageResponse));

        assert_eq!(executor.chain(ExecutionPhase::MessageResponse).id(), "custom");
        assert_eq!(executor.chain(ExecutionPhase::Request).id(), "api-request");
    }
}
