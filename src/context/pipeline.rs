//! # Message Pipeline
//!
//! Each side of an exchange (request and response) owns a [`MessagePipeline`]: an ordered,
//! inspectable list of [`MessageInterceptor`] steps. Policies and hooks install steps once,
//! before the stream starts emitting, and every message is then pushed through the steps
//! in installation order.
//!
//! ## Rust Concepts Used
//! - `Arc<dyn MessageInterceptor>` so the same step can be shared and wrapped
//! - `futures::Stream` combinators to apply the steps without blocking the stream's scheduler
//! - Lifetimes tying the processed stream to the borrowed context

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;

use crate::context::execution::ExecutionContext;
use crate::context::message::Message;
use crate::core::error::GatewayResult;

/// A single per-message transformation step
///
/// Returning `Ok(None)` drops the message from the stream, `Err` fails the stream.
#[async_trait]
pub trait MessageInterceptor: Send + Sync + fmt::Debug {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Apply this step to one message
    async fn intercept(&self, ctx: &ExecutionContext, message: Message) -> GatewayResult<Option<Message>>;
}

/// Ordered list of message interceptors for one side of an exchange
#[derive(Debug, Default, Clone)]
pub struct MessagePipeline {
    steps: Vec<Arc<dyn MessageInterceptor>>,
}

impl MessagePipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step; it will run after every step already installed
    pub fn push(&mut self, step: Arc<dyn MessageInterceptor>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the installed steps, in order
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.name().to_string()).collect()
    }

    pub fn steps(&self) -> &[Arc<dyn MessageInterceptor>] {
        &self.steps
    }

    /// Replace every step installed at or after `mark` with `wrap(step)`
    ///
    /// Used to decorate the steps a single component registered, without touching
    /// anything installed before it.
    pub fn wrap_from<F>(&mut self, mark: usize, mut wrap: F)
    where
        F: FnMut(Arc<dyn MessageInterceptor>) -> Arc<dyn MessageInterceptor>,
    {
        for step in self.steps.iter_mut().skip(mark) {
            *step = wrap(step.clone());
        }
    }

    /// Run one message through every step
    pub async fn apply(&self, ctx: &ExecutionContext, message: Message) -> GatewayResult<Option<Message>> {
        let mut current = message;
        for step in &self.steps {
            match step.intercept(ctx, current).await? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Apply the pipeline to a whole stream, preserving arrival order
    pub fn process<'a, S>(
        &'a self,
        ctx: &'a ExecutionContext,
        messages: S,
    ) -> impl Stream<Item = GatewayResult<Message>> + Send + 'a
    where
        S: Stream<Item = Message> + Send + 'a,
    {
        messages
            .then(move |message| self.apply(ctx, message))
            .filter_map(|result| async move { result.transpose() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::request::{Request, Response};
    use futures::stream;

    #[derive(Debug)]
    struct Suffix(&'static str);

    #[async_trait]
    impl MessageInterceptor for Suffix {
        fn name(&self) -> &str {
            self.0
        }

        async fn intercept(&self, _ctx: &ExecutionContext, mut message: Message) -> GatewayResult<Option<Message>> {
            let content = format!("{}{}", message.content_str(), self.0);
            message.set_content(content);
            Ok(Some(message))
        }
    }

    #[derive(Debug)]
    struct DropAll;

    #[async_trait]
    impl MessageInterceptor for DropAll {
        fn name(&self) -> &str {
            "drop-all"
        }

        async fn intercept(&self, _ctx: &ExecutionContext, _message: Message) -> GatewayResult<Option<Message>> {
            Ok(None)
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(Request::default(), Response::default())
    }

    #[tokio::test]
    async fn test_steps_apply_in_order() {
        let ctx = context();
        let mut pipeline = MessagePipeline::new();
        pipeline.push(Arc::new(Suffix("-a")));
        pipeline.push(Arc::new(Suffix("-b")));

        let message = pipeline.apply(&ctx, Message::new("m")).await.unwrap().unwrap();
        assert_eq!(message.content_str(), "m-a-b");
        assert_eq!(pipeline.step_names(), vec!["-a", "-b"]);
    }

    #[tokio::test]
    async fn test_dropped_message_skips_remaining_steps() {
        let ctx = context();
        let mut pipeline = MessagePipeline::new();
        pipeline.push(Arc::new(DropAll));
        pipeline.push(Arc::new(Suffix("-never")));

        assert!(pipeline.apply(&ctx, Message::new("m")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_preserves_order() {
        let ctx = context();
        let mut pipeline = MessagePipeline::new();
        pipeline.push(Arc::new(Suffix("!")));

        let input = stream::iter(vec![Message::new("1"), Message::new("2"), Message::new("3")]);
        let output: Vec<String> = pipeline
            .process(&ctx, input)
            .map(|result| result.unwrap().content_str())
            .collect()
            .await;

        assert_eq!(output, vec!["1!", "2!", "3!"]);
    }

    #[tokio::test]
    async fn test_wrap_from_only_touches_later_steps() {
        let mut pipeline = MessagePipeline::new();
        pipeline.push(Arc::new(Suffix("-a")));
        pipeline.push(Arc::new(Suffix("-b")));

        pipeline.wrap_from(1, |_| Arc::new(DropAll) as Arc<dyn MessageInterceptor>);
        assert_eq!(pipeline.step_names(), vec!["-a", "drop-all"]);
    }
}
