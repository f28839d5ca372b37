//! # Execution Context Family
//!
//! The substrate every pipeline stage operates on: the per-exchange [`ExecutionContext`],
//! the request/response value objects, individual streaming messages and the message
//! pipelines they flow through.

pub mod attributes;
pub mod components;
pub mod execution;
pub mod failure;
pub mod message;
pub mod pipeline;
pub mod request;

pub use attributes::InternalAttributes;
pub use components::ComponentRegistry;
pub use execution::{ExecutionContext, Interruption, RequestMetrics};
pub use failure::{ExecutionFailure, RenderedFailure};
pub use message::{
    Message, ATTR_INTERNAL_MESSAGE_COUNTERS, ATTR_INTERNAL_MESSAGE_RECORDABLE,
    ATTR_INTERNAL_MESSAGE_RECORDABLE_WITH_LOGGING,
};
pub use pipeline::{MessageInterceptor, MessagePipeline};
pub use request::{Request, Response};
