//! # Reactive Gateway - Execution Pipeline Library
//!
//! The request/message execution pipeline of an API Gateway. An inbound exchange runs through
//! ordered policy chains, reaches an endpoint through a pooled connector client, and for
//! streaming APIs every individual message flows through per-side message pipelines observed
//! by analytics sampling.
//!
//! ## Exchange Flow
//!
//! ```text
//! request ─► REQUEST chain ─► MESSAGE_REQUEST chain ─► endpoint ─► MESSAGE_RESPONSE chain ─► RESPONSE chain
//!                                   │                     ▲  │              │
//!                                   └─ request messages ──┘  └─ response messages ─► client
//! ```
//!
//! ## Rust Module System Notes
//!
//! - `mod module_name;` declares a module, `use module_name::item;` imports from it
//! - Items are private by default, `pub` makes them part of the library API
//! - `pub use` re-exports the most used types at the crate root, so users can write
//!   `use reactive_gateway::PolicyChain` instead of `use reactive_gateway::policy::chain::PolicyChain`

/// Error taxonomy, gateway configuration and the phase/connector enums
pub mod core;

/// Execution context family: request, response, messages, message pipelines, attributes
pub mod context;

/// Policy abstraction, policy chains, conditional and legacy policies, chain hooks
pub mod policy;

/// Boolean condition language used by conditional policies and message log conditions
pub mod expression;

/// Message analytics: sampling, counters, reportable records, reporters and the analytics hook
pub mod analytics;

/// Downstream HTTP and WebSocket clients with lazy, at-most-once construction
pub mod connector;

/// Exchange orchestration across chains and the endpoint
pub mod pipeline;

/// Structured logging setup and metric names
pub mod observability;

/// Main error type used throughout the gateway
pub use core::error::{GatewayError, GatewayResult};

/// Gateway-wide configuration
pub use core::config::GatewayConfig;

pub use core::types::{ConnectorType, ExecutionPhase, MessageOperation};

pub use context::{ExecutionContext, ExecutionFailure, Message, Request, Response};

pub use policy::{ConditionalPolicy, Flow, Policy, PolicyChain};

pub use analytics::{AnalyticsContext, AnalyticsMessageHook, MessageCounters, Reporter};

pub use connector::{ConnectorClientFactory, HttpClientFactory, WebSocketClientFactory};

pub use pipeline::{EndpointInvoker, ExchangeExecutor};
