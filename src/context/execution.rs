//! # Execution Context
//!
//! One [`ExecutionContext`] exists per in-flight exchange. It owns the request and response,
//! the public attributes visible to policies and conditions, the typed internal attributes,
//! the interruption state and a handle on the component registry.
//!
//! Message sub-exchanges reuse the parent context: message interceptors receive a shared
//! `&ExecutionContext` next to the message they transform.
//!
//! ## Rust Concepts Used
//! - Owned request/response with `&mut` accessors so policies mutate them in place
//! - `Option<Interruption>` to model the at-most-once interruption state
//! - `Send + Sync` so the context can be borrowed across `.await` points

use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::context::attributes::InternalAttributes;
use crate::context::components::ComponentRegistry;
use crate::context::failure::ExecutionFailure;
use crate::context::request::{Request, Response};
use crate::core::error::GatewayError;
use crate::policy::Flow;

/// Per-request metrics switches
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    /// Whether analytics are collected for this exchange
    pub enabled: bool,

    /// API the exchange was routed to, if known
    pub api_id: Option<String>,
}

impl RequestMetrics {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            api_id: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Terminal state recorded when a policy interrupts the exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Interruption {
    /// The response is already in its final state
    Plain,
    /// The caller must render the attached failure
    WithFailure(ExecutionFailure),
}

impl Interruption {
    /// Error signalled to the caller of the interrupted chain
    pub fn to_error(&self) -> GatewayError {
        match self {
            Self::Plain => GatewayError::Interrupted,
            Self::WithFailure(failure) => GatewayError::interrupted_with(failure.clone()),
        }
    }
}

/// State of one in-flight exchange
#[derive(Debug)]
pub struct ExecutionContext {
    request: Request,
    response: Response,
    attributes: HashMap<String, Value>,
    internal: InternalAttributes,
    metrics: RequestMetrics,
    interruption: Option<Interruption>,
    components: ComponentRegistry,
    started_at: Instant,
}

impl ExecutionContext {
    /// Create a context with metrics disabled and an empty component registry
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            attributes: HashMap::new(),
            internal: InternalAttributes::new(),
            metrics: RequestMetrics::default(),
            interruption: None,
            components: ComponentRegistry::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: RequestMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn internal(&self) -> &InternalAttributes {
        &self.internal
    }

    pub fn internal_mut(&mut self) -> &mut InternalAttributes {
        &mut self.internal
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut RequestMetrics {
        &mut self.metrics
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Time elapsed since the exchange started
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Interrupt the exchange; the response is expected to be final already
    pub fn interrupt(&mut self) -> Flow {
        self.record_interruption(Interruption::Plain);
        Flow::Interrupt
    }

    /// Interrupt the exchange with a failure the caller must render
    pub fn interrupt_with(&mut self, failure: ExecutionFailure) -> Flow {
        self.record_interruption(Interruption::WithFailure(failure.clone()));
        Flow::InterruptWith(failure)
    }

    /// Record an interruption; only the first one is kept
    pub(crate) fn record_interruption(&mut self, interruption: Interruption) {
        if self.interruption.is_none() {
            self.interruption = Some(interruption);
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interruption.is_some()
    }

    pub fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }
}
