//! # Internal Attributes
//!
//! Gateway-internal state attached to one exchange. Well-known entries are typed fields;
//! anything else goes into a string-keyed extension map. A fresh store is created with every
//! [`ExecutionContext`](crate::context::execution::ExecutionContext) and never shared between
//! exchanges.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::analytics::context::AnalyticsContext;
use crate::analytics::counters::MessageCounters;
use crate::core::types::ConnectorType;

/// Typed per-exchange internal attribute store
#[derive(Debug, Default)]
pub struct InternalAttributes {
    analytics_context: Option<Arc<AnalyticsContext>>,
    entrypoint_connector_id: Option<String>,
    endpoint_connector_id: Option<String>,
    message_counters: Arc<MessageCounters>,
    extensions: HashMap<String, Value>,
}

impl InternalAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analytics_context(&self) -> Option<&Arc<AnalyticsContext>> {
        self.analytics_context.as_ref()
    }

    /// Set or clear the analytics context of this exchange
    pub fn set_analytics_context(&mut self, analytics_context: Option<Arc<AnalyticsContext>>) {
        self.analytics_context = analytics_context;
    }

    pub fn entrypoint_connector_id(&self) -> Option<&str> {
        self.entrypoint_connector_id.as_deref()
    }

    pub fn set_entrypoint_connector_id<S: Into<String>>(&mut self, id: S) {
        self.entrypoint_connector_id = Some(id.into());
    }

    pub fn endpoint_connector_id(&self) -> Option<&str> {
        self.endpoint_connector_id.as_deref()
    }

    pub fn set_endpoint_connector_id<S: Into<String>>(&mut self, id: S) {
        self.endpoint_connector_id = Some(id.into());
    }

    /// Connector id for the given side of the exchange
    pub fn connector_id(&self, connector_type: ConnectorType) -> Option<&str> {
        match connector_type {
            ConnectorType::Entrypoint => self.entrypoint_connector_id(),
            ConnectorType::Endpoint => self.endpoint_connector_id(),
        }
    }

    /// Message counters shared by both message streams of this exchange
    pub fn message_counters(&self) -> &Arc<MessageCounters> {
        &self.message_counters
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) {
        self.extensions.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.extensions.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_ids() {
        let mut attributes = InternalAttributes::new();
        attributes.set_endpoint_connector_id("kafka");
        attributes.set_entrypoint_connector_id("sse");

        assert_eq!(attributes.connector_id(ConnectorType::Endpoint), Some("kafka"));
        assert_eq!(attributes.connector_id(ConnectorType::Entrypoint), Some("sse"));
    }

    #[test]
    fn test_analytics_context_can_be_cleared() {
        let mut attributes = InternalAttributes::new();
        attributes.set_analytics_context(Some(Arc::new(AnalyticsContext::disabled())));
        assert!(attributes.analytics_context().is_some());

        attributes.set_analytics_context(None);
        assert!(attributes.analytics_context().is_none());
    }

    #[test]
    fn test_extensions() {
        let mut attributes = InternalAttributes::new();
        attributes.set("flow.id", "flow-1");
        assert_eq!(attributes.get("flow.id"), Some(&Value::from("flow-1")));
        assert!(attributes.remove("flow.id").is_some());
        assert!(attributes.get("flow.id").is_none());
    }
}
