//! # Connectors
//!
//! Downstream clients used by endpoint connectors. Each factory owns one lazily built client,
//! shared by every exchange routed to its endpoint and released by an idempotent `close`.
//!
//! ## Components
//! - [`configuration`]: declarative endpoint settings
//! - [`options`]: translation into transport options
//! - [`proxy`]: system proxy settings
//! - [`lazy`]: the at-most-once construction cell
//! - [`http`] and [`websocket`]: the concrete factories

pub mod configuration;
pub mod http;
pub mod lazy;
pub mod options;
pub mod proxy;
pub mod websocket;

use std::sync::Arc;

use crate::context::execution::ExecutionContext;
use crate::core::error::GatewayResult;

pub use self::configuration::{
    EndpointConfiguration, HttpClientSettings, HttpEndpointConfiguration, HttpHeader, HttpProtocolVersion,
    KeyStore, ProxyConfiguration, ProxyType, SslConfiguration, TrustStore, WebSocketEndpointConfiguration,
};
pub use self::http::{HttpClient, HttpClientFactory, HttpEndpointConnector};
pub use self::lazy::LazyClient;
pub use self::options::{HttpClientOptions, ProxyOptions, TargetAddress, TlsOptions};
pub use self::proxy::SystemProxySettings;
pub use self::websocket::{WebSocketClient, WebSocketClientFactory, WebSocketConnection};

/// Factory of the shared downstream client of one endpoint
pub trait ConnectorClientFactory: Send + Sync {
    type Client: Send + Sync;
    type Configuration: EndpointConfiguration;

    /// Return the cached client, building it on first use
    ///
    /// At most one client is built per factory until [`close`](Self::close), even under
    /// concurrent first use. A failed build leaves the factory ready to retry.
    fn get_or_build_client(
        &self,
        ctx: &ExecutionContext,
        configuration: &Self::Configuration,
    ) -> GatewayResult<Arc<Self::Client>>;

    /// Release the cached client; closing twice, or before any build, is a no-op
    fn close(&self) -> GatewayResult<()>;
}
