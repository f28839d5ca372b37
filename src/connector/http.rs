//! # HTTP Connector
//!
//! [`HttpClientFactory`] lazily builds one `reqwest` client per factory from an
//! [`HttpEndpointConfiguration`]. [`HttpEndpointConnector`] uses it to call the endpoint on
//! behalf of an exchange.
//!
//! `reqwest` 0.11 speaks `http` 0.2 types while the pipeline uses `http` 1.x, so methods,
//! headers and status codes cross the boundary through their string and byte forms.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connector::configuration::{HttpEndpointConfiguration, HttpHeader, HttpProtocolVersion, ProxyType};
use crate::connector::lazy::LazyClient;
use crate::connector::options::{HttpClientOptions, IdentityOptions, ProxyOptions};
use crate::connector::proxy::SystemProxySettings;
use crate::connector::ConnectorClientFactory;
use crate::context::execution::ExecutionContext;
use crate::context::message::Message;
use crate::core::error::{GatewayError, GatewayResult};
use crate::observability::metrics::{CONNECTOR_CLIENTS_BUILT_TOTAL, CONNECTOR_CLIENTS_CLOSED_TOTAL};
use crate::pipeline::executor::EndpointInvoker;

/// Maximum redirects followed when redirects are enabled
const MAX_REDIRECTS: usize = 10;

/// Downstream HTTP client bound to one endpoint target
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    options: HttpClientOptions,
}

/// Response received from the endpoint
#[derive(Debug, Clone)]
pub struct HttpClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpClient {
    /// Build the transport described by `options`
    pub fn build(options: HttpClientOptions) -> GatewayResult<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.read_timeout)
            .pool_idle_timeout(options.idle_timeout)
            .pool_max_idle_per_host(if options.keep_alive { options.max_pool_size } else { 0 })
            .gzip(options.compression)
            .default_headers(default_headers(&options.default_headers)?)
            .redirect(if options.follow_redirects {
                reqwest::redirect::Policy::limited(MAX_REDIRECTS)
            } else {
                reqwest::redirect::Policy::none()
            });

        builder = match options.version {
            HttpProtocolVersion::Http11 => builder.http1_only(),
            HttpProtocolVersion::Http2 if options.http2_prior_knowledge => builder.http2_prior_knowledge(),
            HttpProtocolVersion::Http2 => builder,
        };

        builder = match &options.proxy {
            Some(proxy) => builder.proxy(proxy_for(proxy)?),
            None => builder.no_proxy(),
        };

        if let Some(tls) = &options.tls {
            builder = builder
                .use_native_tls()
                .danger_accept_invalid_certs(tls.trust_all)
                .danger_accept_invalid_hostnames(tls.trust_all || !tls.verify_host);

            if let Some(trust) = &tls.trust {
                let certificate = reqwest::Certificate::from_pem(&trust.pem)
                    .map_err(|error| GatewayError::connector_build(format!("invalid trust store: {}", error)))?;
                builder = builder.add_root_certificate(certificate);
            }

            if let Some(identity) = &tls.identity {
                let identity = match identity {
                    IdentityOptions::Pem { cert, key } => reqwest::Identity::from_pkcs8_pem(cert, key),
                    IdentityOptions::Pkcs12 { der, password } => reqwest::Identity::from_pkcs12_der(der, password),
                }
                .map_err(|error| GatewayError::connector_build(format!("invalid key store: {}", error)))?;
                builder = builder.identity(identity);
            }
        }

        let client = builder
            .build()
            .map_err(|error| GatewayError::connector_build(format!("unable to build HTTP client: {}", error)))?;

        Ok(Self { client, options })
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }

    /// Send one request to `path` on the endpoint target
    pub async fn send(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> GatewayResult<HttpClientResponse> {
        let url = self.options.target.resolve(path);
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|error| GatewayError::internal(format!("unsupported method {}: {}", method, error)))?;

        let mut outbound = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            if name == http::header::HOST || name == http::header::CONTENT_LENGTH {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                outbound.append(name, value);
            }
        }

        debug!(method = %method, url = %url, "Calling endpoint");
        let response = self.client.request(method, url).headers(outbound).body(body).send().await?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|error| GatewayError::internal(format!("invalid endpoint status: {}", error)))?;
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }
        let body = response.bytes().await?;

        Ok(HttpClientResponse { status, headers, body })
    }
}

fn default_headers(headers: &[HttpHeader]) -> GatewayResult<reqwest::header::HeaderMap> {
    let mut map = reqwest::header::HeaderMap::new();
    for header in headers {
        let name = reqwest::header::HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|error| GatewayError::connector_build(format!("invalid header name '{}': {}", header.name, error)))?;
        let value = reqwest::header::HeaderValue::from_str(&header.value)
            .map_err(|error| GatewayError::connector_build(format!("invalid value for header '{}': {}", header.name, error)))?;
        map.append(name, value);
    }
    Ok(map)
}

fn proxy_for(options: &ProxyOptions) -> GatewayResult<reqwest::Proxy> {
    let invalid = |error: reqwest::Error| GatewayError::connector_build(format!("invalid proxy: {}", error));

    match options.proxy_type {
        ProxyType::Http => {
            let proxy = reqwest::Proxy::all(options.url()).map_err(invalid)?;
            Ok(match &options.username {
                Some(username) => proxy.basic_auth(username, options.password.as_deref().unwrap_or_default()),
                None => proxy,
            })
        }
        ProxyType::Socks4 | ProxyType::Socks5 => {
            let mut url = url::Url::parse(&options.url())
                .map_err(|error| GatewayError::connector_build(format!("invalid proxy: {}", error)))?;
            if let Some(username) = &options.username {
                let _ = url.set_username(username);
                let _ = url.set_password(options.password.as_deref());
            }
            reqwest::Proxy::all(url.as_str()).map_err(invalid)
        }
    }
}

/// Factory owning the HTTP client of one endpoint
#[derive(Debug, Default)]
pub struct HttpClientFactory {
    client: LazyClient<HttpClient>,
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.client.is_built()
    }
}

impl ConnectorClientFactory for HttpClientFactory {
    type Client = HttpClient;
    type Configuration = HttpEndpointConfiguration;

    fn get_or_build_client(
        &self,
        ctx: &ExecutionContext,
        configuration: &HttpEndpointConfiguration,
    ) -> GatewayResult<Arc<HttpClient>> {
        self.client.get_or_build(|| {
            let options =
                HttpClientOptions::from_configuration(configuration, || SystemProxySettings::lookup(ctx.components()))?;
            let client = HttpClient::build(options)?;

            info!(
                target_url = %configuration.target,
                version = ?client.options.version,
                max_pool_size = client.options.max_pool_size,
                secure = client.options.target.secure,
                proxy = ?client.options.proxy,
                "Created HTTP client"
            );
            counter!(CONNECTOR_CLIENTS_BUILT_TOTAL, "connector" => "http").increment(1);
            Ok(client)
        })
    }

    fn close(&self) -> GatewayResult<()> {
        if let Some(client) = self.client.close() {
            info!(target_url = %client.options.target.url, "Closed HTTP client");
            counter!(CONNECTOR_CLIENTS_CLOSED_TOTAL, "connector" => "http").increment(1);
        }
        Ok(())
    }
}

/// Endpoint invoker calling an HTTP backend
///
/// Without messages the inbound request is proxied and the backend response copied into the
/// exchange response. With messages, each one is published as a `POST` of its content and
/// no response message is produced.
#[derive(Debug)]
pub struct HttpEndpointConnector {
    id: String,
    configuration: HttpEndpointConfiguration,
    factory: HttpClientFactory,
}

impl HttpEndpointConnector {
    pub fn new<S: Into<String>>(id: S, configuration: HttpEndpointConfiguration) -> Self {
        Self {
            id: id.into(),
            configuration,
            factory: HttpClientFactory::new(),
        }
    }

    pub fn configuration(&self) -> &HttpEndpointConfiguration {
        &self.configuration
    }

    pub fn factory(&self) -> &HttpClientFactory {
        &self.factory
    }
}

#[async_trait]
impl EndpointInvoker for HttpEndpointConnector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, messages: Vec<Message>) -> GatewayResult<Vec<Message>> {
        let client = self.factory.get_or_build_client(ctx, &self.configuration)?;
        let path = ctx
            .request()
            .uri
            .path_and_query()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        if messages.is_empty() {
            let request = ctx.request();
            let response = client
                .send(&request.method, &path, &request.headers, request.body.clone())
                .await?;

            let exchange_response = ctx.response_mut();
            exchange_response.status = response.status;
            exchange_response.headers = response.headers;
            exchange_response.body = response.body;
            return Ok(Vec::new());
        }

        for message in messages {
            let response = client
                .send(&Method::POST, &path, message.headers(), message.content().clone())
                .await?;
            if !response.status.is_success() {
                return Err(GatewayError::HttpClient {
                    message: format!("endpoint rejected message {} with status {}", message.id(), response.status),
                });
            }
        }
        Ok(Vec::new())
    }

    async fn close(&self) -> GatewayResult<()> {
        self.factory.close()
    }
}
