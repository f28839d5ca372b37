//! # WebSocket Connector
//!
//! [`WebSocketClientFactory`] lazily builds one [`WebSocketClient`] per factory. The client
//! keeps the resolved options and a ready TLS connector, and opens a new upgraded connection
//! for every exchange.
//!
//! HTTP proxies are crossed with a `CONNECT` tunnel, with basic credentials when configured.
//! SOCKS proxies are rejected when the client is built.
//!
//! ## Rust Concepts Used
//!
//! - `tokio-tungstenite` over a caller-provided `TcpStream` so direct and tunnelled
//!   connections share one handshake path
//! - `native-tls` connector built once and cloned per connection

use http::{HeaderMap, HeaderValue};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::connector::configuration::{ProxyType, WebSocketEndpointConfiguration};
use crate::connector::lazy::LazyClient;
use crate::connector::options::{HttpClientOptions, IdentityOptions, ProxyOptions, TlsOptions};
use crate::connector::proxy::SystemProxySettings;
use crate::connector::ConnectorClientFactory;
use crate::context::execution::ExecutionContext;
use crate::core::error::{GatewayError, GatewayResult};
use crate::observability::metrics::{CONNECTOR_CLIENTS_BUILT_TOTAL, CONNECTOR_CLIENTS_CLOSED_TOTAL};

/// Upgraded connection to the endpoint
pub type WebSocketConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Largest proxy `CONNECT` response head accepted
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// Downstream WebSocket client bound to one endpoint target
pub struct WebSocketClient {
    options: HttpClientOptions,
    subprotocols: Vec<String>,
    tls: Option<native_tls::TlsConnector>,
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("target", &self.options.target.url.as_str())
            .field("subprotocols", &self.subprotocols)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl WebSocketClient {
    pub fn build(options: HttpClientOptions, subprotocols: Vec<String>) -> GatewayResult<Self> {
        if let Some(proxy) = &options.proxy {
            if proxy.proxy_type != ProxyType::Http {
                return Err(GatewayError::connector_build(format!(
                    "{:?} proxies are not supported for WebSocket endpoint {}",
                    proxy.proxy_type, options.target.url
                )));
            }
        }

        let tls = options
            .tls
            .as_ref()
            .map(|tls| tls_connector(tls, options.alpn))
            .transpose()?;

        Ok(Self {
            options,
            subprotocols,
            tls,
        })
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }

    /// Open a connection to `path` on the endpoint target
    pub async fn connect(&self, path: &str, headers: &HeaderMap) -> GatewayResult<WebSocketConnection> {
        let url = self.options.target.resolve(path);
        let mut request = url.as_str().into_client_request()?;

        let request_headers = request.headers_mut();
        for header in &self.options.default_headers {
            if let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(header.name.as_bytes()),
                HeaderValue::from_str(&header.value),
            ) {
                request_headers.insert(name, value);
            }
        }
        for (name, value) in headers {
            if is_handshake_header(name) {
                continue;
            }
            request_headers.insert(name.clone(), value.clone());
        }
        if !self.subprotocols.is_empty() {
            let protocols = HeaderValue::from_str(&self.subprotocols.join(", "))
                .map_err(|error| GatewayError::WebSocket {
                    message: format!("invalid subprotocols: {}", error),
                })?;
            request_headers.insert(http::header::SEC_WEBSOCKET_PROTOCOL, protocols);
        }

        let stream = match &self.options.proxy {
            Some(proxy) => self.tunnel(proxy).await?,
            None => connect_tcp(&self.options.target.authority(), self.options.connect_timeout).await?,
        };

        let connector = match &self.tls {
            Some(tls) => Connector::NativeTls(tls.clone()),
            None => Connector::Plain,
        };

        debug!(url = %url, "Opening WebSocket connection");
        let (connection, _response) = client_async_tls_with_config(request, stream, None, Some(connector)).await?;
        Ok(connection)
    }

    async fn tunnel(&self, proxy: &ProxyOptions) -> GatewayResult<TcpStream> {
        let mut stream = connect_tcp(&format!("{}:{}", proxy.host, proxy.port), self.options.connect_timeout).await?;

        let authority = self.options.target.authority();
        let mut connect = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
        if let Some(authorization) = proxy.basic_authorization() {
            connect.push_str(&format!("Proxy-Authorization: {}\r\n", authorization));
        }
        connect.push_str("\r\n");
        stream.write_all(connect.as_bytes()).await?;

        let head = tokio::time::timeout(self.options.connect_timeout, read_tunnel_head(&mut stream, proxy))
            .await
            .map_err(|_| GatewayError::WebSocket {
                message: format!(
                    "proxy {} did not answer the tunnel request within {:?}",
                    proxy.host, self.options.connect_timeout
                ),
            })??;

        let status_line = String::from_utf8_lossy(&head);
        let status = status_line.split_whitespace().nth(1).unwrap_or_default();
        if status != "200" {
            return Err(GatewayError::WebSocket {
                message: format!("proxy {} refused tunnel to {} with status {}", proxy.host, authority, status),
            });
        }
        Ok(stream)
    }
}

/// Read the proxy response head up to its blank line
///
/// Bytes are read one at a time so nothing past the head is consumed from the tunnel.
async fn read_tunnel_head(stream: &mut TcpStream, proxy: &ProxyOptions) -> GatewayResult<Vec<u8>> {
    let mut head = Vec::with_capacity(256);
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_TUNNEL_RESPONSE {
            return Err(GatewayError::WebSocket {
                message: format!("proxy {} sent an oversized response", proxy.host),
            });
        }
        let mut byte = [0u8; 1];
        if stream.read(&mut byte).await? == 0 {
            return Err(GatewayError::WebSocket {
                message: format!("proxy {} closed the tunnel", proxy.host),
            });
        }
        head.push(byte[0]);
    }
    Ok(head)
}

fn is_handshake_header(name: &http::HeaderName) -> bool {
    [
        http::header::HOST,
        http::header::CONNECTION,
        http::header::UPGRADE,
        http::header::SEC_WEBSOCKET_KEY,
        http::header::SEC_WEBSOCKET_VERSION,
        http::header::SEC_WEBSOCKET_EXTENSIONS,
        http::header::CONTENT_LENGTH,
    ]
    .contains(name)
}

async fn connect_tcp(address: &str, timeout: Duration) -> GatewayResult<TcpStream> {
    tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| GatewayError::WebSocket {
            message: format!("connection to {} timed out after {:?}", address, timeout),
        })?
        .map_err(GatewayError::from)
}

fn tls_connector(tls: &TlsOptions, alpn: bool) -> GatewayResult<native_tls::TlsConnector> {
    let invalid = |what: &str, error: native_tls::Error| GatewayError::connector_build(format!("invalid {}: {}", what, error));

    let mut builder = native_tls::TlsConnector::builder();
    builder
        .danger_accept_invalid_certs(tls.trust_all)
        .danger_accept_invalid_hostnames(tls.trust_all || !tls.verify_host);

    if let Some(trust) = &tls.trust {
        let certificate = native_tls::Certificate::from_pem(&trust.pem).map_err(|error| invalid("trust store", error))?;
        builder.add_root_certificate(certificate);
    }

    if let Some(identity) = &tls.identity {
        let identity = match identity {
            IdentityOptions::Pem { cert, key } => native_tls::Identity::from_pkcs8(cert, key),
            IdentityOptions::Pkcs12 { der, password } => native_tls::Identity::from_pkcs12(der, password),
        }
        .map_err(|error| invalid("key store", error))?;
        builder.identity(identity);
    }

    if alpn {
        builder.request_alpns(&["http/1.1"]);
    }

    builder.build().map_err(|error| invalid("TLS configuration", error))
}

/// Factory owning the WebSocket client of one endpoint
#[derive(Debug, Default)]
pub struct WebSocketClientFactory {
    client: LazyClient<WebSocketClient>,
}

impl WebSocketClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.client.is_built()
    }
}

impl ConnectorClientFactory for WebSocketClientFactory {
    type Client = WebSocketClient;
    type Configuration = WebSocketEndpointConfiguration;

    fn get_or_build_client(
        &self,
        ctx: &ExecutionContext,
        configuration: &WebSocketEndpointConfiguration,
    ) -> GatewayResult<Arc<WebSocketClient>> {
        self.client.get_or_build(|| {
            let options =
                HttpClientOptions::from_configuration(configuration, || SystemProxySettings::lookup(ctx.components()))?;
            let client = WebSocketClient::build(options, configuration.subprotocols.clone())?;

            info!(
                target_url = %configuration.target,
                secure = client.options.target.secure,
                proxy = ?client.options.proxy,
                "Created WebSocket client"
            );
            counter!(CONNECTOR_CLIENTS_BUILT_TOTAL, "connector" => "websocket").increment(1);
            Ok(client)
        })
    }

    fn close(&self) -> GatewayResult<()> {
        if let Some(client) = self.client.close() {
            info!(target_url = %client.options.target.url, "Closed WebSocket client");
            counter!(CONNECTOR_CLIENTS_CLOSED_TOTAL, "connector" => "websocket").increment(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::configuration::ProxyConfiguration;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as Frame;

    fn options(configuration: &WebSocketEndpointConfiguration) -> HttpClientOptions {
        HttpClientOptions::from_configuration(configuration, SystemProxySettings::default).unwrap()
    }

    #[test]
    fn test_socks_proxy_is_rejected() {
        let mut configuration = WebSocketEndpointConfiguration::new("ws://backend/stream");
        configuration.proxy = ProxyConfiguration {
            enabled: true,
            host: Some("proxy.local".to_string()),
            port: Some(1080),
            proxy_type: ProxyType::Socks5,
            ..ProxyConfiguration::default()
        };

        let error = WebSocketClient::build(options(&configuration), Vec::new()).unwrap_err();
        assert!(matches!(error, GatewayError::ConnectorBuild { .. }));
    }

    #[test]
    fn test_secure_target_gets_tls_connector() {
        let configuration = WebSocketEndpointConfiguration::new("wss://backend/stream");
        let client = WebSocketClient::build(options(&configuration), Vec::new()).unwrap();
        assert!(client.tls.is_some());
    }

    fn proxied(address: std::net::SocketAddr, connect_timeout: Duration) -> WebSocketEndpointConfiguration {
        let mut configuration = WebSocketEndpointConfiguration::new("ws://backend.internal:9000/stream");
        configuration.http.connect_timeout = connect_timeout;
        configuration.proxy = ProxyConfiguration {
            enabled: true,
            host: Some(address.ip().to_string()),
            port: Some(address.port()),
            proxy_type: ProxyType::Http,
            ..ProxyConfiguration::default()
        };
        configuration
    }

    #[tokio::test]
    async fn test_silent_proxy_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let configuration = proxied(address, Duration::from_millis(200));
        let client = WebSocketClient::build(options(&configuration), Vec::new()).unwrap();
        let error = client.connect("/", &HeaderMap::new()).await.unwrap_err();

        assert!(matches!(error, GatewayError::WebSocket { ref message } if message.contains("did not answer")));
    }

    #[tokio::test]
    async fn test_refused_tunnel_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 1024];
            let _ = stream.read(&mut buffer).await;
            stream
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let configuration = proxied(address, Duration::from_secs(2));
        let client = WebSocketClient::build(options(&configuration), Vec::new()).unwrap();
        let error = client.connect("/", &HeaderMap::new()).await.unwrap_err();

        assert!(matches!(error, GatewayError::WebSocket { ref message } if message.contains("407")));
    }

    #[tokio::test]
    async fn test_tunnel_head_leaves_following_bytes_unread() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\nearly")
                .await
                .unwrap();
        });

        let proxy = ProxyOptions {
            proxy_type: ProxyType::Http,
            host: address.ip().to_string(),
            port: address.port(),
            username: None,
            password: None,
        };
        let mut stream = TcpStream::connect(address).await.unwrap();
        let head = read_tunnel_head(&mut stream, &proxy).await.unwrap();
        assert!(head.starts_with(b"HTTP/1.1 200"));

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"early");
    }

    #[tokio::test]
    async fn test_connect_and_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            if let Some(Ok(frame)) = socket.next().await {
                socket.send(frame).await.unwrap();
            }
        });

        let configuration = WebSocketEndpointConfiguration::new(format!("ws://{}", address));
        let client = WebSocketClient::build(options(&configuration), Vec::new()).unwrap();
        let mut connection = client.connect("/echo", &HeaderMap::new()).await.unwrap();

        connection.send(Frame::Text("hello".to_string())).await.unwrap();
        let echoed = connection.next().await.unwrap().unwrap();
        assert_eq!(echoed, Frame::Text("hello".to_string()));
    }
}
