//! # Endpoint Configuration
//!
//! Declarative settings of a downstream endpoint, as found in an API definition. They are
//! translated once into [`HttpClientOptions`](super::options::HttpClientOptions) when the
//! connector client is first built.
//!
//! Every section is `#[serde(default)]` so a definition only states what differs from the
//! defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP protocol spoken with the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpProtocolVersion {
    #[default]
    #[serde(rename = "HTTP_1_1")]
    Http11,
    #[serde(rename = "HTTP_2")]
    Http2,
}

/// Connection pooling, timeout and compression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpClientSettings {
    pub version: HttpProtocolVersion,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    pub keep_alive: bool,
    pub pipelining: bool,
    pub max_concurrent_connections: usize,
    pub use_compression: bool,
    pub follow_redirects: bool,

    /// Negotiate HTTP/2 over cleartext connections instead of assuming prior knowledge
    pub clear_text_upgrade: bool,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            version: HttpProtocolVersion::Http11,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            keep_alive: true,
            pipelining: false,
            max_concurrent_connections: 100,
            use_compression: true,
            follow_redirects: false,
            clear_text_upgrade: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyType {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// URL scheme understood by proxy-aware clients
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Socks4 => "socks4",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl std::str::FromStr for ProxyType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HTTP" => Ok(ProxyType::Http),
            "SOCKS4" => Ok(ProxyType::Socks4),
            "SOCKS5" => Ok(ProxyType::Socks5),
            other => Err(format!("unknown proxy type '{}'", other)),
        }
    }
}

/// Proxy the endpoint is reached through
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfiguration {
    pub enabled: bool,

    /// Use the gateway-wide system proxy instead of the settings below
    pub use_system_proxy: bool,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
}

/// Certificates the client trusts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum TrustStore {
    Pem {
        path: Option<String>,
        content: Option<String>,
    },
    Pkcs12 {
        path: Option<String>,
        content: Option<String>,
        password: Option<String>,
    },
    Jks {
        path: Option<String>,
        content: Option<String>,
        password: Option<String>,
    },
}

/// Client certificate presented to the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum KeyStore {
    #[serde(rename_all = "camelCase")]
    Pem {
        cert_path: Option<String>,
        cert_content: Option<String>,
        key_path: Option<String>,
        key_content: Option<String>,
    },
    Pkcs12 {
        path: Option<String>,
        /// Base64 encoded archive
        content: Option<String>,
        password: Option<String>,
    },
    Jks {
        path: Option<String>,
        content: Option<String>,
        password: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SslConfiguration {
    pub hostname_verifier: bool,
    pub trust_all: bool,
    pub trust_store: Option<TrustStore>,
    pub key_store: Option<KeyStore>,
}

impl Default for SslConfiguration {
    fn default() -> Self {
        Self {
            hostname_verifier: true,
            trust_all: false,
            trust_store: None,
            key_store: None,
        }
    }
}

/// Static header added to every call to the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Parts of an endpoint definition shared by every connector flavour
pub trait EndpointConfiguration {
    fn target(&self) -> &str;
    fn http(&self) -> &HttpClientSettings;
    fn proxy(&self) -> &ProxyConfiguration;
    fn ssl(&self) -> &SslConfiguration;
    fn headers(&self) -> &[HttpHeader];
}

/// HTTP endpoint definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpEndpointConfiguration {
    /// Absolute target URL, e.g. `https://backend:8443/api`
    pub target: String,
    #[serde(rename = "httpOptions")]
    pub http: HttpClientSettings,
    #[serde(rename = "httpProxy")]
    pub proxy: ProxyConfiguration,
    #[serde(rename = "httpClientSslOptions")]
    pub ssl: SslConfiguration,
    pub headers: Vec<HttpHeader>,
}

impl HttpEndpointConfiguration {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }
}

impl EndpointConfiguration for HttpEndpointConfiguration {
    fn target(&self) -> &str {
        &self.target
    }

    fn http(&self) -> &HttpClientSettings {
        &self.http
    }

    fn proxy(&self) -> &ProxyConfiguration {
        &self.proxy
    }

    fn ssl(&self) -> &SslConfiguration {
        &self.ssl
    }

    fn headers(&self) -> &[HttpHeader] {
        &self.headers
    }
}

/// WebSocket endpoint definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSocketEndpointConfiguration {
    /// Absolute target URL, e.g. `wss://backend/stream`
    pub target: String,
    #[serde(rename = "httpOptions")]
    pub http: HttpClientSettings,
    #[serde(rename = "httpProxy")]
    pub proxy: ProxyConfiguration,
    #[serde(rename = "httpClientSslOptions")]
    pub ssl: SslConfiguration,
    pub headers: Vec<HttpHeader>,
    pub subprotocols: Vec<String>,
}

impl WebSocketEndpointConfiguration {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }
}

impl EndpointConfiguration for WebSocketEndpointConfiguration {
    fn target(&self) -> &str {
        &self.target
    }

    fn http(&self) -> &HttpClientSettings {
        &self.http
    }

    fn proxy(&self) -> &ProxyConfiguration {
        &self.proxy
    }

    fn ssl(&self) -> &SslConfiguration {
        &self.ssl
    }

    fn headers(&self) -> &[HttpHeader] {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_configuration_from_yaml() {
        let yaml = r#"
target: https://backend.local:8443/api
httpOptions:
  version: HTTP_2
  connectTimeout: 2s
  maxConcurrentConnections: 20
httpProxy:
  enabled: true
  host: proxy.local
  port: 3128
  type: SOCKS5
httpClientSslOptions:
  trustAll: true
  trustStore:
    type: PEM
    content: "-----BEGIN CERTIFICATE-----"
headers:
  - name: X-Gateway
    value: reactive
"#;
        let config: HttpEndpointConfiguration = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.http.version, HttpProtocolVersion::Http2);
        assert_eq!(config.http.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.http.max_concurrent_connections, 20);
        assert!(config.http.keep_alive);
        assert_eq!(config.proxy.proxy_type, ProxyType::Socks5);
        assert_eq!(config.proxy.port, Some(3128));
        assert!(config.ssl.trust_all);
        assert!(config.ssl.hostname_verifier);
        assert!(matches!(config.ssl.trust_store, Some(TrustStore::Pem { .. })));
        assert_eq!(config.headers().len(), 1);
    }

    #[test]
    fn test_proxy_type_parsing() {
        assert_eq!("socks4".parse::<ProxyType>().unwrap(), ProxyType::Socks4);
        assert_eq!("HTTP".parse::<ProxyType>().unwrap(), ProxyType::Http);
        assert!("ftp".parse::<ProxyType>().is_err());
    }
}
