//! # Client Options
//!
//! Translation of a declarative endpoint configuration into transport-level client options.
//! The translation is pure apart from reading certificate files, and runs once per client
//! construction.
//!
//! ## Rules
//!
//! - the target URL is parsed once into scheme, host and port
//! - a scheme is secure when it ends with `s` and is longer than two characters
//!   (`https`, `wss`)
//! - the default port is 443 for secure schemes and 80 otherwise, used only when the URL
//!   has no explicit port
//! - ALPN is always enabled on secure targets
//! - HTTP/2 switches the pool to a single multiplexed connection per host
//! - TLS stores are only read for secure targets

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::connector::configuration::{
    EndpointConfiguration, HttpHeader, HttpProtocolVersion, KeyStore, ProxyType, SslConfiguration, TrustStore,
};
use crate::connector::proxy::{resolve_proxy, SystemProxySettings};
use crate::core::error::{GatewayError, GatewayResult};

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Pool size used when HTTP/2 multiplexes every request over one connection per host
pub const HTTP2_MAX_POOL_SIZE: usize = 1;

/// Whether `scheme` designates a TLS transport
pub fn is_secure_scheme(scheme: &str) -> bool {
    scheme.len() > 2 && scheme.ends_with('s')
}

/// Parsed endpoint target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAddress {
    pub url: Url,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl TargetAddress {
    pub fn parse(target: &str) -> GatewayResult<Self> {
        let url = Url::parse(target)
            .map_err(|error| GatewayError::connector_build(format!("invalid endpoint target '{}': {}", target, error)))?;

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| GatewayError::connector_build(format!("endpoint target '{}' has no host", target)))?
            .to_string();

        let scheme = url.scheme().to_ascii_lowercase();
        let secure = is_secure_scheme(&scheme);
        let port = url
            .port()
            .unwrap_or(if secure { DEFAULT_HTTPS_PORT } else { DEFAULT_HTTP_PORT });

        Ok(Self {
            url,
            scheme,
            host,
            port,
            secure,
        })
    }

    /// `host:port` authority
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute URL of `path` on this target
    ///
    /// The target path is kept as a prefix and the query of `path`, if any, is preserved.
    pub fn resolve(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        let prefix = self.url.path().trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        let joined = if !suffix.is_empty() {
            format!("{}/{}", prefix, suffix)
        } else if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        };
        url.set_path(&joined);
        if query.is_some() {
            url.set_query(query);
        }
        url
    }
}

/// Resolved proxy
#[derive(Clone, PartialEq)]
pub struct ProxyOptions {
    pub proxy_type: ProxyType,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyOptions {
    /// Proxy URL, without credentials
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.proxy_type.scheme(), self.host, self.port)
    }

    /// `Proxy-Authorization` value for HTTP proxies with credentials
    pub fn basic_authorization(&self) -> Option<String> {
        let username = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or_default();
        Some(format!("Basic {}", BASE64.encode(format!("{}:{}", username, password))))
    }
}

impl fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("proxy_type", &self.proxy_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish()
    }
}

/// Certificates to trust, PEM encoded
#[derive(Debug, Clone, PartialEq)]
pub struct TrustOptions {
    pub pem: Vec<u8>,
}

/// Client identity presented during the handshake
#[derive(Clone, PartialEq)]
pub enum IdentityOptions {
    Pem { cert: Vec<u8>, key: Vec<u8> },
    Pkcs12 { der: Vec<u8>, password: String },
}

impl fmt::Debug for IdentityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityOptions::Pem { .. } => f.write_str("IdentityOptions::Pem"),
            IdentityOptions::Pkcs12 { .. } => f.write_str("IdentityOptions::Pkcs12"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsOptions {
    pub verify_host: bool,
    pub trust_all: bool,
    pub trust: Option<TrustOptions>,
    pub identity: Option<IdentityOptions>,
}

impl TlsOptions {
    fn from_configuration(target: &str, ssl: &SslConfiguration) -> GatewayResult<Self> {
        let trust = match (&ssl.trust_store, ssl.trust_all) {
            (Some(store), false) => Some(trust_options(target, store)?),
            _ => None,
        };
        let identity = ssl
            .key_store
            .as_ref()
            .map(|store| identity_options(target, store))
            .transpose()?;

        Ok(Self {
            verify_host: ssl.hostname_verifier,
            trust_all: ssl.trust_all,
            trust,
            identity,
        })
    }
}

/// Transport options of a connector client
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientOptions {
    pub target: TargetAddress,
    pub version: HttpProtocolVersion,
    pub http2_multiplexing: bool,
    pub http2_prior_knowledge: bool,
    pub max_pool_size: usize,
    pub keep_alive: bool,
    pub pipelining: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    pub compression: bool,
    pub follow_redirects: bool,
    pub alpn: bool,
    pub proxy: Option<ProxyOptions>,
    pub tls: Option<TlsOptions>,
    pub default_headers: Vec<HttpHeader>,
}

impl HttpClientOptions {
    /// Build options for `config`, reading the system proxy through `system_proxy` only
    /// when the endpoint asks for it
    pub fn from_configuration<C>(config: &C, system_proxy: impl FnOnce() -> SystemProxySettings) -> GatewayResult<Self>
    where
        C: EndpointConfiguration + ?Sized,
    {
        let target = TargetAddress::parse(config.target())?;
        let http = config.http();
        let http2 = http.version == HttpProtocolVersion::Http2;

        let tls = if target.secure {
            Some(TlsOptions::from_configuration(config.target(), config.ssl())?)
        } else {
            None
        };

        Ok(Self {
            version: http.version,
            http2_multiplexing: http2,
            http2_prior_knowledge: http2 && !target.secure && !http.clear_text_upgrade,
            max_pool_size: if http2 { HTTP2_MAX_POOL_SIZE } else { http.max_concurrent_connections },
            keep_alive: http.keep_alive,
            pipelining: http.pipelining && !http2,
            connect_timeout: http.connect_timeout,
            read_timeout: http.read_timeout,
            idle_timeout: http.idle_timeout,
            compression: http.use_compression,
            follow_redirects: http.follow_redirects,
            alpn: target.secure,
            proxy: resolve_proxy(config.target(), config.proxy(), system_proxy)?,
            tls,
            default_headers: config.headers().to_vec(),
            target,
        })
    }
}

fn read_store(target: &str, kind: &str, path: Option<&str>, content: Option<&str>) -> GatewayResult<Vec<u8>> {
    if let Some(path) = path.filter(|path| !path.is_empty()) {
        return std::fs::read(path).map_err(|error| {
            GatewayError::connector_build(format!("unable to read {} store '{}' for endpoint {}: {}", kind, path, target, error))
        });
    }
    match content.filter(|content| !content.is_empty()) {
        Some(content) => Ok(content.as_bytes().to_vec()),
        None => Err(GatewayError::connector_build(format!(
            "Missing {} certificate value for endpoint {}",
            kind, target
        ))),
    }
}

fn read_pkcs12(target: &str, path: Option<&str>, content: Option<&str>) -> GatewayResult<Vec<u8>> {
    if let Some(path) = path.filter(|path| !path.is_empty()) {
        return read_store(target, "PKCS12", Some(path), None);
    }
    let encoded = read_store(target, "PKCS12", None, content)?;
    BASE64
        .decode(encoded)
        .map_err(|error| GatewayError::connector_build(format!("invalid PKCS12 content for endpoint {}: {}", target, error)))
}

fn trust_options(target: &str, store: &TrustStore) -> GatewayResult<TrustOptions> {
    match store {
        TrustStore::Pem { path, content } => Ok(TrustOptions {
            pem: read_store(target, "PEM", path.as_deref(), content.as_deref())?,
        }),
        TrustStore::Pkcs12 { .. } => Err(GatewayError::connector_build(format!(
            "PKCS12 trust stores are not supported, use PEM for endpoint {}",
            target
        ))),
        TrustStore::Jks { .. } => Err(GatewayError::connector_build(format!(
            "JKS trust stores are not supported, use PEM for endpoint {}",
            target
        ))),
    }
}

fn identity_options(target: &str, store: &KeyStore) -> GatewayResult<IdentityOptions> {
    match store {
        KeyStore::Pem {
            cert_path,
            cert_content,
            key_path,
            key_content,
        } => Ok(IdentityOptions::Pem {
            cert: read_store(target, "PEM", cert_path.as_deref(), cert_content.as_deref())?,
            key: read_store(target, "PEM key", key_path.as_deref(), key_content.as_deref())?,
        }),
        KeyStore::Pkcs12 { path, content, password } => Ok(IdentityOptions::Pkcs12 {
            der: read_pkcs12(target, path.as_deref(), content.as_deref())?,
            password: password.clone().unwrap_or_default(),
        }),
        KeyStore::Jks { .. } => Err(GatewayError::connector_build(format!(
            "JKS key stores are not supported, use PEM or PKCS12 for endpoint {}",
            target
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::configuration::{HttpEndpointConfiguration, ProxyConfiguration};
    use std::io::Write;

    fn options(config: &HttpEndpointConfiguration) -> GatewayResult<HttpClientOptions> {
        HttpClientOptions::from_configuration(config, SystemProxySettings::default)
    }

    #[test]
    fn test_secure_scheme_detection() {
        assert!(is_secure_scheme("https"));
        assert!(is_secure_scheme("wss"));
        assert!(!is_secure_scheme("http"));
        assert!(!is_secure_scheme("ws"));
        assert!(!is_secure_scheme("s"));
        assert!(!is_secure_scheme("ss"));
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(TargetAddress::parse("https://backend/api").unwrap().port, 443);
        assert_eq!(TargetAddress::parse("http://backend/api").unwrap().port, 80);
        assert_eq!(TargetAddress::parse("wss://backend").unwrap().port, 443);
        assert_eq!(TargetAddress::parse("https://backend:8443").unwrap().port, 8443);
    }

    #[test]
    fn test_malformed_target_is_a_build_error() {
        let error = TargetAddress::parse("not a url").unwrap_err();
        assert!(matches!(error, GatewayError::ConnectorBuild { .. }));
    }

    #[test]
    fn test_resolve_keeps_target_prefix() {
        let target = TargetAddress::parse("http://backend:8080/api/").unwrap();
        assert_eq!(target.resolve("/users?page=2").as_str(), "http://backend:8080/api/users?page=2");
        assert_eq!(target.resolve("/").as_str(), "http://backend:8080/api");

        let root = TargetAddress::parse("http://backend").unwrap();
        assert_eq!(root.resolve("").as_str(), "http://backend/");
    }

    #[test]
    fn test_secure_target_enables_alpn() {
        let secure = options(&HttpEndpointConfiguration::new("https://backend")).unwrap();
        assert!(secure.alpn);
        assert!(secure.tls.is_some());

        let plain = options(&HttpEndpointConfiguration::new("http://backend")).unwrap();
        assert!(!plain.alpn);
        assert!(plain.tls.is_none());
    }

    #[test]
    fn test_http2_switches_pool_options() {
        let mut config = HttpEndpointConfiguration::new("http://backend");
        config.http.version = HttpProtocolVersion::Http2;
        config.http.pipelining = true;
        config.http.clear_text_upgrade = false;

        let options = options(&config).unwrap();
        assert!(options.http2_multiplexing);
        assert!(options.http2_prior_knowledge);
        assert!(!options.pipelining);
        assert_eq!(options.max_pool_size, HTTP2_MAX_POOL_SIZE);
    }

    #[test]
    fn test_missing_pem_value() {
        let mut config = HttpEndpointConfiguration::new("https://backend");
        config.ssl.trust_store = Some(TrustStore::Pem {
            path: None,
            content: None,
        });

        let message = options(&config).unwrap_err().to_string();
        assert!(message.contains("Missing PEM certificate value"));
    }

    #[test]
    fn test_trust_all_skips_trust_store() {
        let mut config = HttpEndpointConfiguration::new("https://backend");
        config.ssl.trust_all = true;
        config.ssl.trust_store = Some(TrustStore::Jks {
            path: None,
            content: None,
            password: None,
        });

        let tls = options(&config).unwrap().tls.unwrap();
        assert!(tls.trust_all);
        assert!(tls.trust.is_none());
    }

    #[test]
    fn test_pem_trust_store_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----").unwrap();

        let mut config = HttpEndpointConfiguration::new("https://backend");
        config.ssl.trust_store = Some(TrustStore::Pem {
            path: Some(file.path().to_string_lossy().into_owned()),
            content: None,
        });

        let tls = options(&config).unwrap().tls.unwrap();
        assert_eq!(tls.trust.unwrap().pem, b"-----BEGIN CERTIFICATE-----".to_vec());
    }

    #[test]
    fn test_tls_ignored_for_plain_targets() {
        let mut config = HttpEndpointConfiguration::new("http://backend");
        config.ssl.trust_store = Some(TrustStore::Pem {
            path: None,
            content: None,
        });
        assert!(options(&config).is_ok());
    }

    #[test]
    fn test_explicit_proxy() {
        let mut config = HttpEndpointConfiguration::new("http://backend");
        config.proxy = ProxyConfiguration {
            enabled: true,
            host: Some("proxy.local".to_string()),
            port: Some(3128),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            ..ProxyConfiguration::default()
        };

        let proxy = options(&config).unwrap().proxy.unwrap();
        assert_eq!(proxy.url(), "http://proxy.local:3128");
        assert_eq!(proxy.basic_authorization().unwrap(), "Basic dXNlcjpzZWNyZXQ=");
    }
}
