//! System proxy settings shared by every endpoint that opts into `useSystemProxy`.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::connector::configuration::{ProxyConfiguration, ProxyType};
use crate::connector::options::ProxyOptions;
use crate::context::components::ComponentRegistry;
use crate::core::error::{GatewayError, GatewayResult};

pub const ENV_SYSTEM_PROXY_HOST: &str = "GATEWAY_SYSTEM_PROXY_HOST";
pub const ENV_SYSTEM_PROXY_PORT: &str = "GATEWAY_SYSTEM_PROXY_PORT";
pub const ENV_SYSTEM_PROXY_TYPE: &str = "GATEWAY_SYSTEM_PROXY_TYPE";
pub const ENV_SYSTEM_PROXY_USERNAME: &str = "GATEWAY_SYSTEM_PROXY_USERNAME";
pub const ENV_SYSTEM_PROXY_PASSWORD: &str = "GATEWAY_SYSTEM_PROXY_PASSWORD";

/// Raw system proxy properties
///
/// Values are kept as strings, exactly as configured, and only validated when an endpoint
/// actually asks for the system proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemProxySettings {
    pub host: Option<String>,
    pub port: Option<String>,
    #[serde(rename = "type")]
    pub proxy_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SystemProxySettings {
    /// Read the settings from `GATEWAY_SYSTEM_PROXY_*` environment variables
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Replace every property that has an environment variable set
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            (ENV_SYSTEM_PROXY_HOST, &mut self.host),
            (ENV_SYSTEM_PROXY_PORT, &mut self.port),
            (ENV_SYSTEM_PROXY_TYPE, &mut self.proxy_type),
            (ENV_SYSTEM_PROXY_USERNAME, &mut self.username),
            (ENV_SYSTEM_PROXY_PASSWORD, &mut self.password),
        ];
        for (name, field) in overrides {
            if let Ok(value) = env::var(name) {
                *field = Some(value);
            }
        }
    }

    /// Settings registered as a component, falling back to the environment
    pub fn lookup(components: &ComponentRegistry) -> Self {
        components
            .get::<SystemProxySettings>()
            .map(|settings| settings.as_ref().clone())
            .unwrap_or_else(Self::from_env)
    }

    /// Validate the properties into proxy options
    ///
    /// The error lists every missing or malformed property.
    pub fn to_proxy_options(&self) -> GatewayResult<ProxyOptions> {
        let mut errors = Vec::new();

        let host = self.host.clone().filter(|host| !host.trim().is_empty());
        if host.is_none() {
            errors.push("'host'".to_string());
        }

        let port = self.port.as_deref().and_then(|port| port.trim().parse::<u16>().ok());
        if port.is_none() {
            errors.push(format!("'port' [{}]", self.port.as_deref().unwrap_or_default()));
        }

        let proxy_type = self
            .proxy_type
            .as_deref()
            .and_then(|proxy_type| proxy_type.parse::<ProxyType>().ok());
        if proxy_type.is_none() {
            errors.push(format!("'type' [{}]", self.proxy_type.as_deref().unwrap_or_default()));
        }

        match (host, port, proxy_type) {
            (Some(host), Some(port), Some(proxy_type)) => Ok(ProxyOptions {
                proxy_type,
                host,
                port,
                username: self.username.clone(),
                password: self.password.clone(),
            }),
            _ => Err(GatewayError::config(format!(
                "system proxy is missing or has malformed properties: {}",
                errors.join(" ")
            ))),
        }
    }
}

/// Proxy options an endpoint should use, if any
///
/// A malformed system proxy is logged and ignored: the endpoint is then called directly.
/// Explicit proxy settings without a host or port are a build error.
pub fn resolve_proxy(
    target: &str,
    proxy: &ProxyConfiguration,
    system: impl FnOnce() -> SystemProxySettings,
) -> GatewayResult<Option<ProxyOptions>> {
    if !proxy.enabled {
        return Ok(None);
    }

    if proxy.use_system_proxy {
        return match system().to_proxy_options() {
            Ok(options) => Ok(Some(options)),
            Err(error) => {
                warn!(target_url = %target, error = %error, "Endpoint requires a system proxy, ignoring it");
                Ok(None)
            }
        };
    }

    let host = proxy
        .host
        .clone()
        .filter(|host| !host.trim().is_empty())
        .ok_or_else(|| GatewayError::connector_build(format!("proxy host is missing for endpoint {}", target)))?;
    let port = proxy
        .port
        .ok_or_else(|| GatewayError::connector_build(format!("proxy port is missing for endpoint {}", target)))?;

    Ok(Some(ProxyOptions {
        proxy_type: proxy.proxy_type,
        host,
        port,
        username: proxy.username.clone(),
        password: proxy.password.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> SystemProxySettings {
        SystemProxySettings {
            host: Some("proxy.local".to_string()),
            port: Some("3128".to_string()),
            proxy_type: Some("HTTP".to_string()),
            username: Some("user".to_string()),
            password: None,
        }
    }

    #[test]
    fn test_valid_system_proxy() {
        let options = system().to_proxy_options().unwrap();
        assert_eq!(options.host, "proxy.local");
        assert_eq!(options.port, 3128);
        assert_eq!(options.proxy_type, ProxyType::Http);
        assert_eq!(options.username.as_deref(), Some("user"));
    }

    #[test]
    fn test_malformed_system_proxy_lists_every_problem() {
        let settings = SystemProxySettings {
            port: Some("eighty".to_string()),
            proxy_type: Some("FTP".to_string()),
            ..system()
        };
        let message = settings.to_proxy_options().unwrap_err().to_string();
        assert!(message.contains("'port' [eighty]"));
        assert!(message.contains("'type' [FTP]"));
    }

    #[test]
    fn test_malformed_system_proxy_is_ignored() {
        let proxy = ProxyConfiguration {
            enabled: true,
            use_system_proxy: true,
            ..ProxyConfiguration::default()
        };
        let resolved = resolve_proxy("http://backend", &proxy, SystemProxySettings::default).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_explicit_proxy_requires_host_and_port() {
        let proxy = ProxyConfiguration {
            enabled: true,
            host: Some("proxy.local".to_string()),
            ..ProxyConfiguration::default()
        };
        assert!(resolve_proxy("http://backend", &proxy, system).is_err());

        let proxy = ProxyConfiguration {
            port: Some(8080),
            ..proxy
        };
        let options = resolve_proxy("http://backend", &proxy, system).unwrap().unwrap();
        assert_eq!(options.port, 8080);
    }

    #[test]
    fn test_disabled_proxy() {
        let proxy = ProxyConfiguration {
            use_system_proxy: true,
            ..ProxyConfiguration::default()
        };
        assert!(resolve_proxy("http://backend", &proxy, system).unwrap().is_none());
    }

    #[test]
    fn test_registered_settings_win_over_environment() {
        let components = ComponentRegistry::new();
        components.register(std::sync::Arc::new(system()));
        assert_eq!(SystemProxySettings::lookup(&components), system());
    }
}
