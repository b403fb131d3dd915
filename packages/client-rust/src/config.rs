//! Configuration for wiring a [`ServiceProxy`] over HTTP.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;
use wsproxy_core::{
    CredentialHeaderBuilder, Credentials, NonceEncoding, PasswordMode, RegistryError,
    ServiceRegistry,
};

use crate::cache::ConnectionCache;
use crate::http::HttpTransportFactory;
use crate::proxy::ServiceProxy;

/// Everything needed to build an HTTP-backed dispatcher.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub credentials: Credentials,
    /// Password profile for services that require authentication.
    pub password_mode: PasswordMode,
    pub nonce_encoding: NonceEncoding,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// JSON registry file. `None` uses the compiled-in table.
    pub registry_path: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            password_mode: PasswordMode::Digest,
            nonce_encoding: NonceEncoding::LegacyDecimalHex,
            request_timeout: Duration::from_secs(30),
            registry_path: None,
        }
    }
}

/// Errors raised while turning a [`ProxyConfig`] into a dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("cannot initialise HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProxyConfig {
    /// Loads the registry named by `registry_path`, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Registry` if its content is
    /// invalid.
    pub fn load_registry(&self) -> Result<ServiceRegistry, ConfigError> {
        let Some(path) = &self.registry_path else {
            return Ok(ServiceRegistry::builtin());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let registry = ServiceRegistry::from_json_str(&text)?;
        info!(path = %path.display(), services = registry.len(), "registry loaded");
        Ok(registry)
    }
}

impl ServiceProxy<HttpTransportFactory> {
    /// Builds an HTTP-backed dispatcher from `config`.
    ///
    /// # Errors
    ///
    /// Propagates registry loading and HTTP client construction failures.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let registry = config.load_registry()?;
        let factory = HttpTransportFactory::new(config.request_timeout)?;
        let headers = CredentialHeaderBuilder::new().nonce_encoding(config.nonce_encoding);
        let cache = ConnectionCache::new(factory, headers).with_password_mode(config.password_mode);
        Ok(Self::with_cache(config.credentials.clone(), registry, cache))
    }
}
