//! HTTP client configuration

use crate::errors::HttpError;
use hsm_load_config::{HsmLoadConfig, HttpConfig as ConfigHttpConfig, TargetConfig};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Everything needed to build a client for one target
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL; always ends with `/` so endpoint paths join under it
    pub base_url: Url,

    /// Per-request timeout
    pub timeout: Duration,

    pub connect_timeout: Duration,

    pub user_agent: String,

    pub pool_max_idle_per_host: usize,

    pub pool_idle_timeout: Duration,

    pub tls: ClientTls,
}

/// Mutual TLS material for the client
#[derive(Debug, Clone, Default)]
pub struct ClientTls {
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

impl ClientConfig {
    /// Client settings for `base_url` with default timeouts and no TLS identity
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        let http = ConfigHttpConfig::default();
        Ok(Self {
            base_url: normalize_base(base_url)?,
            timeout: http.timeout,
            connect_timeout: http.connection_pool.connection_timeout,
            user_agent: http.user_agent,
            pool_max_idle_per_host: http.connection_pool.max_idle_per_host,
            pool_idle_timeout: http.connection_pool.idle_timeout,
            tls: ClientTls::default(),
        })
    }

    pub fn from_domains(target: &TargetConfig, http: &ConfigHttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            base_url: normalize_base(&target.base_url)?,
            timeout: http.timeout,
            connect_timeout: http.connection_pool.connection_timeout,
            user_agent: http.user_agent.clone(),
            pool_max_idle_per_host: http.connection_pool.max_idle_per_host,
            pool_idle_timeout: http.connection_pool.idle_timeout,
            tls: ClientTls {
                client_cert: target.tls.client_cert.clone(),
                client_key: target.tls.client_key.clone(),
                ca_cert: target.tls.ca_cert.clone(),
                insecure_skip_verify: target.tls.insecure_skip_verify,
            },
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of an endpoint path under the base
    pub fn endpoint_url(&self, path: &str) -> Result<Url, HttpError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

impl TryFrom<&HsmLoadConfig> for ClientConfig {
    type Error = HttpError;

    fn try_from(config: &HsmLoadConfig) -> Result<Self, Self::Error> {
        Self::from_domains(&config.target, &config.http)
    }
}

fn normalize_base(base_url: &str) -> Result<Url, HttpError> {
    let mut url = Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
