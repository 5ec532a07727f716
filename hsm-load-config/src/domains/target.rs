//! Target service configuration: where to send requests and how to authenticate

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Encryption service under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL, e.g. `https://localhost:8443`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Authorization context sent with every encrypt and decrypt request
    #[serde(default = "default_context")]
    pub context: String,

    /// Mutual TLS material
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Client identity and trust settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM client certificate
    pub client_cert: Option<PathBuf>,

    /// PEM private key for `client_cert`
    pub client_key: Option<PathBuf>,

    /// Additional PEM root certificate to trust
    pub ca_cert: Option<PathBuf>,

    /// Accept any server certificate
    #[serde(default = "crate::domains::utils::default_true")]
    pub insecure_skip_verify: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            context: default_context(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            client_cert: Some(PathBuf::from("pki/client/hsm-trading-client-1.crt")),
            client_key: Some(PathBuf::from("pki/client/hsm-trading-client-1.key")),
            ca_cert: None,
            insecure_skip_verify: true,
        }
    }
}

impl TlsConfig {
    /// Whether a client identity is configured
    pub fn has_identity(&self) -> bool {
        self.client_cert.is_some() && self.client_key.is_some()
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_http_url(&self.base_url, "base_url", self.domain_name())?;
        validate_required_string(&self.context, "context", self.domain_name())?;
        self.tls.validate()?;

        if self.base_url.starts_with("http://") && self.tls.has_identity() {
            tracing::debug!("client identity configured for plain http target; it will not be presented");
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

impl Validatable for TlsConfig {
    fn validate(&self) -> ConfigResult<()> {
        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => Err(self.validation_error("client_cert is set but client_key is missing")),
            (None, Some(_)) => Err(self.validation_error("client_key is set but client_cert is missing")),
            _ => Ok(()),
        }
    }

    fn domain_name(&self) -> &'static str {
        "target.tls"
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://localhost:8443".to_string()
}

fn default_context() -> String {
    "exchange-key".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.base_url, "https://localhost:8443");
        assert_eq!(config.context, "exchange-key");
        assert!(config.tls.insecure_skip_verify);
        assert!(config.tls.has_identity());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cert_without_key_is_rejected() {
        let mut config = TargetConfig::default();
        config.tls.client_key = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target.tls"));

        config.tls.client_cert = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_context_is_rejected() {
        let config = TargetConfig {
            context: String::new(),
            ..TargetConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
