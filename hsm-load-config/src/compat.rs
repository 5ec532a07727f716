//! Compatibility with the unprefixed environment variables of the older
//! load-test scripts
//!
//! `HSM_URL`, `CLIENT_CERT` and `CLIENT_KEY` are still honoured. They are
//! applied before the `HSM_LOAD_*` overrides, so the prefixed form always
//! wins when both are set.

use crate::domains::HsmLoadConfig;
use std::path::PathBuf;

/// Legacy variable names and the setting each maps to
pub const LEGACY_VARS: &[(&str, &str)] = &[
    ("HSM_URL", "target.base_url"),
    ("CLIENT_CERT", "target.tls.client_cert"),
    ("CLIENT_KEY", "target.tls.client_key"),
];

/// Copy any legacy variables that are set into `config`
pub fn apply_legacy_env(config: &mut HsmLoadConfig) {
    if let Some(url) = legacy_var("HSM_URL") {
        config.target.base_url = url;
    }
    if let Some(cert) = legacy_var("CLIENT_CERT") {
        config.target.tls.client_cert = Some(PathBuf::from(cert));
    }
    if let Some(key) = legacy_var("CLIENT_KEY") {
        config.target.tls.client_key = Some(PathBuf::from(key));
    }
}

fn legacy_var(name: &str) -> Option<String> {
    let value = std::env::var(name).ok().filter(|value| !value.is_empty())?;
    tracing::debug!("Using legacy environment variable {}", name);
    Some(value)
}
