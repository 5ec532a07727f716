//! Configuration loading and environment variable handling

use crate::compat;
use crate::domains::HsmLoadConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::presets::Preset;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
///
/// Precedence, lowest first: defaults, config file, preset, legacy
/// environment variables, prefixed environment variables.
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,

    /// Preset applied on top of the file
    preset: Option<Preset>,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "HSM_LOAD".to_string(),
            preset: None,
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            preset: None,
        }
    }

    /// Apply a preset after the file is read
    pub fn preset(mut self, preset: Option<Preset>) -> Self {
        self.preset = preset;
        self
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<HsmLoadConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: HsmLoadConfig = serde_yaml::from_str(&content)?;
        self.finish(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<HsmLoadConfig> {
        self.finish(HsmLoadConfig::default())
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<HsmLoadConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: HsmLoadConfig) -> ConfigResult<HsmLoadConfig> {
        if let Some(preset) = self.preset {
            tracing::debug!("Applying {} preset", preset);
            preset.apply(&mut config);
        }

        compat::apply_legacy_env(&mut config);
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut HsmLoadConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_output_overrides(&mut config.output)?;
        Ok(())
    }

    /// Apply target config overrides
    fn apply_target_overrides(
        &self,
        config: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(context) = self.get_env_var("CONTEXT") {
            config.context = context;
        }

        if let Ok(cert) = self.get_env_var("CLIENT_CERT") {
            config.tls.client_cert = non_empty_path(cert);
        }

        if let Ok(key) = self.get_env_var("CLIENT_KEY") {
            config.tls.client_key = non_empty_path(key);
        }

        if let Ok(ca) = self.get_env_var("CA_CERT") {
            config.tls.ca_cert = non_empty_path(ca);
        }

        if let Ok(insecure) = self.get_env_var("INSECURE_SKIP_VERIFY") {
            config.tls.insecure_skip_verify = insecure.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid INSECURE_SKIP_VERIFY: {}", e))
            })?;
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Apply output config overrides
    fn apply_output_overrides(
        &self,
        config: &mut crate::domains::output::OutputConfig,
    ) -> ConfigResult<()> {
        if let Ok(path) = self.get_env_var("SUMMARY_JSON") {
            config.summary_json = non_empty_path(path);
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

/// An empty value clears an optional path
fn non_empty_path(value: String) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
