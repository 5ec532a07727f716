//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod output;
pub mod scenario;
pub mod target;
pub mod thresholds;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requests in the longest cycle: encrypt, decrypt and a health probe
const REQUESTS_PER_CYCLE: u32 = 3;

/// Slack for the cycle's own work on top of its request timeouts
pub const GRACEFUL_STOP_MARGIN: Duration = Duration::from_secs(1);

/// Main hsm-load configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HsmLoadConfig {
    /// Service under test
    #[serde(default)]
    pub target: target::TargetConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Ramp profile and request mix
    #[serde(default)]
    pub scenario: scenario::ScenarioConfig,

    /// Pass/fail thresholds
    #[serde(default)]
    pub thresholds: thresholds::ThresholdsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Summary output configuration
    #[serde(default)]
    pub output: output::OutputConfig,
}

impl HsmLoadConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.http.validate()?;
        self.scenario.validate()?;
        self.validate_graceful_stop()?;
        self.thresholds.validate()?;
        self.logging.validate()?;
        self.output.validate()?;
        Ok(())
    }

    /// Shortest graceful stop that outlasts every request of one cycle
    pub fn min_graceful_stop(&self) -> Duration {
        self.http
            .timeout
            .checked_mul(REQUESTS_PER_CYCLE)
            .and_then(|requests| requests.checked_add(GRACEFUL_STOP_MARGIN))
            .unwrap_or(Duration::MAX)
    }

    /// A stopped user may only lose its in-flight cycle once every request in
    /// it has hit `http.timeout`.
    pub fn validate_graceful_stop(&self) -> ConfigResult<()> {
        let minimum = self.min_graceful_stop();
        if self.scenario.graceful_stop < minimum {
            return Err(ConfigError::DomainError {
                domain: self.scenario.domain_name().to_string(),
                message: format!(
                    "graceful_stop ({:?}) must be at least {:?} ({} requests at http.timeout {:?} plus {:?})",
                    self.scenario.graceful_stop,
                    minimum,
                    REQUESTS_PER_CYCLE,
                    self.http.timeout,
                    GRACEFUL_STOP_MARGIN
                ),
            });
        }
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = HsmLoadConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
