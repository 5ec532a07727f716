//! Scenario configuration: ramp profile, pacing and request mix

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate_positive, validate_probability, Validatable};
use hsm_load_core::{RampProfile, Stage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How virtual users are ramped and what each iteration does
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Live users before the first stage begins
    pub start_users: u32,

    /// Ordered ramp stages
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,

    /// Scheduler tick period
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_tick"
    )]
    pub tick: Duration,

    /// How long stopped users may finish their in-flight iteration
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_graceful_stop"
    )]
    pub graceful_stop: Duration,

    /// Pause between iterations, drawn uniformly from `[min, max]`
    #[serde(default)]
    pub think_time: ThinkTimeConfig,

    /// Chance that an iteration also probes `/health`
    #[serde(default = "default_health_check_probability")]
    pub health_check_probability: f64,

    /// Plaintext payloads; one is picked at random per iteration
    #[serde(default = "default_payloads")]
    pub payloads: Vec<String>,
}

/// Bounds of the inter-iteration pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkTimeConfig {
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub min: Duration,
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub max: Duration,
}

impl ThinkTimeConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }
}

impl Default for ThinkTimeConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_secs(1),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            start_users: 0,
            stages: default_stages(),
            tick: default_tick(),
            graceful_stop: default_graceful_stop(),
            think_time: ThinkTimeConfig::default(),
            health_check_probability: default_health_check_probability(),
            payloads: default_payloads(),
        }
    }
}

impl ScenarioConfig {
    /// Build the validated ramp profile
    pub fn ramp_profile(&self) -> ConfigResult<RampProfile> {
        RampProfile::new(self.start_users, self.stages.clone()).map_err(|e| ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: e.to_string(),
        })
    }
}

impl Validatable for ScenarioConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.ramp_profile()?;
        validate_positive(self.tick.as_millis(), "tick", self.domain_name())?;
        self.think_time.validate()?;
        validate_probability(
            self.health_check_probability,
            "health_check_probability",
            self.domain_name(),
        )?;

        if self.payloads.is_empty() {
            return Err(self.validation_error("at least one payload must be configured"));
        }
        if self.payloads.iter().any(String::is_empty) {
            return Err(self.validation_error("payloads cannot be empty strings"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario"
    }
}

impl Validatable for ThinkTimeConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.min > self.max {
            return Err(self.validation_error(format!(
                "min ({:?}) cannot exceed max ({:?})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario.think_time"
    }
}

// Default value functions
fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(30), 10),
        Stage::new(Duration::from_secs(60), 20),
        Stage::new(Duration::from_secs(30), 0),
    ]
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_graceful_stop() -> Duration {
    Duration::from_secs(35)
}

fn default_health_check_probability() -> f64 {
    0.1
}

fn default_payloads() -> Vec<String> {
    vec![
        "Hello World!".to_string(),
        "Test data for load testing".to_string(),
    ]
}
