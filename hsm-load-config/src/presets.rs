//! Built-in scenario presets
//!
//! `full` is the 22 minute soak with a 200 user peak; `quick` is the two
//! minute smoke run. A preset replaces the scenario, thresholds and JSON
//! output path of a configuration and leaves target, http and logging alone.

use crate::domains::scenario::{ScenarioConfig, ThinkTimeConfig};
use crate::domains::thresholds::ThresholdsConfig;
use crate::domains::HsmLoadConfig;
use crate::error::ConfigError;
use hsm_load_core::{names, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Preset {
    Full,
    Quick,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Full => "full",
            Preset::Quick => "quick",
        }
    }

    pub fn scenario(&self) -> ScenarioConfig {
        match self {
            Preset::Full => ScenarioConfig {
                stages: vec![
                    stage(60, 50),
                    stage(180, 100),
                    stage(300, 100),
                    stage(120, 200),
                    stage(300, 200),
                    stage(120, 100),
                    stage(180, 50),
                    stage(60, 0),
                ],
                think_time: ThinkTimeConfig::new(Duration::from_millis(1500), Duration::from_millis(2500)),
                payloads: vec![
                    "Hello World!".to_string(),
                    "This is a medium sized payload for testing".to_string(),
                    "Longer payload with more data to test performance under various conditions and loads"
                        .to_string(),
                ],
                ..ScenarioConfig::default()
            },
            Preset::Quick => ScenarioConfig {
                stages: vec![stage(30, 10), stage(60, 20), stage(30, 0)],
                think_time: ThinkTimeConfig::new(Duration::from_millis(500), Duration::from_secs(1)),
                payloads: vec![
                    "Hello World!".to_string(),
                    "Test data for load testing".to_string(),
                ],
                ..ScenarioConfig::default()
            },
        }
    }

    pub fn thresholds(&self) -> ThresholdsConfig {
        match self {
            Preset::Full => ThresholdsConfig::from_pairs(&[
                (names::HTTP_REQ_DURATION, &["p(95)<500", "p(99)<1000"]),
                (names::HTTP_REQ_FAILED, &["rate<0.01"]),
                (names::ERRORS, &["rate<0.01"]),
                (names::ENCRYPT_DURATION, &["p(95)<100", "p(99)<200"]),
                (names::DECRYPT_DURATION, &["p(95)<100", "p(99)<200"]),
            ]),
            Preset::Quick => ThresholdsConfig::default(),
        }
    }

    pub fn summary_json(&self) -> PathBuf {
        match self {
            Preset::Full => PathBuf::from("load-test-results.json"),
            Preset::Quick => PathBuf::from("load-test-quick-results.json"),
        }
    }

    /// Overwrite the preset-owned sections of `config`
    pub fn apply(&self, config: &mut HsmLoadConfig) {
        config.scenario = self.scenario();
        config.thresholds = self.thresholds();
        if config.output.summary_json.is_some() {
            config.output.summary_json = Some(self.summary_json());
        }
    }
}

fn stage(seconds: u64, target: u32) -> Stage {
    Stage::new(Duration::from_secs(seconds), target)
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Preset::Full),
            "quick" => Ok(Preset::Quick),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}
