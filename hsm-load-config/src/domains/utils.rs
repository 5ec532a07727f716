//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serde helper for durations
///
/// Serializes as a humantime string (`30s`, `1m 30s`). Deserializes either
/// such a string or a bare integer number of seconds.
pub mod serde_duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Human(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime_serde::serialize(duration, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            RawDuration::Human(text) => humantime_serde::re::humantime::parse_duration(&text)
                .map_err(|e| serde::de::Error::custom(format!("invalid duration '{}': {}", text, e))),
        }
    }
}

/// Default functions for serde
pub fn default_true() -> bool {
    true
}

pub fn default_false() -> bool {
    false
}
