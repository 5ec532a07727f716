//! Ramp profile: ordered stages of target concurrency

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProfileError;

/// One stage of a ramp profile
///
/// Over `duration` the target moves linearly from the previous stage's
/// target to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Validated sequence of stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampProfile {
    start: u32,
    stages: Vec<Stage>,
    total: Duration,
}

impl RampProfile {
    /// Build a profile starting from `start` users
    pub fn new(start: u32, stages: Vec<Stage>) -> Result<Self, ProfileError> {
        if stages.is_empty() {
            return Err(ProfileError::Empty);
        }
        let total: Duration = stages.iter().map(|stage| stage.duration).sum();
        if total.is_zero() {
            return Err(ProfileError::ZeroDuration);
        }
        Ok(Self {
            start,
            stages,
            total,
        })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Sum of all stage durations
    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// Highest target reached anywhere in the profile
    pub fn peak(&self) -> u32 {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .fold(self.start, u32::max)
    }

    /// Index of the stage active at `elapsed`, `None` once the profile is over
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (index, stage) in self.stages.iter().enumerate() {
            end += stage.duration;
            if elapsed < end {
                return Some(index);
            }
        }
        None
    }

    /// Interpolated target concurrency at `elapsed`
    ///
    /// Fractional targets are rounded down. At a stage's end time the result
    /// is exactly that stage's target; past the end of the profile it is 0.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        if elapsed > self.total {
            return 0;
        }
        let mut from = self.start;
        let mut stage_start = Duration::ZERO;
        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let delta = stage.target as f64 - from as f64;
                return (from as f64 + delta * progress).trunc() as u32;
            }
            from = stage.target;
            stage_start = stage_end;
        }
        from
    }
}
