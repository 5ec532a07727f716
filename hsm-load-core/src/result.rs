//! Final outcome of a load test run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::metrics::MetricsSnapshot;
use crate::threshold::Verdict;

/// One scheduler tick: where the target was and how many users were live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSample {
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub target: u32,
    pub live: u32,
}

/// Immutable snapshot of a finished run plus its threshold verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Peak number of live virtual users
    pub vus_max: u32,
    /// Run was stopped early by an external abort
    pub aborted: bool,
    pub timeline: Vec<TickSample>,
    pub metrics: MetricsSnapshot,
    pub verdict: Verdict,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    /// Requests per second over the whole run
    pub fn request_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        match self.metrics.counter(crate::metrics::names::HTTP_REQS) {
            Some(count) if secs > 0.0 => count as f64 / secs,
            _ => 0.0,
        }
    }
}
