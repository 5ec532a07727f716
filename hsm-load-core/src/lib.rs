//! Core domain models for hsm-load
//!
//! This crate contains the measurement side of a load test: the metrics
//! registry written to by every virtual user, the ramp profile the scheduler
//! follows, named response checks, and threshold evaluation producing the
//! final verdict. It performs no I/O.

pub mod check;
pub mod error;
pub mod metrics;
pub mod profile;
pub mod result;
pub mod threshold;

// Re-export commonly used types at the crate root
pub use check::Check;
pub use error::{MetricsError, ProfileError, ThresholdError};
pub use metrics::{
    names, CheckStats, Counter, MetricKind, MetricValue, MetricsRegistry, MetricsSnapshot, Rate, Trend,
    TrendStats,
};
pub use profile::{RampProfile, Stage};
pub use result::{TestResult, TickSample};
pub use threshold::{Comparison, Statistic, Threshold, ThresholdExpr, ThresholdOutcome, ThresholdSet, Verdict};
