//! Core error types for hsm-load

use thiserror::Error;

use crate::metrics::MetricKind;

/// Errors raised by the metrics registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// A metric was requested with a different kind than it was registered with
    #[error("Metric '{name}' is registered as a {registered}, not a {requested}")]
    KindMismatch {
        name: String,
        registered: MetricKind,
        requested: MetricKind,
    },

    /// Metric names must be non-empty
    #[error("Metric name cannot be empty")]
    EmptyName,
}

/// Errors raised while parsing or validating threshold expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("Threshold expression '{0}' has no comparison operator (expected <, <=, > or >=)")]
    MissingOperator(String),

    #[error("Unknown statistic '{0}'. Supported statistics are: rate, avg, min, max, med, count, p(N)")]
    UnknownStatistic(String),

    #[error("Invalid percentile '{0}': must be a number between 0 and 100")]
    InvalidPercentile(String),

    #[error("Invalid threshold bound '{0}': expected a finite number")]
    InvalidBound(String),

    #[error("Statistic '{statistic}' cannot be applied to {kind} metric '{metric}'")]
    IncompatibleStatistic {
        metric: String,
        statistic: String,
        kind: MetricKind,
    },
}

/// Errors raised when building a ramp profile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Ramp profile must contain at least one stage")]
    Empty,

    #[error("Ramp profile has a total duration of zero")]
    ZeroDuration,
}
