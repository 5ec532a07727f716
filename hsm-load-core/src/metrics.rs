//! Thread-safe metric accumulators
//!
//! Three kinds of metrics are supported:
//! - [`Counter`]: monotonic non-negative total
//! - [`Rate`]: fraction of boolean observations that were true
//! - [`Trend`]: distribution of samples, queryable by percentile and mean
//!
//! The [`MetricsRegistry`] maps unique names to accumulators. Lookups take a
//! read lock on the name table only; once a handle has been resolved, every
//! `add` goes straight to the accumulator. Counters and rates are atomics and
//! trends are striped across several small mutexes, so concurrent virtual
//! users never serialize on a single lock.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::MetricsError;

/// Names of the metrics recorded by every run
pub mod names {
    use super::MetricKind;

    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const CHECKS: &str = "checks";
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_DURATION: &str = "iteration_duration";
    pub const ERRORS: &str = "errors";
    pub const ENCRYPT_DURATION: &str = "encrypt_duration";
    pub const DECRYPT_DURATION: &str = "decrypt_duration";
    pub const TOTAL_OPERATIONS: &str = "total_operations";
    pub const ENCRYPT_FAILURES: &str = "encrypt_failures";
    pub const ROUNDTRIP_FAILURES: &str = "roundtrip_failures";

    /// Every built-in metric with its kind
    pub const BUILTIN: &[(&str, MetricKind)] = &[
        (HTTP_REQS, MetricKind::Counter),
        (HTTP_REQ_DURATION, MetricKind::Trend),
        (HTTP_REQ_FAILED, MetricKind::Rate),
        (CHECKS, MetricKind::Rate),
        (ITERATIONS, MetricKind::Counter),
        (ITERATION_DURATION, MetricKind::Trend),
        (ERRORS, MetricKind::Rate),
        (ENCRYPT_DURATION, MetricKind::Trend),
        (DECRYPT_DURATION, MetricKind::Trend),
        (TOTAL_OPERATIONS, MetricKind::Counter),
        (ENCRYPT_FAILURES, MetricKind::Counter),
        (ROUNDTRIP_FAILURES, MetricKind::Counter),
    ];

    /// Kind of a built-in metric, if `name` is one
    pub fn builtin_kind(name: &str) -> Option<MetricKind> {
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, kind)| *kind)
    }
}

/// Metric kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic non-negative accumulator
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to the total
    pub fn add(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn value(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Fraction of boolean observations that were true
#[derive(Debug, Default)]
pub struct Rate {
    trues: AtomicU64,
    total: AtomicU64,
}

impl Rate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation
    pub fn add(&self, value: bool) {
        // total is bumped before trues and read after it, so a concurrent
        // reader never sees more trues than observations.
        self.total.fetch_add(1, Ordering::AcqRel);
        if value {
            self.trues.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// `(trues, total)`
    pub fn counts(&self) -> (u64, u64) {
        let trues = self.trues.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        (trues, total)
    }

    /// Fraction of true observations, 0 when nothing was recorded
    pub fn value(&self) -> f64 {
        let (trues, total) = self.counts();
        ratio(trues, total)
    }
}

fn ratio(trues: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        trues as f64 / total as f64
    }
}

const TREND_SHARDS: usize = 16;

/// Distribution of real-valued samples
///
/// Samples are kept exactly so that percentiles are textbook nearest-rank
/// values rather than estimates.
#[derive(Debug)]
pub struct Trend {
    shards: Box<[Mutex<Vec<f64>>]>,
    cursor: AtomicUsize,
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}

impl Trend {
    pub fn new() -> Self {
        let shards = (0..TREND_SHARDS)
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Append a sample
    pub fn add(&self, value: f64) {
        let shard = self.cursor.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        self.shards[shard].lock().push(value);
    }

    /// Append a duration as milliseconds
    pub fn add_duration(&self, elapsed: Duration) {
        self.add(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All samples, sorted ascending
    pub fn sorted_samples(&self) -> Vec<f64> {
        let mut samples = Vec::with_capacity(self.len());
        for shard in self.shards.iter() {
            samples.extend_from_slice(&shard.lock());
        }
        samples.sort_by(f64::total_cmp);
        samples
    }

    pub fn stats(&self) -> TrendStats {
        TrendStats::from_sorted(self.sorted_samples())
    }
}

/// Nearest-rank percentile of an ascending slice
///
/// `p` is clamped to `[0, 100]`. `p = 0` yields the minimum.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}

/// Summary statistics of a trend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,

    /// Ascending samples, kept for arbitrary percentile queries
    #[serde(skip)]
    samples: Vec<f64>,
}

impl TrendStats {
    /// Build stats from samples already sorted ascending
    pub fn from_sorted(samples: Vec<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let sum: f64 = samples.iter().sum();
        let pct = |p: f64| nearest_rank(&samples, p).unwrap_or_default();
        Self {
            count: samples.len() as u64,
            min: samples[0],
            max: samples[samples.len() - 1],
            avg: sum / samples.len() as f64,
            med: pct(50.0),
            p90: pct(90.0),
            p95: pct(95.0),
            p99: pct(99.0),
            samples,
        }
    }

    /// Arbitrary percentile
    ///
    /// Uses the retained samples when available; a summary that was
    /// deserialized without samples only answers the precomputed percentiles.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        if !self.samples.is_empty() {
            return nearest_rank(&self.samples, p);
        }
        match p {
            p if p == 0.0 => Some(self.min),
            p if p == 50.0 => Some(self.med),
            p if p == 90.0 => Some(self.p90),
            p if p == 95.0 => Some(self.p95),
            p if p == 99.0 => Some(self.p99),
            p if p == 100.0 => Some(self.max),
            _ => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.avg)
    }
}

/// Point-in-time value of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricValue {
    Counter { count: u64 },
    Rate { passes: u64, total: u64, rate: f64 },
    Trend(TrendStats),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter { .. } => MetricKind::Counter,
            MetricValue::Rate { .. } => MetricKind::Rate,
            MetricValue::Trend(_) => MetricKind::Trend,
        }
    }

    /// Number of observations behind this value
    pub fn sample_count(&self) -> u64 {
        match self {
            MetricValue::Counter { count } => *count,
            MetricValue::Rate { total, .. } => *total,
            MetricValue::Trend(stats) => stats.count,
        }
    }
}

/// Pass/fail tally of one named check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStats {
    pub passes: u64,
    pub fails: u64,
}

/// Frozen copy of a registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub checks: BTreeMap<String, CheckStats>,
}

impl MetricsSnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.metrics.get(name) {
            Some(MetricValue::Counter { count }) => Some(*count),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name) {
            Some(MetricValue::Rate { rate, .. }) => Some(*rate),
            _ => None,
        }
    }

    pub fn trend(&self, name: &str) -> Option<&TrendStats> {
        match self.metrics.get(name) {
            Some(MetricValue::Trend(stats)) => Some(stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Metric {
    Counter(Arc<Counter>),
    Rate(Arc<Rate>),
    Trend(Arc<Trend>),
}

impl Metric {
    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Rate(_) => MetricKind::Rate,
            Metric::Trend(_) => MetricKind::Trend,
        }
    }

    fn value(&self) -> MetricValue {
        match self {
            Metric::Counter(counter) => MetricValue::Counter {
                count: counter.value(),
            },
            Metric::Rate(rate) => {
                let (passes, total) = rate.counts();
                MetricValue::Rate {
                    passes,
                    total,
                    rate: ratio(passes, total),
                }
            }
            Metric::Trend(trend) => MetricValue::Trend(trend.stats()),
        }
    }
}

/// Named metric accumulators shared by all virtual users
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    metrics: RwLock<HashMap<String, Metric>>,
    checks: RwLock<BTreeMap<String, Arc<Rate>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or register a counter
    pub fn counter(&self, name: &str) -> Result<Arc<Counter>, MetricsError> {
        match self.get_or_register(name, MetricKind::Counter)? {
            Metric::Counter(counter) => Ok(counter),
            other => Err(mismatch(name, other.kind(), MetricKind::Counter)),
        }
    }

    /// Get or register a rate
    pub fn rate(&self, name: &str) -> Result<Arc<Rate>, MetricsError> {
        match self.get_or_register(name, MetricKind::Rate)? {
            Metric::Rate(rate) => Ok(rate),
            other => Err(mismatch(name, other.kind(), MetricKind::Rate)),
        }
    }

    /// Get or register a trend
    pub fn trend(&self, name: &str) -> Result<Arc<Trend>, MetricsError> {
        match self.get_or_register(name, MetricKind::Trend)? {
            Metric::Trend(trend) => Ok(trend),
            other => Err(mismatch(name, other.kind(), MetricKind::Trend)),
        }
    }

    /// Tally for a named check
    pub fn check(&self, name: &str) -> Arc<Rate> {
        if let Some(rate) = self.checks.read().get(name) {
            return Arc::clone(rate);
        }
        let mut checks = self.checks.write();
        Arc::clone(checks.entry(name.to_string()).or_default())
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.read().get(name).map(Metric::kind)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy every metric and check tally
    pub fn snapshot(&self) -> MetricsSnapshot {
        let metrics = self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect();
        let checks = self
            .checks
            .read()
            .iter()
            .map(|(name, rate)| {
                let (passes, total) = rate.counts();
                (
                    name.clone(),
                    CheckStats {
                        passes,
                        fails: total - passes,
                    },
                )
            })
            .collect();
        MetricsSnapshot { metrics, checks }
    }

    fn get_or_register(&self, name: &str, kind: MetricKind) -> Result<Metric, MetricsError> {
        if name.is_empty() {
            return Err(MetricsError::EmptyName);
        }
        if let Some(metric) = self.metrics.read().get(name) {
            return Ok(metric.clone());
        }
        let mut metrics = self.metrics.write();
        let metric = metrics.entry(name.to_string()).or_insert_with(|| match kind {
            MetricKind::Counter => Metric::Counter(Arc::new(Counter::new())),
            MetricKind::Rate => Metric::Rate(Arc::new(Rate::new())),
            MetricKind::Trend => Metric::Trend(Arc::new(Trend::new())),
        });
        Ok(metric.clone())
    }
}

fn mismatch(name: &str, registered: MetricKind, requested: MetricKind) -> MetricsError {
    MetricsError::KindMismatch {
        name: name.to_string(),
        registered,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn tens() -> Vec<f64> {
        (1..=10).map(|i| (i * 10) as f64).collect()
    }

    #[test]
    fn test_nearest_rank_textbook_values() {
        let samples = tens();
        assert_eq!(nearest_rank(&samples, 0.0), Some(10.0));
        assert_eq!(nearest_rank(&samples, 10.0), Some(10.0));
        assert_eq!(nearest_rank(&samples, 25.0), Some(30.0));
        assert_eq!(nearest_rank(&samples, 50.0), Some(50.0));
        assert_eq!(nearest_rank(&samples, 90.0), Some(90.0));
        assert_eq!(nearest_rank(&samples, 95.0), Some(100.0));
        assert_eq!(nearest_rank(&samples, 100.0), Some(100.0));
        assert_eq!(nearest_rank(&[], 50.0), None);
    }

    #[test]
    fn test_trend_stats() {
        let trend = Trend::new();
        for value in tens().into_iter().rev() {
            trend.add(value);
        }

        let stats = trend.stats();
        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 100.0);
        assert!((stats.avg - 55.0).abs() < f64::EPSILON);
        assert_eq!(stats.med, 50.0);
        assert_eq!(stats.p90, 90.0);
        assert_eq!(stats.percentile(70.0), Some(70.0));
        assert_eq!(stats.mean(), Some(stats.avg));
    }

    #[test]
    fn test_empty_trend_has_no_statistics() {
        let stats = Trend::new().stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.percentile(95.0), None);
        assert_eq!(stats.mean(), None);
    }

    #[test]
    fn test_trend_records_durations_in_milliseconds() {
        let trend = Trend::new();
        trend.add_duration(Duration::from_millis(250));
        assert_eq!(trend.sorted_samples(), vec![250.0]);
    }

    #[test]
    fn test_rate_counts() {
        let rate = Rate::new();
        assert_eq!(rate.value(), 0.0);

        rate.add(true);
        rate.add(false);
        rate.add(false);
        rate.add(true);

        assert_eq!(rate.counts(), (2, 4));
        assert!((rate.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_registry_returns_same_handle() {
        let registry = MetricsRegistry::new();
        let first = registry.counter("ops").unwrap();
        let second = registry.counter("ops").unwrap();
        first.add(2);
        second.add(3);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.snapshot().counter("ops"), Some(5));
    }

    #[test]
    fn test_registry_rejects_kind_mismatch() {
        let registry = MetricsRegistry::new();
        registry.rate("errors").unwrap();

        let err = registry.trend("errors").unwrap_err();
        assert_eq!(
            err,
            MetricsError::KindMismatch {
                name: "errors".to_string(),
                registered: MetricKind::Rate,
                requested: MetricKind::Trend,
            }
        );
        assert_eq!(registry.counter("").unwrap_err(), MetricsError::EmptyName);
    }

    #[test]
    fn test_concurrent_adds_are_all_counted() {
        let registry = Arc::new(MetricsRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let counter = registry.counter("ops").unwrap();
                    let rate = registry.rate("errors").unwrap();
                    let trend = registry.trend("latency").unwrap();
                    for j in 0..1000 {
                        counter.inc();
                        rate.add((i + j) % 4 == 0);
                        trend.add(j as f64);
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counter("ops"), Some(8000));
        match snapshot.get("errors") {
            Some(MetricValue::Rate { passes, total, .. }) => {
                assert_eq!(*total, 8000);
                assert_eq!(*passes, 2000);
            }
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(snapshot.trend("latency").unwrap().count, 8000);
    }

    #[test]
    fn test_check_tallies_in_snapshot() {
        let registry = MetricsRegistry::new();
        registry.check("health: status 200").add(true);
        registry.check("health: status 200").add(false);
        registry.check("health: status 200").add(true);

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.checks.get("health: status 200"),
            Some(&CheckStats { passes: 2, fails: 1 })
        );
    }

    #[test]
    fn test_snapshot_serializes_with_kind_tags() {
        let registry = MetricsRegistry::new();
        registry.counter("http_reqs").unwrap().add(3);
        registry.trend("encrypt_duration").unwrap().add(12.0);

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["metrics"]["http_reqs"]["type"], "counter");
        assert_eq!(json["metrics"]["http_reqs"]["count"], 3);
        assert_eq!(json["metrics"]["encrypt_duration"]["type"], "trend");
        assert_eq!(json["metrics"]["encrypt_duration"]["p95"], 12.0);
    }

    #[test]
    fn test_builtin_kinds() {
        assert_eq!(names::builtin_kind(names::ERRORS), Some(MetricKind::Rate));
        assert_eq!(
            names::builtin_kind(names::ENCRYPT_DURATION),
            Some(MetricKind::Trend)
        );
        assert_eq!(names::builtin_kind("custom"), None);
    }
}
