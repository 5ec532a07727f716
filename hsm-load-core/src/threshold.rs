//! Threshold expressions and their evaluation against a metrics snapshot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ThresholdError;
use crate::metrics::{MetricKind, MetricValue, MetricsSnapshot};

/// Statistic selected by a threshold expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Rate,
    Avg,
    Min,
    Max,
    Med,
    Count,
    /// Nearest-rank percentile, `0..=100`
    Percentile(f64),
}

impl Statistic {
    /// Whether this statistic can be computed for a metric of `kind`
    pub fn applies_to(&self, kind: MetricKind) -> bool {
        match self {
            Statistic::Rate => kind == MetricKind::Rate,
            Statistic::Count => matches!(kind, MetricKind::Counter | MetricKind::Trend),
            Statistic::Avg
            | Statistic::Min
            | Statistic::Max
            | Statistic::Med
            | Statistic::Percentile(_) => kind == MetricKind::Trend,
        }
    }

    /// Compute the statistic, `None` when the metric has no samples
    ///
    /// `count` is defined for an empty metric and observes zero.
    pub fn observe(&self, value: &MetricValue) -> Option<f64> {
        match (self, value) {
            (Statistic::Count, MetricValue::Counter { count }) => return Some(*count as f64),
            (Statistic::Count, MetricValue::Trend(stats)) => return Some(stats.count as f64),
            _ => {}
        }
        if value.sample_count() == 0 {
            return None;
        }
        match (self, value) {
            (Statistic::Rate, MetricValue::Rate { rate, .. }) => Some(*rate),
            (Statistic::Avg, MetricValue::Trend(stats)) => stats.mean(),
            (Statistic::Min, MetricValue::Trend(stats)) => Some(stats.min),
            (Statistic::Max, MetricValue::Trend(stats)) => Some(stats.max),
            (Statistic::Med, MetricValue::Trend(stats)) => Some(stats.med),
            (Statistic::Percentile(p), MetricValue::Trend(stats)) => stats.percentile(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Rate => f.write_str("rate"),
            Statistic::Avg => f.write_str("avg"),
            Statistic::Min => f.write_str("min"),
            Statistic::Max => f.write_str("max"),
            Statistic::Med => f.write_str("med"),
            Statistic::Count => f.write_str("count"),
            Statistic::Percentile(p) => write!(f, "p({})", p),
        }
    }
}

impl FromStr for Statistic {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "rate" => return Ok(Statistic::Rate),
            "avg" => return Ok(Statistic::Avg),
            "min" => return Ok(Statistic::Min),
            "max" => return Ok(Statistic::Max),
            "med" => return Ok(Statistic::Med),
            "count" => return Ok(Statistic::Count),
            _ => {}
        }

        let inner = s
            .strip_prefix("p(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ThresholdError::UnknownStatistic(s.to_string()))?;
        let p: f64 = inner
            .trim()
            .parse()
            .map_err(|_| ThresholdError::InvalidPercentile(inner.to_string()))?;
        if !(0.0..=100.0).contains(&p) {
            return Err(ThresholdError::InvalidPercentile(inner.to_string()));
        }
        Ok(Statistic::Percentile(p))
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// A parsed expression such as `p(95)<500` or `rate<0.01`
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub statistic: Statistic,
    pub comparison: Comparison,
    pub bound: f64,
}

impl ThresholdExpr {
    /// Evaluate against an observed value
    pub fn holds(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.bound)
    }
}

impl FromStr for ThresholdExpr {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Two-character operators first so "<=" is not read as "<" then "=500".
        let (index, comparison, width) = ["<=", ">=", "<", ">"]
            .iter()
            .filter_map(|op| s.find(op).map(|index| (index, *op)))
            .min_by_key(|(index, op)| (*index, std::cmp::Reverse(op.len())))
            .map(|(index, op)| {
                let comparison = match op {
                    "<=" => Comparison::Le,
                    ">=" => Comparison::Ge,
                    "<" => Comparison::Lt,
                    _ => Comparison::Gt,
                };
                (index, comparison, op.len())
            })
            .ok_or_else(|| ThresholdError::MissingOperator(s.to_string()))?;

        let statistic: Statistic = s[..index].parse()?;
        let raw_bound = s[index + width..].trim();
        let bound: f64 = raw_bound
            .parse()
            .map_err(|_| ThresholdError::InvalidBound(raw_bound.to_string()))?;
        if !bound.is_finite() {
            return Err(ThresholdError::InvalidBound(raw_bound.to_string()));
        }

        Ok(Self {
            statistic,
            comparison,
            bound,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.statistic, self.comparison.as_str(), self.bound)
    }
}

impl Serialize for ThresholdExpr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ThresholdExpr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A pass/fail condition over one metric
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expr: ThresholdExpr,
    /// Fail when the metric recorded no samples instead of passing vacuously
    pub require_samples: bool,
}

impl Threshold {
    pub fn new(metric: impl Into<String>, expr: ThresholdExpr) -> Self {
        Self {
            metric: metric.into(),
            expr,
            require_samples: false,
        }
    }

    pub fn require_samples(mut self, required: bool) -> Self {
        self.require_samples = required;
        self
    }

    /// Check the statistic against a known metric kind
    pub fn check_kind(&self, kind: MetricKind) -> Result<(), ThresholdError> {
        if self.expr.statistic.applies_to(kind) {
            Ok(())
        } else {
            Err(ThresholdError::IncompatibleStatistic {
                metric: self.metric.clone(),
                statistic: self.expr.statistic.to_string(),
                kind,
            })
        }
    }

    /// Evaluate against a frozen snapshot
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let outcome = |observed: Option<f64>, passed: bool, reason: Option<String>| {
            ThresholdOutcome {
                metric: self.metric.clone(),
                expression: self.expr.to_string(),
                observed,
                passed,
                reason,
            }
        };

        let value = match snapshot.get(&self.metric) {
            Some(value) => value,
            None => return self.no_samples(outcome, "metric was never recorded"),
        };
        if let Err(e) = self.check_kind(value.kind()) {
            return outcome(None, false, Some(e.to_string()));
        }
        match self.expr.statistic.observe(value) {
            Some(observed) => outcome(Some(observed), self.expr.holds(observed), None),
            None => self.no_samples(outcome, "metric has no samples"),
        }
    }

    fn no_samples<F>(&self, outcome: F, why: &str) -> ThresholdOutcome
    where
        F: Fn(Option<f64>, bool, Option<String>) -> ThresholdOutcome,
    {
        if self.require_samples {
            outcome(None, false, Some(why.to_string()))
        } else {
            outcome(None, true, Some(format!("{}, passed vacuously", why)))
        }
    }
}

/// Result of evaluating one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcomes of a whole threshold set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcomes: Vec<ThresholdOutcome>,
    pub passed: bool,
}

impl Verdict {
    pub fn failures(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }
}

/// Thresholds evaluated together; the verdict is the AND of all of them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, threshold: Threshold) {
        self.thresholds.push(threshold);
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.thresholds.iter()
    }

    /// Evaluate every threshold in insertion order
    ///
    /// Pure: the same snapshot always produces the same verdict.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Verdict {
        let outcomes: Vec<_> = self
            .thresholds
            .iter()
            .map(|threshold| threshold.evaluate(snapshot))
            .collect();
        let passed = outcomes.iter().all(|outcome| outcome.passed);
        Verdict { outcomes, passed }
    }
}

impl FromIterator<Threshold> for ThresholdSet {
    fn from_iter<I: IntoIterator<Item = Threshold>>(iter: I) -> Self {
        Self {
            thresholds: iter.into_iter().collect(),
        }
    }
}
