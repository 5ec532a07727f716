//! Threshold configuration: metric name to pass/fail expressions
//!
//! ```yaml
//! thresholds:
//!   http_req_duration: ["p(95)<500", "p(99)<1000"]
//!   encrypt_duration:
//!     - expr: "p(95)<200"
//!       require_samples: true
//! ```

use crate::error::ConfigResult;
use crate::validation::Validatable;
use hsm_load_core::{names, Threshold, ThresholdExpr, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured threshold, either a bare expression or a detailed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdEntry {
    Expr(String),
    Detailed {
        expr: String,
        #[serde(default)]
        require_samples: bool,
    },
}

impl ThresholdEntry {
    pub fn expr(&self) -> &str {
        match self {
            ThresholdEntry::Expr(expr) | ThresholdEntry::Detailed { expr, .. } => expr,
        }
    }

    pub fn require_samples(&self) -> bool {
        matches!(self, ThresholdEntry::Detailed { require_samples: true, .. })
    }
}

impl From<&str> for ThresholdEntry {
    fn from(expr: &str) -> Self {
        ThresholdEntry::Expr(expr.to_string())
    }
}

/// Thresholds keyed by metric name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdsConfig(pub BTreeMap<String, Vec<ThresholdEntry>>);

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self::from_pairs(&[
            (names::HTTP_REQ_DURATION, &["p(95)<500", "p(99)<1000"]),
            (names::HTTP_REQ_FAILED, &["rate<0.05"]),
            (names::ERRORS, &["rate<0.05"]),
            (names::ENCRYPT_DURATION, &["p(95)<200", "p(99)<500"]),
            (names::DECRYPT_DURATION, &["p(95)<200", "p(99)<500"]),
        ])
    }
}

impl ThresholdsConfig {
    pub fn from_pairs(pairs: &[(&str, &[&str])]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(metric, exprs)| {
                    (
                        metric.to_string(),
                        exprs.iter().map(|expr| ThresholdEntry::from(*expr)).collect(),
                    )
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Parse every entry into an evaluable set
    ///
    /// Entries on built-in metrics are also checked against the metric's
    /// kind, so `p(95)` on a counter is rejected before the run starts.
    pub fn threshold_set(&self) -> ConfigResult<ThresholdSet> {
        let mut set = ThresholdSet::new();
        for (metric, entries) in &self.0 {
            if metric.is_empty() {
                return Err(self.validation_error("metric name cannot be empty"));
            }
            for entry in entries {
                let expr: ThresholdExpr = entry.expr().parse().map_err(|e| {
                    self.validation_error(format!("{}: {}", metric, e))
                })?;
                let threshold =
                    Threshold::new(metric.clone(), expr).require_samples(entry.require_samples());
                if let Some(kind) = names::builtin_kind(metric) {
                    threshold
                        .check_kind(kind)
                        .map_err(|e| self.validation_error(e.to_string()))?;
                }
                set.push(threshold);
            }
        }
        Ok(set)
    }
}

impl Validatable for ThresholdsConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.threshold_set().map(|_| ())
    }

    fn domain_name(&self) -> &'static str {
        "thresholds"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_parse() {
        let config = ThresholdsConfig::default();
        let set = config.threshold_set().unwrap();
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn test_mixed_entry_forms() {
        let yaml = r#"
errors: ["rate<0.01"]
encrypt_duration:
  - "p(95)<100"
  - expr: "p(99)<200"
    require_samples: true
"#;
        let config: ThresholdsConfig = serde_yaml::from_str(yaml).unwrap();
        let set = config.threshold_set().unwrap();
        assert_eq!(set.len(), 3);

        let strict: Vec<_> = set.iter().filter(|t| t.require_samples).collect();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].expr.to_string(), "p(99)<200");
    }

    #[test]
    fn test_malformed_expression_is_fatal() {
        let config = ThresholdsConfig::from_pairs(&[(names::ERRORS, &["rate 0.01"])]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds"));
        assert!(err.to_string().contains("errors"));
    }

    #[test]
    fn test_statistic_must_fit_builtin_kind() {
        let config = ThresholdsConfig::from_pairs(&[(names::TOTAL_OPERATIONS, &["p(95)<10"])]);
        assert!(config.validate().is_err());

        let config = ThresholdsConfig::from_pairs(&[(names::TOTAL_OPERATIONS, &["count>100"])]);
        assert!(config.validate().is_ok());

        // Unknown metrics are not kind-checked until evaluation
        let config = ThresholdsConfig::from_pairs(&[("custom_metric", &["p(95)<10"])]);
        assert!(config.validate().is_ok());
    }
}
