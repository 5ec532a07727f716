//! Pre-resolved handles to the built-in metrics

use hsm_load_core::{names, Counter, MetricsError, MetricsRegistry, Rate, Trend};
use std::sync::Arc;

/// Handles to every built-in metric of a registry
///
/// Resolving names once up front keeps the hot path free of the registry's
/// name table; every update is an atomic or a striped push.
#[derive(Debug, Clone)]
pub struct HsmMetrics {
    registry: Arc<MetricsRegistry>,
    pub http_reqs: Arc<Counter>,
    pub http_req_duration: Arc<Trend>,
    pub http_req_failed: Arc<Rate>,
    pub checks: Arc<Rate>,
    pub iterations: Arc<Counter>,
    pub iteration_duration: Arc<Trend>,
    pub errors: Arc<Rate>,
    pub encrypt_duration: Arc<Trend>,
    pub decrypt_duration: Arc<Trend>,
    pub total_operations: Arc<Counter>,
    pub encrypt_failures: Arc<Counter>,
    pub roundtrip_failures: Arc<Counter>,
}

impl HsmMetrics {
    /// Register every built-in metric in `registry`
    pub fn register(registry: Arc<MetricsRegistry>) -> Result<Self, MetricsError> {
        Ok(Self {
            http_reqs: registry.counter(names::HTTP_REQS)?,
            http_req_duration: registry.trend(names::HTTP_REQ_DURATION)?,
            http_req_failed: registry.rate(names::HTTP_REQ_FAILED)?,
            checks: registry.rate(names::CHECKS)?,
            iterations: registry.counter(names::ITERATIONS)?,
            iteration_duration: registry.trend(names::ITERATION_DURATION)?,
            errors: registry.rate(names::ERRORS)?,
            encrypt_duration: registry.trend(names::ENCRYPT_DURATION)?,
            decrypt_duration: registry.trend(names::DECRYPT_DURATION)?,
            total_operations: registry.counter(names::TOTAL_OPERATIONS)?,
            encrypt_failures: registry.counter(names::ENCRYPT_FAILURES)?,
            roundtrip_failures: registry.counter(names::ROUNDTRIP_FAILURES)?,
            registry,
        })
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Record one named check in the `checks` rate and its own tally
    pub fn record_check(&self, name: &str, passed: bool) {
        self.checks.add(passed);
        self.registry.check(name).add(passed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_builtins() {
        let registry = Arc::new(MetricsRegistry::new());
        let metrics = HsmMetrics::register(registry.clone()).unwrap();
        assert_eq!(registry.len(), names::BUILTIN.len());

        for (name, kind) in names::BUILTIN {
            assert_eq!(registry.kind_of(name), Some(*kind), "{}", name);
        }

        metrics.record_check("encrypt: status 200", true);
        metrics.record_check("encrypt: status 200", false);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.checks["encrypt: status 200"].fails, 1);
        assert_eq!(snapshot.rate(names::CHECKS), Some(0.5));
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.counter(names::ERRORS).unwrap();
        assert!(HsmMetrics::register(registry).is_err());
    }
}
