//! Load test orchestration: setup, ramp, snapshot, verdict

use chrono::Utc;
use hsm_load_config::HsmLoadConfig;
use hsm_load_core::{MetricsRegistry, TestResult, ThresholdSet};
use hsm_load_http::{ClientConfig, HsmClient, ReqwestHsmClient};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cycle::RequestCycle;
use crate::error::RunError;
use crate::metrics::HsmMetrics;
use crate::scheduler::RampScheduler;
use crate::shutdown::ShutdownCoordinator;
use crate::user::HsmUserFactory;

/// A fully validated load test, ready to run
///
/// Every fatal condition is detected while building it. Running it cannot
/// fail: request failures become metrics and the outcome is in the verdict.
pub struct LoadTest {
    scheduler: RampScheduler,
    factory: HsmUserFactory,
    registry: Arc<MetricsRegistry>,
    thresholds: ThresholdSet,
}

impl LoadTest {
    /// Build the test and its mutual-TLS client from configuration
    pub fn from_config(config: &HsmLoadConfig) -> Result<Self, RunError> {
        let client_config = ClientConfig::try_from(config)?;
        let client = ReqwestHsmClient::new(&client_config)?;
        Self::with_client(config, Arc::new(client))
    }

    /// Build the test against an existing client
    pub fn with_client(config: &HsmLoadConfig, client: Arc<dyn HsmClient>) -> Result<Self, RunError> {
        let scenario = &config.scenario;
        let profile = scenario.ramp_profile()?;
        config.validate_graceful_stop()?;
        let thresholds = config.thresholds.threshold_set()?;

        let registry = Arc::new(MetricsRegistry::new());
        let metrics = HsmMetrics::register(registry.clone())?;
        let cycle = RequestCycle::new(
            client,
            &config.target.context,
            &scenario.payloads,
            scenario.health_check_probability,
        )?;
        let factory = HsmUserFactory::new(
            cycle,
            metrics,
            (scenario.think_time.min, scenario.think_time.max),
        );

        let scheduler = RampScheduler::new(profile)
            .with_tick(scenario.tick)
            .with_graceful_stop(scenario.graceful_stop);

        Ok(Self {
            scheduler,
            factory,
            registry,
            thresholds,
        })
    }

    /// Make every user's payload and pacing choices reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.factory = self.factory.with_seed(seed);
        self
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Ramp through the profile, then snapshot and evaluate
    pub async fn run(&self, shutdown: &ShutdownCoordinator) -> TestResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let profile = self.scheduler.profile();
        info!(
            %run_id,
            peak_users = profile.peak(),
            thresholds = self.thresholds.len(),
            "Starting load test over {:?}",
            profile.total_duration()
        );

        let schedule = self.scheduler.run(&self.factory, shutdown).await;

        let metrics = self.registry.snapshot();
        let verdict = self.thresholds.evaluate(&metrics);
        for failure in verdict.failures() {
            warn!(
                metric = %failure.metric,
                observed = ?failure.observed,
                "Threshold {} failed",
                failure.expression
            );
        }
        info!(
            %run_id,
            passed = verdict.passed,
            aborted = schedule.aborted,
            "Load test finished"
        );

        TestResult {
            run_id,
            started_at,
            duration: schedule.duration,
            vus_max: schedule.vus_max,
            aborted: schedule.aborted,
            timeline: schedule.timeline,
            metrics,
            verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::tests::FakeClient;
    use hsm_load_config::{ThresholdsConfig, ThinkTimeConfig};
    use hsm_load_core::{names, Stage};
    use std::time::Duration;

    fn short_config() -> HsmLoadConfig {
        let mut config = HsmLoadConfig::default();
        config.scenario.stages = vec![
            Stage::new(Duration::from_secs(5), 4),
            Stage::new(Duration::from_secs(10), 4),
            Stage::new(Duration::from_secs(5), 0),
        ];
        config.scenario.think_time = ThinkTimeConfig::new(Duration::from_millis(500), Duration::from_secs(1));
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_service_passes_thresholds() {
        let test = LoadTest::with_client(&short_config(), Arc::new(FakeClient::healthy()))
            .unwrap()
            .with_seed(5);
        let result = test.run(&ShutdownCoordinator::new()).await;

        assert!(result.passed(), "{:?}", result.verdict);
        assert_eq!(result.vus_max, 4);
        assert!(!result.aborted);

        let iterations = result.metrics.counter(names::ITERATIONS).unwrap();
        assert!(iterations > 0);
        assert_eq!(result.metrics.counter(names::TOTAL_OPERATIONS), Some(iterations * 2));
        assert_eq!(result.metrics.rate(names::ERRORS), Some(0.0));
        assert_eq!(result.timeline.last().map(|sample| sample.live), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_failed_cycle_counts_once() {
        let client = FakeClient {
            decrypt_body: Some("{}".to_string()),
            ..FakeClient::healthy()
        };
        let test = LoadTest::with_client(&short_config(), Arc::new(client)).unwrap();
        let result = test.run(&ShutdownCoordinator::new()).await;

        let iterations = result.metrics.counter(names::ITERATIONS).unwrap();
        assert_eq!(result.metrics.counter(names::ROUNDTRIP_FAILURES), Some(iterations));
        assert_eq!(result.metrics.rate(names::ERRORS), Some(1.0));
        assert!(!result.passed());
        assert!(result
            .verdict
            .failures()
            .any(|outcome| outcome.metric == names::ERRORS));
        // Decrypt never succeeded, so its trend has no samples
        assert!(result.metrics.trend(names::DECRYPT_DURATION).map_or(true, |t| t.count == 0));
    }

    #[test]
    fn test_bad_threshold_is_fatal() {
        let mut config = short_config();
        config.thresholds = ThresholdsConfig::from_pairs(&[("errors", &["rate=>0.1"])]);
        let result = LoadTest::with_client(&config, Arc::new(FakeClient::healthy()));
        assert!(matches!(result, Err(RunError::Config(_))));
    }

    #[test]
    fn test_graceful_stop_shorter_than_a_cycle_is_fatal() {
        let mut config = short_config();
        config.scenario.graceful_stop = Duration::ZERO;
        let result = LoadTest::with_client(&config, Arc::new(FakeClient::healthy()));
        assert!(matches!(result, Err(RunError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_down_waits_for_slow_requests() {
        let mut config = short_config();
        config.scenario.start_users = 1;
        config.scenario.stages = vec![Stage::new(Duration::from_secs(2), 1)];
        config.scenario.health_check_probability = 0.0;
        let client = FakeClient {
            latency: Duration::from_secs(3),
            ..FakeClient::healthy()
        };

        let test = LoadTest::with_client(&config, Arc::new(client)).unwrap();
        let result = test.run(&ShutdownCoordinator::new()).await;

        // Encrypt and decrypt each take 3s, well past the 2s stage
        assert_eq!(result.metrics.counter(names::ITERATIONS), Some(1));
        assert_eq!(result.metrics.counter(names::TOTAL_OPERATIONS), Some(2));
        assert_eq!(result.metrics.rate(names::ERRORS), Some(0.0));
        assert!(result.duration >= Duration::from_secs(6), "{:?}", result.duration);
        assert!(result.duration < config.scenario.graceful_stop);
    }

    #[test]
    fn test_empty_profile_is_fatal() {
        let mut config = short_config();
        config.scenario.stages.clear();
        let result = LoadTest::with_client(&config, Arc::new(FakeClient::healthy()));
        assert!(matches!(result, Err(RunError::Config(_))));
    }
}
