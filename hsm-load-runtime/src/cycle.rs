//! One encrypt, decrypt and compare probe of the service
//!
//! [`RequestCycle::execute`] talks to the service and returns a
//! [`CycleReport`] without touching any metric. The report is applied in a
//! single synchronous [`CycleReport::record`] call, so a cycle whose future is
//! dropped mid-flight leaves nothing behind in the registry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hsm_load_core::check::{self, Check};
use hsm_load_http::{ApiResponse, DecryptRequest, Endpoint, EncryptRequest, HsmClient};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::RunError;
use crate::metrics::HsmMetrics;

/// Longest response body excerpt written to a log line
const LOG_EXCERPT: usize = 200;

/// A plaintext and its wire encoding, computed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub text: String,
    pub encoded: String,
}

impl Payload {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let encoded = STANDARD.encode(text.as_bytes());
        Self { text, encoded }
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Success,
    /// Stopped at encrypt; no decrypt was attempted
    EncryptFailed { reason: String },
    /// Encrypt succeeded but decrypt or the comparison did not
    RoundTripFailed { reason: String },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, CycleOutcome::Success)
    }
}

/// One HTTP request issued during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRecord {
    pub endpoint: Endpoint,
    /// `None` when no response arrived
    pub elapsed: Option<Duration>,
    /// Transport error or status >= 400
    pub failed: bool,
}

/// Everything a finished cycle observed
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub checks: Vec<Check>,
    pub requests: Vec<RequestRecord>,
    pub encrypt_latency: Option<Duration>,
    pub decrypt_latency: Option<Duration>,
    /// Wall time of the cycle, think time excluded
    pub duration: Duration,
}

impl CycleReport {
    /// Apply the report to the registry
    ///
    /// Encrypt updates land before decrypt updates, and the `errors` rate
    /// sees exactly one observation per cycle.
    pub fn record(&self, metrics: &HsmMetrics) {
        for request in &self.requests {
            metrics.http_reqs.inc();
            if let Some(elapsed) = request.elapsed {
                metrics.http_req_duration.add_duration(elapsed);
            }
            metrics.http_req_failed.add(request.failed);
        }

        for check in &self.checks {
            metrics.record_check(&check.name, check.passed);
        }

        if let Some(latency) = self.encrypt_latency {
            metrics.encrypt_duration.add_duration(latency);
            metrics.total_operations.inc();
        }
        if let Some(latency) = self.decrypt_latency {
            metrics.decrypt_duration.add_duration(latency);
            metrics.total_operations.inc();
        }

        metrics.errors.add(self.outcome.is_failure());
        match self.outcome {
            CycleOutcome::Success => {}
            CycleOutcome::EncryptFailed { .. } => metrics.encrypt_failures.inc(),
            CycleOutcome::RoundTripFailed { .. } => metrics.roundtrip_failures.inc(),
        }

        metrics.iterations.inc();
        metrics.iteration_duration.add_duration(self.duration);
    }
}

/// Accumulates a report while the cycle runs
struct ReportBuilder {
    started: Instant,
    checks: Vec<Check>,
    requests: Vec<RequestRecord>,
    encrypt_latency: Option<Duration>,
    decrypt_latency: Option<Duration>,
}

impl ReportBuilder {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            checks: Vec::with_capacity(8),
            requests: Vec::with_capacity(3),
            encrypt_latency: None,
            decrypt_latency: None,
        }
    }

    fn response<T>(&mut self, endpoint: Endpoint, response: &ApiResponse<T>) {
        self.requests.push(RequestRecord {
            endpoint,
            elapsed: Some(response.elapsed),
            failed: response.is_error_status(),
        });
    }

    fn transport_error(&mut self, endpoint: Endpoint) {
        self.requests.push(RequestRecord {
            endpoint,
            elapsed: None,
            failed: true,
        });
    }

    fn finish(self, outcome: CycleOutcome) -> CycleReport {
        CycleReport {
            outcome,
            checks: self.checks,
            requests: self.requests,
            encrypt_latency: self.encrypt_latency,
            decrypt_latency: self.decrypt_latency,
            duration: self.started.elapsed(),
        }
    }
}

/// Executes request cycles against one service
#[derive(Clone)]
pub struct RequestCycle {
    client: Arc<dyn HsmClient>,
    context: String,
    payloads: Arc<[Payload]>,
    health_check_probability: f64,
}

impl RequestCycle {
    pub fn new(
        client: Arc<dyn HsmClient>,
        context: impl Into<String>,
        payloads: &[String],
        health_check_probability: f64,
    ) -> Result<Self, RunError> {
        if payloads.is_empty() {
            return Err(RunError::Scenario("at least one payload is required".to_string()));
        }
        if !(0.0..=1.0).contains(&health_check_probability) {
            return Err(RunError::Scenario(format!(
                "health check probability {} is outside [0, 1]",
                health_check_probability
            )));
        }

        Ok(Self {
            client,
            context: context.into(),
            payloads: payloads.iter().map(Payload::new).collect(),
            health_check_probability,
        })
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// Run one cycle and describe what happened
    pub async fn execute(&self, rng: &mut StdRng) -> CycleReport {
        let payload = &self.payloads[rng.random_range(0..self.payloads.len())];
        let probe_health = rng.random_bool(self.health_check_probability);

        let mut report = ReportBuilder::new();
        let outcome = self.round_trip(payload, &mut report).await;
        if probe_health {
            self.health(&mut report).await;
        }
        report.finish(outcome)
    }

    async fn round_trip(&self, payload: &Payload, report: &mut ReportBuilder) -> CycleOutcome {
        let request = EncryptRequest {
            context: self.context.clone(),
            plaintext: payload.encoded.clone(),
        };

        let response = match self.client.encrypt(&request).await {
            Ok(response) => response,
            Err(e) => {
                report.transport_error(Endpoint::Encrypt);
                let reason = e.to_string();
                warn!(error_kind = e.kind(), "Encrypt request failed: {}", reason);
                report.checks.extend([
                    Check::fail("encrypt: status 200", reason.clone()),
                    Check::fail("encrypt: has ciphertext", "no response"),
                    Check::fail("encrypt: has key_id", "no response"),
                ]);
                return CycleOutcome::EncryptFailed { reason };
            }
        };
        report.response(Endpoint::Encrypt, &response);

        let body = response.body.as_ref();
        let ciphertext = body.and_then(|body| body.ciphertext.as_ref());
        let key_id = body.and_then(|body| body.key_id.as_ref());
        let checks = [
            check::status_is("encrypt", response.status, 200),
            check::has_field("encrypt", "ciphertext", ciphertext),
            check::has_field("encrypt", "key_id", key_id),
        ];
        let encrypt_ok = check::all_passed(&checks);
        report.checks.extend(checks);

        let (ciphertext, key_id) = match (encrypt_ok, ciphertext, key_id) {
            (true, Some(ciphertext), Some(key_id)) => (ciphertext.clone(), key_id.clone()),
            _ => {
                let reason = failure_reason(&report.checks);
                warn!(
                    status = response.status,
                    body = %response.raw_excerpt(LOG_EXCERPT),
                    "Encrypt failed: {}",
                    reason
                );
                return CycleOutcome::EncryptFailed { reason };
            }
        };
        report.encrypt_latency = Some(response.elapsed);

        let request = DecryptRequest {
            context: self.context.clone(),
            ciphertext,
            key_id,
        };

        let response = match self.client.decrypt(&request).await {
            Ok(response) => response,
            Err(e) => {
                report.transport_error(Endpoint::Decrypt);
                let reason = e.to_string();
                warn!(error_kind = e.kind(), "Decrypt request failed: {}", reason);
                report.checks.extend([
                    Check::fail("decrypt: status 200", reason.clone()),
                    Check::fail("decrypt: has plaintext", "no response"),
                    Check::fail("decrypt: plaintext matches", "no response"),
                ]);
                return CycleOutcome::RoundTripFailed { reason };
            }
        };
        report.response(Endpoint::Decrypt, &response);

        let plaintext = response
            .body
            .as_ref()
            .and_then(|body| body.plaintext.as_ref());
        // Undecodable base64 compares as a mismatch
        let decoded = plaintext.map(|encoded| STANDARD.decode(encoded).unwrap_or_default());
        let checks = [
            check::status_is("decrypt", response.status, 200),
            check::has_field("decrypt", "plaintext", plaintext),
            check::matches("decrypt", "plaintext", decoded.as_deref(), payload.bytes()),
        ];
        let decrypt_ok = check::all_passed(&checks);
        report.checks.extend(checks);

        if !decrypt_ok {
            let reason = failure_reason(&report.checks);
            warn!(
                status = response.status,
                body = %response.raw_excerpt(LOG_EXCERPT),
                "Round trip failed: {}",
                reason
            );
            return CycleOutcome::RoundTripFailed { reason };
        }

        report.decrypt_latency = Some(response.elapsed);
        debug!(payload_len = payload.text.len(), "Round trip succeeded");
        CycleOutcome::Success
    }

    /// Probe `/health`; its checks never affect the cycle outcome
    async fn health(&self, report: &mut ReportBuilder) {
        match self.client.health().await {
            Ok(response) => {
                report.response(Endpoint::Health, &response);
                let status = response
                    .body
                    .as_ref()
                    .and_then(|body| body.status.as_deref());
                report.checks.extend([
                    check::status_is("health", response.status, 200),
                    check::value_is("health", "service ok", status, "ok"),
                ]);
            }
            Err(e) => {
                report.transport_error(Endpoint::Health);
                warn!(error_kind = e.kind(), "Health check failed: {}", e);
                report.checks.extend([
                    Check::fail("health: status 200", e.to_string()),
                    Check::fail("health: service ok", "no response"),
                ]);
            }
        }
    }
}

/// Names and details of the failed checks, joined for a log line
fn failure_reason(checks: &[Check]) -> String {
    checks
        .iter()
        .filter(|check| !check.passed)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
