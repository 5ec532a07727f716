//! Virtual users: the unit of concurrency the scheduler spawns and stops

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cycle::RequestCycle;
use crate::metrics::HsmMetrics;

/// A simulated client running iterations in a loop
#[async_trait]
pub trait VirtualUser: Send + 'static {
    /// Run one iteration and record its outcome
    async fn run_iteration(&mut self);

    /// Pause before the next iteration
    fn pacing(&mut self) -> Duration;
}

/// Produces the user for a scheduler slot
pub trait VirtualUserFactory: Send + Sync + 'static {
    type User: VirtualUser;

    fn create(&self, slot: u32) -> Self::User;
}

/// Cancellation tokens handed to one running user
#[derive(Debug, Clone)]
pub struct UserTokens {
    /// Finish the in-flight iteration, then exit
    pub stop: CancellationToken,
    /// Drop the in-flight iteration and exit now
    pub kill: CancellationToken,
}

/// How a user task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserExit {
    pub slot: u32,
    pub iterations: u64,
    /// Its last iteration was dropped unrecorded
    pub forced: bool,
}

/// Drive `user` until it is stopped
///
/// The stop token is only honoured between iterations. An iteration still in
/// flight `graceful_stop` after a stop was requested, or when the kill token
/// fires, is dropped and records nothing. Configuration keeps `graceful_stop`
/// past the request timeouts of a whole cycle, so a ramp-down only drops a
/// cycle whose requests have all outlived them.
pub async fn run_user<U: VirtualUser>(
    slot: u32,
    mut user: U,
    tokens: UserTokens,
    graceful_stop: Duration,
) -> UserExit {
    let mut iterations = 0u64;

    loop {
        if tokens.stop.is_cancelled() || tokens.kill.is_cancelled() {
            break;
        }

        let overdue = async {
            tokens.stop.cancelled().await;
            tokio::time::sleep(graceful_stop).await;
        };

        tokio::select! {
            biased;
            _ = tokens.kill.cancelled() => {
                return UserExit { slot, iterations, forced: true };
            }
            _ = overdue => {
                debug!(slot, "Iteration exceeded graceful stop, dropping it");
                return UserExit { slot, iterations, forced: true };
            }
            _ = user.run_iteration() => {
                iterations += 1;
            }
        }

        let pause = user.pacing();
        tokio::select! {
            _ = tokens.stop.cancelled() => break,
            _ = tokens.kill.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    UserExit {
        slot,
        iterations,
        forced: false,
    }
}

/// Virtual user running request cycles against the service
pub struct HsmUser {
    cycle: RequestCycle,
    metrics: HsmMetrics,
    rng: StdRng,
    think_min: Duration,
    think_max: Duration,
}

impl HsmUser {
    pub fn new(
        cycle: RequestCycle,
        metrics: HsmMetrics,
        rng: StdRng,
        think_time: (Duration, Duration),
    ) -> Self {
        Self {
            cycle,
            metrics,
            rng,
            think_min: think_time.0,
            think_max: think_time.1,
        }
    }
}

#[async_trait]
impl VirtualUser for HsmUser {
    async fn run_iteration(&mut self) {
        let report = self.cycle.execute(&mut self.rng).await;
        report.record(&self.metrics);
    }

    fn pacing(&mut self) -> Duration {
        think_time(&mut self.rng, self.think_min, self.think_max)
    }
}

/// Uniform draw from `[min, max]`
pub fn think_time(rng: &mut StdRng, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let nanos = |d: Duration| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rng.random_range(nanos(min)..=nanos(max)))
}

/// Builds [`HsmUser`]s sharing one cycle and one registry
#[derive(Clone)]
pub struct HsmUserFactory {
    cycle: RequestCycle,
    metrics: HsmMetrics,
    think_time: (Duration, Duration),
    seed: Option<u64>,
}

impl HsmUserFactory {
    pub fn new(cycle: RequestCycle, metrics: HsmMetrics, think_time: (Duration, Duration)) -> Self {
        Self {
            cycle,
            metrics,
            think_time,
            seed: None,
        }
    }

    /// Derive each user's generator from `seed` and its slot
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn metrics(&self) -> &HsmMetrics {
        &self.metrics
    }
}

impl VirtualUserFactory for HsmUserFactory {
    type User = HsmUser;

    fn create(&self, slot: u32) -> HsmUser {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(slot))),
            None => StdRng::from_os_rng(),
        };
        HsmUser::new(self.cycle.clone(), self.metrics.clone(), rng, self.think_time)
    }
}
