//! Ramp scheduler
//!
//! Drives the live user count along a [`RampProfile`]. Once per tick the
//! interpolated target is computed and users are spawned or asked to stop
//! until the live count matches it. Users asked to stop are no longer live;
//! they finish their in-flight iteration in the background.

use hsm_load_core::{RampProfile, TickSample};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::shutdown::ShutdownCoordinator;
use crate::user::{run_user, UserExit, UserTokens, VirtualUserFactory};

/// What the scheduler observed over a run
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleReport {
    pub timeline: Vec<TickSample>,
    pub vus_max: u32,
    /// Until the last user terminated
    pub duration: Duration,
    pub aborted: bool,
    /// Users whose in-flight iteration was dropped
    pub forced_stops: u32,
    /// Iterations completed across all users
    pub iterations: u64,
}

struct LiveUser {
    slot: u32,
    stop: CancellationToken,
}

/// Users spawned by the scheduler, live and stopping
struct UserPool<'a, F: VirtualUserFactory> {
    factory: &'a F,
    graceful_stop: Duration,
    kill: CancellationToken,
    live: VecDeque<LiveUser>,
    tasks: JoinSet<UserExit>,
    next_slot: u32,
    forced_stops: u32,
    iterations: u64,
}

impl<'a, F: VirtualUserFactory> UserPool<'a, F> {
    fn live(&self) -> u32 {
        self.live.len() as u32
    }

    /// Spawn or stop users until exactly `target` are live
    fn converge(&mut self, target: u32) {
        while self.live() < target {
            let slot = self.next_slot;
            self.next_slot += 1;

            let stop = CancellationToken::new();
            let tokens = UserTokens {
                stop: stop.clone(),
                kill: self.kill.clone(),
            };
            let user = self.factory.create(slot);
            self.tasks.spawn(run_user(slot, user, tokens, self.graceful_stop));
            self.live.push_back(LiveUser { slot, stop });
        }

        // Oldest users are stopped first
        while self.live() > target {
            if let Some(user) = self.live.pop_front() {
                debug!(slot = user.slot, "Stopping virtual user");
                user.stop.cancel();
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.on_exit(result);
        }
    }

    fn on_exit(&mut self, result: Result<UserExit, JoinError>) {
        match result {
            Ok(exit) => {
                self.iterations += exit.iterations;
                if exit.forced {
                    self.forced_stops += 1;
                }
            }
            Err(e) => error!("Virtual user task failed: {}", e),
        }
    }

    /// Stop every user and wait for all of them to terminate
    async fn drain(&mut self) {
        for user in self.live.drain(..) {
            user.stop.cancel();
        }
        while let Some(result) = self.tasks.join_next().await {
            self.on_exit(result);
        }
    }
}

/// Keeps the live user count on the ramp profile
#[derive(Debug, Clone)]
pub struct RampScheduler {
    profile: RampProfile,
    tick: Duration,
    graceful_stop: Duration,
}

impl RampScheduler {
    pub fn new(profile: RampProfile) -> Self {
        Self {
            profile,
            tick: Duration::from_secs(1),
            graceful_stop: Duration::from_secs(35),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn profile(&self) -> &RampProfile {
        &self.profile
    }

    /// Run the profile to completion, or until aborted
    ///
    /// Returns once every user has terminated.
    pub async fn run<F: VirtualUserFactory>(
        &self,
        factory: &F,
        shutdown: &ShutdownCoordinator,
    ) -> ScheduleReport {
        let total = self.profile.total_duration();
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pool = UserPool {
            factory,
            graceful_stop: self.graceful_stop,
            kill: shutdown.forced_token().child_token(),
            live: VecDeque::new(),
            tasks: JoinSet::new(),
            next_slot: 0,
            forced_stops: 0,
            iterations: 0,
        };
        let mut timeline = Vec::new();
        let mut vus_max = 0;
        let mut stage = None;

        info!(
            stages = self.profile.stages().len(),
            peak = self.profile.peak(),
            "Starting ramp over {:?}",
            total
        );

        let aborted = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.graceful_token().cancelled() => {}
            }

            let elapsed = started.elapsed();
            let aborted = shutdown.is_aborted();
            let target = if aborted { 0 } else { self.profile.target_at(elapsed) };

            pool.reap_finished();
            pool.converge(target);

            let live = pool.live();
            vus_max = vus_max.max(live);
            timeline.push(TickSample {
                elapsed,
                target,
                live,
            });

            let current = self.profile.stage_index_at(elapsed);
            if current != stage {
                if let Some(index) = current {
                    let next = &self.profile.stages()[index];
                    info!(
                        stage = index + 1,
                        target = next.target,
                        "Entering stage over {:?}",
                        next.duration
                    );
                }
                stage = current;
            }

            if aborted {
                break true;
            }
            if elapsed >= total {
                break false;
            }
        };

        let stopping = pool.tasks.len();
        info!(stopping, "Ramp finished, waiting for users to stop");
        pool.drain().await;

        let duration = started.elapsed();
        timeline.push(TickSample {
            elapsed: duration,
            target: 0,
            live: 0,
        });

        info!(
            iterations = pool.iterations,
            forced_stops = pool.forced_stops,
            "All virtual users stopped after {:?}",
            duration
        );

        ScheduleReport {
            timeline,
            vus_max,
            duration,
            aborted,
            forced_stops: pool.forced_stops,
            iterations: pool.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownSignal;
    use crate::user::VirtualUser;
    use async_trait::async_trait;
    use hsm_load_core::Stage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Tracks how many users are currently running
    struct TrackedUser {
        iteration: Duration,
        running: Arc<AtomicU32>,
    }

    impl Drop for TrackedUser {
        fn drop(&mut self) {
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl VirtualUser for TrackedUser {
        async fn run_iteration(&mut self) {
            tokio::time::sleep(self.iteration).await;
        }

        fn pacing(&mut self) -> Duration {
            Duration::from_millis(700)
        }
    }

    struct TrackedFactory {
        iteration: Duration,
        running: Arc<AtomicU32>,
    }

    impl TrackedFactory {
        fn new(iteration: Duration) -> Self {
            Self {
                iteration,
                running: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl VirtualUserFactory for TrackedFactory {
        type User = TrackedUser;

        fn create(&self, _slot: u32) -> TrackedUser {
            self.running.fetch_add(1, Ordering::SeqCst);
            TrackedUser {
                iteration: self.iteration,
                running: self.running.clone(),
            }
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn quick_profile() -> RampProfile {
        RampProfile::new(
            0,
            vec![
                Stage::new(secs(30), 10),
                Stage::new(secs(60), 20),
                Stage::new(secs(30), 0),
            ],
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_profile_converges_every_tick() {
        let profile = quick_profile();
        let scheduler = RampScheduler::new(profile.clone());
        let factory = TrackedFactory::new(Duration::from_millis(150));

        let report = scheduler.run(&factory, &ShutdownCoordinator::new()).await;

        let (last, ticks) = report.timeline.split_last().unwrap();
        for sample in ticks {
            assert_eq!(sample.target, profile.target_at(sample.elapsed), "{:?}", sample);
            assert_eq!(sample.live, sample.target, "{:?}", sample);
        }
        assert_eq!(ticks.len(), 121);
        assert_eq!(last.live, 0);

        assert!(!report.aborted);
        assert_eq!(report.vus_max, 20);
        assert_eq!(report.forced_stops, 0);
        assert!(report.iterations > 0);
        assert!(report.duration >= secs(120) && report.duration < secs(122), "{:?}", report.duration);
        assert_eq!(factory.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_boundaries_hit_exact_targets() {
        let profile = quick_profile();
        let report = RampScheduler::new(profile)
            .run(&TrackedFactory::new(Duration::from_millis(50)), &ShutdownCoordinator::new())
            .await;

        let at = |s: u64| {
            report
                .timeline
                .iter()
                .find(|sample| sample.elapsed == secs(s))
                .copied()
                .unwrap()
        };
        assert_eq!(at(30).live, 10);
        assert_eq!(at(90).live, 20);
        assert_eq!(at(120).live, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_ramps_down_gracefully() {
        let shutdown = ShutdownCoordinator::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(secs(45)).await;
            trigger.trigger(ShutdownSignal::Graceful);
        });

        let factory = TrackedFactory::new(Duration::from_secs(2));
        let report = RampScheduler::new(quick_profile()).run(&factory, &shutdown).await;

        assert!(report.aborted);
        assert_eq!(report.forced_stops, 0);
        assert!(report.duration >= secs(45) && report.duration <= secs(48), "{:?}", report.duration);
        let abort_tick = &report.timeline[report.timeline.len() - 2];
        assert_eq!(abort_tick.target, 0);
        assert_eq!(abort_tick.live, 0);
        assert_eq!(factory.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_iterations_are_forced_after_graceful_stop() {
        let profile = RampProfile::new(2, vec![Stage::new(secs(10), 2)]).unwrap();
        let factory = TrackedFactory::new(secs(60));

        let report = RampScheduler::new(profile)
            .with_graceful_stop(secs(5))
            .run(&factory, &ShutdownCoordinator::new())
            .await;

        assert_eq!(report.forced_stops, 2);
        assert_eq!(report.iterations, 0);
        assert!(report.duration >= secs(15) && report.duration <= secs(16), "{:?}", report.duration);
        assert_eq!(factory.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_abort_kills_in_flight_iterations() {
        let shutdown = ShutdownCoordinator::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(secs(20)).await;
            trigger.trigger(ShutdownSignal::Forced);
        });

        let profile = RampProfile::new(3, vec![Stage::new(secs(60), 3)]).unwrap();
        let report = RampScheduler::new(profile)
            .run(&TrackedFactory::new(secs(600)), &shutdown)
            .await;

        assert!(report.aborted);
        assert_eq!(report.forced_stops, 3);
        assert!(report.duration < secs(21));
    }
}
