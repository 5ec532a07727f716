//! Load generation engine for hsm-load
//!
//! A [`LoadTest`] owns a [`RampScheduler`] that spawns and stops virtual
//! users along the ramp profile. Each user runs [`RequestCycle`]s against
//! the service and records their reports into the shared metrics registry.
//! When the last user has stopped, the registry is snapshotted and the
//! thresholds are evaluated into a [`TestResult`](hsm_load_core::TestResult).

pub mod cycle;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod user;

// Re-export main types
pub use cycle::{CycleOutcome, CycleReport, Payload, RequestCycle, RequestRecord};
pub use error::RunError;
pub use metrics::HsmMetrics;
pub use runner::LoadTest;
pub use scheduler::{RampScheduler, ScheduleReport};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use user::{run_user, HsmUser, HsmUserFactory, UserExit, UserTokens, VirtualUser, VirtualUserFactory};
