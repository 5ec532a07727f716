//! Run abort coordination
//!
//! An abort escalates in two steps. The first request is graceful: the ramp
//! target drops to zero and users finish their in-flight iteration. The
//! second is forced: in-flight iterations are dropped unrecorded.

use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Abort levels with escalating urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Stop ramping and let in-flight iterations complete
    Graceful,
    /// Drop in-flight iterations
    Forced,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Forced => write!(f, "forced"),
        }
    }
}

/// Shared abort state of one run
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    graceful: CancellationToken,
    forced: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the abort level; lower levels than the current one are ignored
    pub fn trigger(&self, signal: ShutdownSignal) {
        match signal {
            ShutdownSignal::Graceful => {
                if !self.graceful.is_cancelled() {
                    info!("Abort requested, ramping down");
                }
                self.graceful.cancel();
            }
            ShutdownSignal::Forced => {
                if !self.forced.is_cancelled() {
                    warn!("Forced abort, dropping in-flight iterations");
                }
                self.graceful.cancel();
                self.forced.cancel();
            }
        }
    }

    /// Escalate one level from the current state
    pub fn escalate(&self) -> ShutdownSignal {
        let signal = if self.graceful.is_cancelled() {
            ShutdownSignal::Forced
        } else {
            ShutdownSignal::Graceful
        };
        self.trigger(signal);
        signal
    }

    pub fn is_aborted(&self) -> bool {
        self.graceful.is_cancelled()
    }

    pub fn is_forced(&self) -> bool {
        self.forced.is_cancelled()
    }

    /// Fires on the first abort request
    pub fn graceful_token(&self) -> &CancellationToken {
        &self.graceful
    }

    /// Fires when the abort is forced
    pub fn forced_token(&self) -> &CancellationToken {
        &self.forced
    }

    /// Escalate on every Ctrl-C until the returned task is aborted
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let signal = coordinator.escalate();
                if signal == ShutdownSignal::Forced {
                    break;
                }
            }
        })
    }
}
