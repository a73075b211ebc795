//! Simulation clock.
//!
//! [`Environment`] measures simulated time from its creation and suspends
//! processes for simulated delays. It is backed by tokio's timer, so with a
//! paused runtime clock (`tokio::time::pause`, or `start_paused` in tests)
//! delays complete instantly in wall-clock terms while preserving their
//! relative order.

use std::time::Duration;

use tokio::time::Instant;

/// The clock shared by every process of a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    /// Instant the simulation started.
    epoch: Instant,
}

impl Environment {
    /// Create a clock starting at time zero now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Simulated time elapsed since the start of the run.
    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Suspend the calling process for `delay` of simulated time.
    pub async fn timeout(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Suspend the calling process until simulated time `at`.
    ///
    /// Returns immediately if `at` is already in the past.
    pub async fn timeout_until(&self, at: Duration) {
        self.timeout(at.saturating_sub(self.now())).await;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
