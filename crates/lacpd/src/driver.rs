//! Periodic tick source for one group.

use sonic_lacp::GroupHandle;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs [`GroupHandle::tick`] at a fixed period until cancelled, or until an
/// optional tick budget is used up.
#[derive(Debug, Clone)]
pub struct GroupTickDriver {
    handle: GroupHandle,
    period: Duration,
    budget: Option<u64>,
}

impl GroupTickDriver {
    pub fn new(handle: GroupHandle, period: Duration) -> Self {
        Self {
            handle,
            period,
            budget: None,
        }
    }

    /// Stop after `ticks` ticks.
    pub fn with_budget(mut self, ticks: Option<u64>) -> Self {
        self.budget = ticks;
        self
    }

    /// Returns the number of ticks run.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let name = self.handle.with(|group| group.name().to_string());
        let mut ticker = interval(self.period);
        // a late tick shifts the schedule instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(group = %name, period = ?self.period, "tick driver started");

        let mut ticks = 0u64;
        loop {
            if self.budget.is_some_and(|budget| ticks >= budget) {
                debug!(group = %name, ticks, "tick budget used up");
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.handle.tick();
                    ticks += 1;
                }
            }
        }
        info!(group = %name, ticks, "tick driver stopped");
        ticks
    }
}
