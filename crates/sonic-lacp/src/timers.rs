//! Protocol timer constants and their conversion to group ticks.
//!
//! Every LACP timer is a plain down-counter advanced once per group tick.
//! [`TickClock`] converts the protocol durations into tick counts for the
//! configured tick resolution.

use std::time::Duration;

pub const FAST_PERIODIC_SECS: u32 = 1;
pub const SLOW_PERIODIC_SECS: u32 = 30;
pub const SHORT_TIMEOUT_SECS: u32 = 3;
pub const LONG_TIMEOUT_SECS: u32 = 90;
pub const CHURN_DETECTION_SECS: u32 = 60;
pub const AGGREGATE_WAIT_SECS: u32 = 2;
/// Grace period after group creation before ports may start distributing.
pub const AGGREGATOR_SELECTION_SECS: u32 = 8;
pub const MAX_TX_PER_SEC: u32 = 3;

/// Converts protocol durations to tick counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    ticks_per_sec: u32,
}

impl TickClock {
    pub fn new(ticks_per_sec: u16) -> Self {
        Self {
            ticks_per_sec: u32::from(ticks_per_sec.max(1)),
        }
    }

    pub const fn ticks_per_sec(&self) -> u32 {
        self.ticks_per_sec
    }

    /// Wall-clock period of one tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.ticks_per_sec))
    }

    /// Receive machine current-while timer.
    pub const fn current_while(&self, short_timeout: bool) -> u32 {
        if short_timeout {
            SHORT_TIMEOUT_SECS * self.ticks_per_sec
        } else {
            LONG_TIMEOUT_SECS * self.ticks_per_sec
        }
    }

    /// Periodic machine interval, minus the tick spent in PERIODIC_TX.
    pub fn periodic(&self, fast: bool) -> u32 {
        let secs = if fast { FAST_PERIODIC_SECS } else { SLOW_PERIODIC_SECS };
        (secs * self.ticks_per_sec).saturating_sub(1).max(1)
    }

    pub const fn churn(&self) -> u32 {
        CHURN_DETECTION_SECS * self.ticks_per_sec
    }

    /// Mux machine wait-while timer.
    pub const fn wait_while(&self) -> u32 {
        AGGREGATE_WAIT_SECS * self.ticks_per_sec
    }

    /// Ticks between two transmit opportunities.
    pub fn tx_interval(&self) -> u32 {
        (self.ticks_per_sec / MAX_TX_PER_SEC).max(1)
    }

    pub const fn aggregator_selection(&self) -> u32 {
        AGGREGATOR_SELECTION_SECS * self.ticks_per_sec
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(10)
    }
}
