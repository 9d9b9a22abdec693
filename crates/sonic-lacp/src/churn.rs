//! Churn detection. Purely diagnostic: the verdict never feeds back into
//! the other machines.

use crate::port::PortRecord;
use crate::rx::expire;
use crate::state::PortState;
use crate::timers::TickClock;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnState {
    #[default]
    Monitor,
    NoChurn,
    Churn,
}

impl fmt::Display for ChurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChurnState::Monitor => "CHURN_MONITOR",
            ChurnState::NoChurn => "NO_CHURN",
            ChurnState::Churn => "CHURN",
        };
        f.write_str(s)
    }
}

/// Watchdog for one side (actor or partner) of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChurnMonitor {
    pub state: ChurnState,
    #[serde(skip)]
    pub(crate) timer: u32,
    /// Times this side was found churning.
    pub count: u64,
}

impl ChurnMonitor {
    fn restart(&mut self, ticks: u32) {
        self.state = ChurnState::Monitor;
        self.timer = ticks;
    }

    /// Returns the new state when the watchdog fired on this pass.
    fn advance(&mut self, in_sync: bool) -> Option<ChurnState> {
        if !expire(&mut self.timer) || self.state != ChurnState::Monitor {
            return None;
        }
        if in_sync {
            self.state = ChurnState::NoChurn;
        } else {
            self.state = ChurnState::Churn;
            self.count += 1;
        }
        Some(self.state)
    }
}

impl PortRecord {
    pub(crate) fn run_churn_machine(&mut self, clock: &TickClock) {
        if self.vars.churned {
            self.vars.churned = false;
            self.actor_churn.restart(clock.churn());
            self.partner_churn.restart(clock.churn());
            return;
        }

        let actor_sync = self.actor_oper_state.contains(PortState::SYNCHRONIZATION);
        if let Some(state) = self.actor_churn.advance(actor_sync) {
            debug!(port = %self.id, %state, "actor churn verdict");
        }
        let partner_sync = self.partner_oper.state.contains(PortState::SYNCHRONIZATION);
        if let Some(state) = self.partner_churn.advance(partner_sync) {
            debug!(port = %self.id, %state, "partner churn verdict");
        }
    }
}
