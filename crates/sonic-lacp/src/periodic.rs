//! Periodic transmission machine.

use crate::port::PortRecord;
use crate::rx::expire;
use crate::state::PortState;
use crate::timers::TickClock;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodicState {
    NoPeriodic,
    FastPeriodic,
    SlowPeriodic,
    PeriodicTx,
}

impl fmt::Display for PeriodicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodicState::NoPeriodic => "NO_PERIODIC",
            PeriodicState::FastPeriodic => "FAST_PERIODIC",
            PeriodicState::SlowPeriodic => "SLOW_PERIODIC",
            PeriodicState::PeriodicTx => "PERIODIC_TX",
        };
        f.write_str(s)
    }
}

impl PortRecord {
    pub(crate) fn run_periodic_machine(&mut self, clock: &TickClock) {
        let last = self.periodic_state;
        let partner_short = self.partner_oper.state.contains(PortState::LACP_TIMEOUT);
        let anyone_active = self.actor_oper_state.contains(PortState::LACP_ACTIVITY)
            || self.partner_oper.state.contains(PortState::LACP_ACTIVITY);

        if self.vars.begin || !self.vars.lacp_enabled || !self.is_enabled || !anyone_active {
            self.periodic_state = Some(PeriodicState::NoPeriodic);
        } else if self.periodic_timer != 0 {
            if expire(&mut self.periodic_timer) {
                self.periodic_state = Some(PeriodicState::PeriodicTx);
            } else {
                match last {
                    Some(PeriodicState::FastPeriodic) if !partner_short => {
                        self.periodic_state = Some(PeriodicState::SlowPeriodic);
                    }
                    Some(PeriodicState::SlowPeriodic) if partner_short => {
                        // partner wants fast polling now, send right away
                        self.periodic_timer = 0;
                        self.periodic_state = Some(PeriodicState::PeriodicTx);
                    }
                    _ => {}
                }
            }
        } else {
            match last {
                Some(PeriodicState::NoPeriodic) => {
                    self.periodic_state = Some(PeriodicState::FastPeriodic);
                }
                Some(PeriodicState::PeriodicTx) => {
                    self.periodic_state = Some(if partner_short {
                        PeriodicState::FastPeriodic
                    } else {
                        PeriodicState::SlowPeriodic
                    });
                }
                _ => {}
            }
        }

        if self.periodic_state == last {
            return;
        }
        debug!(
            port = %self.id,
            from = ?last,
            to = ?self.periodic_state,
            "periodic machine transition"
        );
        match self.periodic_state {
            Some(PeriodicState::NoPeriodic) => self.periodic_timer = 0,
            Some(PeriodicState::FastPeriodic) => self.periodic_timer = clock.periodic(true),
            Some(PeriodicState::SlowPeriodic) => self.periodic_timer = clock.periodic(false),
            Some(PeriodicState::PeriodicTx) => self.ntt = true,
            None => {}
        }
    }
}
