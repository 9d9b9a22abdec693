//! Receive machine.
//!
//! Consumes LACPDUs (or the absence of one on a tick) and maintains the
//! partner view, the MATCHED and SELECTED variables and the current-while
//! timer.

use crate::pdu::{LacpInfo, Lacpdu};
use crate::port::{PartnerInfo, PortRecord};
use crate::state::PortState;
use crate::timers::TickClock;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RxState {
    Initialize,
    PortDisabled,
    LacpDisabled,
    Expired,
    Defaulted,
    Current,
}

impl fmt::Display for RxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RxState::Initialize => "INITIALIZE",
            RxState::PortDisabled => "PORT_DISABLED",
            RxState::LacpDisabled => "LACP_DISABLED",
            RxState::Expired => "EXPIRED",
            RxState::Defaulted => "DEFAULTED",
            RxState::Current => "CURRENT",
        };
        f.write_str(s)
    }
}

impl PartnerInfo {
    fn from_pdu(info: &LacpInfo) -> Self {
        Self {
            system: info.system,
            system_priority: info.system_priority,
            key: info.key,
            port_number: info.port,
            port_priority: info.port_priority,
            state: info.state,
        }
    }
}

/// Decrements a running timer. True only on the tick it reaches zero.
pub(crate) fn expire(timer: &mut u32) -> bool {
    if *timer == 0 {
        return false;
    }
    *timer -= 1;
    *timer == 0
}

impl PortRecord {
    /// Runs one pass of the receive machine. `pdu` is `Some` when an
    /// LACPDU arrived for this port.
    pub(crate) fn run_rx_machine(&mut self, pdu: Option<&Lacpdu>, clock: &TickClock) {
        let last = self.rx_state;

        if self.vars.begin {
            self.rx_state = Some(RxState::Initialize);
            self.vars.churned = true;
        } else if !self.is_enabled {
            self.rx_state = Some(RxState::PortDisabled);
        } else if pdu.is_some()
            && matches!(
                last,
                Some(RxState::Expired | RxState::Defaulted | RxState::Current)
            )
        {
            if last != Some(RxState::Current) {
                self.vars.churned = true;
            }
            self.rx_timer = 0;
            self.rx_state = Some(RxState::Current);
        } else if expire(&mut self.rx_timer) {
            match last {
                Some(RxState::Expired) => self.rx_state = Some(RxState::Defaulted),
                Some(RxState::Current) => self.rx_state = Some(RxState::Expired),
                _ => {}
            }
        } else if last == Some(RxState::PortDisabled) {
            self.rx_state = Some(if self.vars.lacp_enabled {
                RxState::Expired
            } else {
                RxState::LacpDisabled
            });
        }

        if self.rx_state == last && pdu.is_none() {
            return;
        }
        if self.rx_state != last {
            debug!(
                port = %self.id,
                from = ?last,
                to = ?self.rx_state,
                "rx machine transition"
            );
        }

        match self.rx_state {
            Some(RxState::Initialize) => {
                self.vars.lacp_enabled = self.is_full_duplex_key();
                self.vars.selected = false;
                self.record_default();
                self.actor_oper_state.remove(PortState::EXPIRED);
                self.rx_state = Some(RxState::PortDisabled);
                self.vars.matched = false;
            }
            Some(RxState::PortDisabled) => {
                self.vars.matched = false;
            }
            Some(RxState::LacpDisabled) => {
                self.vars.selected = false;
                self.record_default();
                self.partner_oper.state.remove(PortState::AGGREGATION);
                self.vars.matched = true;
                self.actor_oper_state.remove(PortState::EXPIRED);
            }
            Some(RxState::Expired) => {
                self.partner_oper.state.remove(PortState::SYNCHRONIZATION);
                self.vars.matched = false;
                self.partner_oper
                    .state
                    .insert(PortState::LACP_TIMEOUT | PortState::LACP_ACTIVITY);
                self.rx_timer = clock.current_while(true);
                self.actor_oper_state.insert(PortState::EXPIRED);
                self.vars.churned = true;
            }
            Some(RxState::Defaulted) => {
                self.update_default_selected();
                self.record_default();
                self.vars.matched = true;
                self.actor_oper_state.remove(PortState::EXPIRED);
            }
            Some(RxState::Current) => {
                if let Some(pdu) = pdu {
                    self.update_selected(pdu);
                    self.update_ntt(pdu);
                    self.record_pdu(pdu);
                }
                let short = self.actor_oper_state.contains(PortState::LACP_TIMEOUT);
                self.rx_timer = clock.current_while(short);
                self.actor_oper_state.remove(PortState::EXPIRED);
            }
            None => {}
        }
    }

    /// Loads the administrative partner defaults.
    pub(crate) fn record_default(&mut self) {
        self.partner_oper = self.partner_admin;
        self.actor_oper_state.insert(PortState::DEFAULTED);
    }

    fn record_pdu(&mut self, pdu: &Lacpdu) {
        self.choose_matched(pdu);
        self.partner_oper = PartnerInfo::from_pdu(&pdu.actor);
        self.actor_oper_state.remove(PortState::DEFAULTED);

        let in_sync = self.vars.matched && pdu.actor.state.contains(PortState::SYNCHRONIZATION);
        self.partner_oper
            .state
            .set(PortState::SYNCHRONIZATION, in_sync);
    }

    /// Does the partner's view of us equal what we are, or is the partner
    /// an individual link?
    fn choose_matched(&mut self, pdu: &Lacpdu) {
        let echo = &pdu.partner;
        let echoes_us = echo.port == self.id.number()
            && echo.port_priority == self.actor_port_priority
            && echo.system == self.actor_system
            && echo.system_priority == self.actor_system_priority
            && echo.key == self.actor_oper_key
            && echo.state.agrees(self.actor_oper_state, PortState::AGGREGATION);
        let individual = !pdu.actor.state.contains(PortState::AGGREGATION);

        self.vars.matched = echoes_us || individual;
    }

    fn update_selected(&mut self, pdu: &Lacpdu) {
        if !PartnerInfo::from_pdu(&pdu.actor).same_identity(&self.partner_oper) {
            self.vars.selected = false;
        }
    }

    fn update_default_selected(&mut self) {
        if !self.partner_admin.same_identity(&self.partner_oper) {
            self.vars.selected = false;
        }
    }

    /// Requests a transmission when the partner's record of us is stale.
    fn update_ntt(&mut self, pdu: &Lacpdu) {
        let echo = &pdu.partner;
        let stale_bits = PortState::LACP_ACTIVITY
            | PortState::LACP_TIMEOUT
            | PortState::SYNCHRONIZATION
            | PortState::AGGREGATION;
        let stale = echo.port != self.id.number()
            || echo.port_priority != self.actor_port_priority
            || echo.system != self.actor_system
            || echo.system_priority != self.actor_system_priority
            || echo.key != self.actor_oper_key
            || !echo.state.agrees(self.actor_oper_state, stale_bits);
        if stale {
            self.ntt = true;
        }
    }
}
