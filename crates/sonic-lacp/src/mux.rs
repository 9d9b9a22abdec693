//! Mux machine: attaches a selected port to its aggregator and gates
//! collecting/distributing.

use crate::group::Group;
use crate::port::PortId;
use crate::rx::expire;
use crate::state::PortState;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxState {
    Detached,
    Waiting,
    Attached,
    CollectingDistributing,
}

impl fmt::Display for MuxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MuxState::Detached => "DETACHED",
            MuxState::Waiting => "WAITING",
            MuxState::Attached => "ATTACHED",
            MuxState::CollectingDistributing => "COLLECTING_DISTRIBUTING",
        };
        f.write_str(s)
    }
}

impl Group {
    pub(crate) fn run_mux_machine(&mut self, id: PortId) {
        let agg_active = self.port_aggregator_is_active(id);
        let selection_settled = self.agg_select_timer == 0;
        let Some(port) = self.ports.get_mut(&id) else {
            return;
        };
        let last = port.mux_state;
        let selected = port.vars.selected;
        let standby = port.vars.standby;
        let partner_sync = port.partner_oper.state.contains(PortState::SYNCHRONIZATION);
        let agg = port.aggregator;

        if port.vars.begin {
            port.mux_state = Some(MuxState::Detached);
        } else {
            match last.unwrap_or(MuxState::Detached) {
                MuxState::Detached => {
                    if selected || standby {
                        port.mux_state = Some(MuxState::Waiting);
                    }
                }
                MuxState::Waiting => {
                    if !selected {
                        port.vars.ready_n = false;
                        self.refresh_ready(agg);
                        self.set_mux_state(id, MuxState::Detached);
                    } else {
                        if expire(&mut port.mux_timer) {
                            port.vars.ready_n = true;
                        }
                        self.refresh_ready(agg);
                        if let Some(port) = self.ports.get_mut(&id) {
                            if port.vars.ready && port.mux_timer == 0 {
                                port.mux_state = Some(MuxState::Attached);
                            }
                        }
                    }
                }
                MuxState::Attached => {
                    if selected && partner_sync && selection_settled {
                        if agg_active {
                            port.mux_state = Some(MuxState::CollectingDistributing);
                        }
                    } else if !selected || standby {
                        port.vars.ready_n = false;
                        self.refresh_ready(agg);
                        self.set_mux_state(id, MuxState::Detached);
                    } else if agg_active {
                        // optimistic sync so the partner can converge on us
                        port.actor_oper_state.insert(PortState::SYNCHRONIZATION);
                    }
                }
                MuxState::CollectingDistributing => {
                    let actor_sync = port.actor_oper_state.contains(PortState::SYNCHRONIZATION);
                    if !selected || standby || !partner_sync || !actor_sync {
                        port.mux_state = Some(MuxState::Attached);
                    } else if agg_active && !port.forwarding {
                        self.enable_port(id);
                    }
                }
            }
        }

        let current = self.ports.get(&id).and_then(|port| port.mux_state);
        if current == last {
            return;
        }
        debug!(port = %id, from = ?last, to = ?current, "mux machine transition");

        match current {
            Some(MuxState::Detached) => {
                self.update_port(id, |port| {
                    port.actor_oper_state.remove(PortState::SYNCHRONIZATION);
                });
                self.disable_collecting_distributing(id);
                self.update_port(id, |port| {
                    port.actor_oper_state
                        .remove(PortState::COLLECTING | PortState::DISTRIBUTING);
                    port.ntt = true;
                });
            }
            Some(MuxState::Waiting) => {
                let ticks = self.clock.wait_while();
                self.update_port(id, |port| port.mux_timer = ticks);
            }
            Some(MuxState::Attached) => {
                self.update_port(id, |port| {
                    port.actor_oper_state
                        .set(PortState::SYNCHRONIZATION, agg_active);
                    port.actor_oper_state
                        .remove(PortState::COLLECTING | PortState::DISTRIBUTING);
                });
                self.disable_collecting_distributing(id);
                self.update_port(id, |port| port.ntt = true);
            }
            Some(MuxState::CollectingDistributing) => {
                self.update_port(id, |port| {
                    port.actor_oper_state.insert(
                        PortState::COLLECTING
                            | PortState::DISTRIBUTING
                            | PortState::SYNCHRONIZATION,
                    );
                });
                if agg_active {
                    self.enable_port(id);
                }
                self.update_port(id, |port| port.ntt = true);
            }
            None => {}
        }
    }

    fn set_mux_state(&mut self, id: PortId, state: MuxState) {
        self.update_port(id, |port| port.mux_state = Some(state));
    }

    /// Stops forwarding, but only once a partner has answered for the
    /// aggregator; individual links keep carrying traffic.
    fn disable_collecting_distributing(&mut self, id: PortId) {
        let has_partner = self
            .ports
            .get(&id)
            .and_then(|port| port.aggregator)
            .and_then(|agg| self.aggregators.get(&agg))
            .is_some_and(|agg| agg.has_partner());
        if has_partner {
            self.disable_port(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorId;
    use crate::config::{LacpConfig, PortConfig};
    use crate::transport::NullTransport;
    use pretty_assertions::assert_eq;
    use sonic_types::{LinkSpeed, MacAddress};
    use std::sync::Arc;

    fn group(ticks_per_sec: u16) -> Group {
        let config = LacpConfig {
            ticks_per_sec,
            ..Default::default()
        };
        Group::new(
            "PortChannel1",
            MacAddress::new([2, 0, 0, 0, 0, 0xaa]),
            config,
            Arc::new(NullTransport),
        )
        .unwrap()
    }

    fn bind(group: &mut Group, n: u8) -> PortId {
        let config = PortConfig::new(format!("Ethernet{}", n), MacAddress::new([2, 0, 0, 0, 1, n]))
            .with_speed(LinkSpeed::Gbps1);
        group.bind_port(config).unwrap()
    }

    #[test]
    fn test_waiting_holds_for_wait_while() {
        let mut g = group(1);
        let id = bind(&mut g, 0);
        g.update_port(id, |port| {
            port.vars.begin = false;
            port.vars.selected = true;
            port.mux_state = Some(MuxState::Detached);
        });
        g.run_mux_machine(id);
        assert_eq!(g.port(id).unwrap().mux_state(), Some(MuxState::Waiting));
        assert_eq!(g.port(id).unwrap().mux_timer, 2);

        // another member already reports READY, we still have to wait
        g.update_port(id, |port| port.vars.ready = true);
        g.run_mux_machine(id);
        assert_eq!(g.port(id).unwrap().mux_state(), Some(MuxState::Waiting));

        g.run_mux_machine(id);
        assert_eq!(g.port(id).unwrap().mux_state(), Some(MuxState::Attached));
    }

    #[test]
    fn test_unselected_port_returns_to_detached() {
        let mut g = group(10);
        let id = bind(&mut g, 0);
        g.update_port(id, |port| {
            port.vars.begin = false;
            port.vars.selected = false;
            port.vars.ready_n = true;
            port.mux_state = Some(MuxState::Waiting);
            port.actor_oper_state.insert(PortState::COLLECTING);
        });
        g.run_mux_machine(id);

        let port = g.port(id).unwrap();
        assert_eq!(port.mux_state(), Some(MuxState::Detached));
        assert!(!port.vars.ready_n);
        assert!(!port.actor_state().contains(PortState::COLLECTING));
        assert!(port.ntt());
    }

    #[test]
    fn test_attached_waits_for_grace_timer() {
        let mut g = group(10);
        let id = bind(&mut g, 0);
        let agg = AggregatorId::new(1);
        g.update_port(id, |port| {
            port.vars.begin = false;
            port.vars.selected = true;
            port.aggregator = Some(agg);
            port.mux_state = Some(MuxState::Attached);
            port.partner_oper.state.insert(PortState::SYNCHRONIZATION);
        });
        if let Some(a) = g.aggregators.get_mut(&agg) {
            a.ports = vec![id];
            a.is_active = true;
        }

        g.run_mux_machine(id);
        assert_eq!(g.port(id).unwrap().mux_state(), Some(MuxState::Attached));

        g.agg_select_timer = 0;
        g.run_mux_machine(id);
        let port = g.port(id).unwrap();
        assert_eq!(port.mux_state(), Some(MuxState::CollectingDistributing));
        assert!(port.actor_state().contains(PortState::DISTRIBUTING));
        assert!(port.is_forwarding());
    }
}
