//! Port-to-aggregator selection.

use crate::aggregator::AggregatorId;
use crate::group::Group;
use crate::port::PortId;
use crate::state::PortState;
use tracing::{debug, error, warn};

impl Group {
    /// Attaches an unselected port to a matching aggregator, or to a free
    /// one initialised from the port. Retried every tick until it succeeds.
    pub(crate) fn run_port_selection(&mut self, id: PortId) {
        let Some(port) = self.ports.get(&id) else {
            return;
        };
        if port.vars.selected {
            return;
        }
        let previous = port.aggregator;
        let oper_key = port.actor_oper_key;
        let admin_key = port.actor_admin_key;
        let partner = port.partner_oper;
        let individual = !port.is_full_duplex_key();

        if let Some(old) = previous {
            self.detach_from(id, old);
        }

        let mut free = None;
        let mut found = None;
        for agg in self.aggregators.values() {
            if agg.is_free() {
                free.get_or_insert(agg.id);
                continue;
            }
            let same_link = agg.actor_oper_key == oper_key
                && agg.partner_system == partner.system
                && agg.partner_system_priority == partner.system_priority
                && agg.partner_oper_key == partner.key;
            if same_link && !partner.system.is_zero() && !agg.is_individual {
                found = Some(agg.id);
                break;
            }
        }

        let chosen = match (found, free) {
            (Some(agg_id), _) => {
                if let Some(agg) = self.aggregators.get_mut(&agg_id) {
                    agg.ports.push(id);
                }
                debug!(port = %id, aggregator = %agg_id, "port joined existing aggregator");
                agg_id
            }
            (None, Some(agg_id)) => {
                if let Some(agg) = self.aggregators.get_mut(&agg_id) {
                    agg.is_individual = individual;
                    agg.actor_admin_key = admin_key;
                    agg.actor_oper_key = oper_key;
                    agg.partner_system = partner.system;
                    agg.partner_system_priority = partner.system_priority;
                    agg.partner_oper_key = partner.key;
                    agg.ports = vec![id];
                }
                debug!(port = %id, aggregator = %agg_id, "port opened new aggregator");
                agg_id
            }
            (None, None) => {
                error!(port = %id, "did not find a suitable aggregator");
                return;
            }
        };

        self.update_port(id, |port| {
            port.aggregator = Some(chosen);
            port.vars.selected = true;
        });
        self.refresh_ready(Some(chosen));
        self.run_agg_selection();

        if !self.aggregator_is_active(chosen) {
            self.update_port(id, |port| {
                port.actor_oper_state.remove(PortState::SYNCHRONIZATION);
            });
        }
    }

    /// Removes `id` from the member list of `agg`, freeing it when empty.
    fn detach_from(&mut self, id: PortId, agg_id: AggregatorId) {
        self.update_port(id, |port| port.aggregator = None);
        let Some(agg) = self.aggregators.get_mut(&agg_id) else {
            return;
        };
        if !agg.ports.contains(&id) {
            warn!(
                port = %id,
                aggregator = %agg_id,
                "port was related to an aggregator but not on its port list"
            );
            return;
        }
        agg.ports.retain(|member| *member != id);
        debug!(port = %id, aggregator = %agg_id, "port left aggregator");
        if agg.ports.is_empty() {
            agg.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{LacpConfig, PortConfig};
    use crate::group::Group;
    use crate::port::{PartnerInfo, PortId};
    use crate::transport::NullTransport;
    use pretty_assertions::assert_eq;
    use sonic_types::{Duplex, LinkSpeed, MacAddress};
    use std::sync::Arc;

    const PEER: MacAddress = MacAddress::new([2, 0, 0, 0, 0, 0x77]);

    fn group_with_ports(n: u8) -> (Group, Vec<PortId>) {
        let mut group = Group::new(
            "PortChannel3",
            MacAddress::new([2, 0, 0, 0, 0, 0xcc]),
            LacpConfig::default(),
            Arc::new(NullTransport),
        )
        .unwrap();
        let ids = (0..n)
            .map(|i| {
                group
                    .bind_port(
                        PortConfig::new(format!("Ethernet{}", i * 4), MacAddress::new([2, 0, 0, 0, 3, i]))
                            .with_speed(LinkSpeed::Gbps10),
                    )
                    .unwrap()
            })
            .collect();
        (group, ids)
    }

    fn answered_by_peer(group: &mut Group, id: PortId) {
        group.update_port(id, |port| {
            port.partner_oper = PartnerInfo {
                system: PEER,
                system_priority: 0x8000,
                key: 0x20,
                port_number: id.number() + 100,
                port_priority: 0xff,
                state: crate::state::PortState::AGGREGATION
                    | crate::state::PortState::LACP_ACTIVITY,
            };
        });
    }

    #[test]
    fn test_ports_with_same_partner_share_aggregator() {
        let (mut g, ids) = group_with_ports(2);
        answered_by_peer(&mut g, ids[0]);
        answered_by_peer(&mut g, ids[1]);

        g.run_port_selection(ids[0]);
        g.run_port_selection(ids[1]);

        let first = g.port(ids[0]).unwrap().aggregator();
        assert!(first.is_some());
        assert_eq!(g.port(ids[1]).unwrap().aggregator(), first);
        let agg = g.aggregator(first.unwrap()).unwrap();
        assert_eq!(agg.ports(), &[ids[0], ids[1]][..]);
        assert_eq!(agg.partner_system(), PEER);
        assert!(g.port(ids[1]).unwrap().vars().selected);
    }

    #[test]
    fn test_unanswered_ports_stay_apart() {
        let (mut g, ids) = group_with_ports(2);
        g.run_port_selection(ids[0]);
        g.run_port_selection(ids[1]);

        let a = g.port(ids[0]).unwrap().aggregator();
        let b = g.port(ids[1]).unwrap().aggregator();
        assert!(a.is_some() && b.is_some());
        assert_ne!(a, b);
    }

    #[test]
    fn test_half_duplex_opens_individual_aggregator() {
        let (mut g, ids) = group_with_ports(1);
        g.speed_duplex_changed(ids[0], Some(LinkSpeed::Mbps100), Duplex::Half)
            .unwrap();
        g.run_port_selection(ids[0]);

        let agg_id = g.port(ids[0]).unwrap().aggregator().unwrap();
        assert!(g.aggregator(agg_id).unwrap().is_individual());
    }

    #[test]
    fn test_reselection_frees_previous_aggregator() {
        let (mut g, ids) = group_with_ports(2);
        g.run_port_selection(ids[0]);
        let old = g.port(ids[0]).unwrap().aggregator().unwrap();

        // partner identity changed: port must move
        answered_by_peer(&mut g, ids[1]);
        g.run_port_selection(ids[1]);
        answered_by_peer(&mut g, ids[0]);
        g.update_port(ids[0], |port| port.vars.selected = false);
        g.run_port_selection(ids[0]);

        let new = g.port(ids[0]).unwrap().aggregator().unwrap();
        assert_eq!(new, g.port(ids[1]).unwrap().aggregator().unwrap());
        assert_ne!(new, old);
        assert!(g.aggregator(old).unwrap().is_free());
    }

    #[test]
    fn test_selected_port_is_left_alone() {
        let (mut g, ids) = group_with_ports(1);
        g.update_port(ids[0], |port| port.vars.selected = true);
        g.run_port_selection(ids[0]);
        assert_eq!(g.port(ids[0]).unwrap().aggregator(), None);
    }
}
