//! Active aggregator selection.
//!
//! Exactly one aggregator per group carries traffic. Candidates are ranked
//! pairwise: aggregating links beat individual ones, answered partners beat
//! silent ones, then the configured [`SelectionPolicy`] decides.

use crate::aggregator::AggregatorId;
use crate::config::SelectionPolicy;
use crate::group::Group;
use tracing::{debug, info, warn};

/// What the ranking needs to know about one aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub id: AggregatorId,
    pub is_individual: bool,
    pub has_partner: bool,
    pub num_ports: usize,
    pub active_ports: usize,
    pub bandwidth_mbps: u64,
    pub actor_oper_key: u16,
}

/// Returns whichever of `best` and `curr` should be active. Ties keep
/// `best`.
pub(crate) fn pick(policy: SelectionPolicy, best: Option<Candidate>, curr: Candidate) -> Candidate {
    let Some(best) = best else {
        return curr;
    };
    if curr.is_individual != best.is_individual {
        return if curr.is_individual { best } else { curr };
    }
    if curr.has_partner != best.has_partner {
        return if curr.has_partner { curr } else { best };
    }
    if policy == SelectionPolicy::Count {
        if curr.active_ports > best.active_ports {
            return curr;
        }
        if curr.active_ports < best.active_ports {
            return best;
        }
    }
    if curr.bandwidth_mbps > best.bandwidth_mbps {
        curr
    } else {
        best
    }
}

impl Group {
    pub(crate) fn candidate(&self, id: AggregatorId) -> Option<Candidate> {
        let agg = self.aggregators.get(&id)?;
        let members = agg.ports.iter().filter_map(|member| self.ports.get(member));
        let (active_ports, bandwidth_mbps) = members
            .filter(|port| port.is_enabled)
            .fold((0, 0u64), |(count, bw), port| {
                (count + 1, bw + u64::from(port.link_speed_mbps()))
            });
        Some(Candidate {
            id,
            is_individual: agg.is_individual,
            has_partner: agg.has_partner(),
            num_ports: agg.ports.len(),
            active_ports,
            bandwidth_mbps,
            actor_oper_key: agg.actor_oper_key,
        })
    }

    /// Re-elects the active aggregator, moves forwarding accordingly and
    /// recomputes carrier.
    pub(crate) fn run_agg_selection(&mut self) {
        let policy = self.config.selection_policy;
        let active = self.active_aggregator_id().and_then(|id| self.candidate(id));
        let mut best = active.filter(|a| a.active_ports > 0);

        let ids: Vec<AggregatorId> = self.aggregators.keys().copied().collect();
        for id in ids {
            if let Some(agg) = self.aggregators.get_mut(&id) {
                agg.is_active = false;
            }
            match self.candidate(id) {
                Some(c) if c.active_ports > 0 => best = Some(pick(policy, best, c)),
                _ => {}
            }
        }

        if let (Some(b), Some(a)) = (best, active) {
            let keep_active = policy == SelectionPolicy::Stable
                && a.num_ports > 0
                && a.active_ports > 0
                && (a.has_partner || !b.has_partner)
                && !(a.actor_oper_key == 0 && b.actor_oper_key != 0);
            if keep_active || b.id == a.id {
                best = None;
                self.set_aggregator_active(a.id);
            }
        }

        if let Some(b) = best {
            if b.is_individual {
                warn!(
                    group = %self.name,
                    "no 802.3ad response from the link partner for any adapters in the group"
                );
            }
            self.set_aggregator_active(b.id);
            info!(
                group = %self.name,
                aggregator = %b.id,
                ports = b.num_ports,
                active_ports = b.active_ports,
                bandwidth_mbps = b.bandwidth_mbps,
                "aggregator chosen as the active one"
            );
            if let Some(previous) = active {
                debug!(aggregator = %previous.id, "disabling ports of displaced aggregator");
                for member in self.aggregator_members(previous.id) {
                    self.disable_port(member);
                }
            }
        }

        // individual links forward without waiting for a partner
        if let Some(current) = self.active_aggregator_id() {
            let has_partner = self
                .aggregators
                .get(&current)
                .is_some_and(|agg| agg.has_partner());
            if !has_partner {
                for member in self.aggregator_members(current) {
                    self.enable_port(member);
                }
            }
        }

        self.update_carrier();
    }

    fn set_aggregator_active(&mut self, id: AggregatorId) {
        if let Some(agg) = self.aggregators.get_mut(&id) {
            agg.is_active = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LacpConfig, PortConfig};
    use crate::port::PartnerInfo;
    use crate::state::PortState;
    use crate::transport::NullTransport;
    use pretty_assertions::assert_eq;
    use sonic_types::{LinkSpeed, MacAddress};
    use std::sync::Arc;

    fn candidate(id: u16, active_ports: usize, bandwidth_mbps: u64) -> Candidate {
        Candidate {
            id: AggregatorId::new(id),
            is_individual: false,
            has_partner: true,
            num_ports: active_ports,
            active_ports,
            bandwidth_mbps,
            actor_oper_key: 0x09,
        }
    }

    #[test]
    fn test_pick_prefers_aggregating_then_answered() {
        let mut individual = candidate(1, 4, 40_000);
        individual.is_individual = true;
        let small = candidate(2, 1, 1_000);
        assert_eq!(pick(SelectionPolicy::Bandwidth, Some(individual), small).id, small.id);
        assert_eq!(pick(SelectionPolicy::Bandwidth, Some(small), individual).id, small.id);

        let mut silent = candidate(3, 4, 40_000);
        silent.has_partner = false;
        assert_eq!(pick(SelectionPolicy::Count, Some(silent), small).id, small.id);
    }

    #[test]
    fn test_pick_policies() {
        let a = candidate(1, 2, 2_000);
        let b = candidate(2, 3, 300);
        assert_eq!(pick(SelectionPolicy::Count, Some(a), b).id, b.id);
        assert_eq!(pick(SelectionPolicy::Bandwidth, Some(a), b).id, a.id);
        assert_eq!(pick(SelectionPolicy::Bandwidth, Some(b), a).id, a.id);

        // equal count falls back to bandwidth
        let c = candidate(3, 2, 20_000);
        assert_eq!(pick(SelectionPolicy::Count, Some(a), c).id, c.id);
        // ties keep the incumbent
        assert_eq!(pick(SelectionPolicy::Bandwidth, Some(a), candidate(4, 2, 2_000)).id, a.id);
    }

    const PEER_A: MacAddress = MacAddress::new([2, 0, 0, 0, 0, 0xa0]);
    const PEER_B: MacAddress = MacAddress::new([2, 0, 0, 0, 0, 0xb0]);

    fn group(policy: SelectionPolicy) -> Group {
        let config = LacpConfig {
            selection_policy: policy,
            ..Default::default()
        };
        Group::new(
            "PortChannel4",
            MacAddress::new([2, 0, 0, 0, 0, 0xdd]),
            config,
            Arc::new(NullTransport),
        )
        .unwrap()
    }

    /// Binds `count` ports at `speed`, all answered by `peer`, and selects
    /// them onto one aggregator.
    fn add_link(g: &mut Group, first: u8, count: u8, speed: LinkSpeed, peer: MacAddress) -> AggregatorId {
        let mut ids = Vec::new();
        for i in first..first + count {
            let id = g
                .bind_port(
                    PortConfig::new(format!("Ethernet{}", i), MacAddress::new([2, 0, 0, 0, 4, i]))
                        .with_speed(speed),
                )
                .unwrap();
            g.update_port(id, |port| {
                port.partner_oper = PartnerInfo {
                    system: peer,
                    system_priority: 0x8000,
                    key: 0x11,
                    port_number: u16::from(i) + 1,
                    port_priority: 0xff,
                    state: PortState::AGGREGATION | PortState::LACP_ACTIVITY,
                };
            });
            ids.push(id);
        }
        for id in &ids {
            g.run_port_selection(*id);
        }
        g.port(ids[0]).unwrap().aggregator().unwrap()
    }

    fn active(g: &Group) -> Option<AggregatorId> {
        g.active_aggregator().map(|agg| agg.id())
    }

    fn active_count(g: &Group) -> usize {
        g.aggregators().filter(|agg| agg.is_active()).count()
    }

    #[test]
    fn test_stable_keeps_answering_incumbent() {
        let mut g = group(SelectionPolicy::Stable);
        let a = add_link(&mut g, 0, 1, LinkSpeed::Gbps1, PEER_A);
        assert_eq!(active(&g), Some(a));

        let b = add_link(&mut g, 1, 3, LinkSpeed::Gbps1, PEER_B);
        g.run_agg_selection();
        assert_ne!(a, b);
        assert_eq!(active(&g), Some(a));
        assert_eq!(active_count(&g), 1);
    }

    fn add_silent_port(g: &mut Group, n: u8, speed: LinkSpeed) -> AggregatorId {
        let id = g
            .bind_port(
                PortConfig::new(format!("Ethernet{}", n), MacAddress::new([2, 0, 0, 0, 4, n]))
                    .with_speed(speed),
            )
            .unwrap();
        g.run_port_selection(id);
        g.port(id).unwrap().aggregator().unwrap()
    }

    #[test]
    fn test_stable_keeps_silent_incumbent_over_silent_candidate() {
        let mut g = group(SelectionPolicy::Stable);
        let a = add_silent_port(&mut g, 0, LinkSpeed::Gbps1);
        assert_eq!(active(&g), Some(a));

        let b = add_silent_port(&mut g, 1, LinkSpeed::Gbps10);
        g.run_agg_selection();
        assert_ne!(a, b);
        assert!(!g.aggregator(b).unwrap().has_partner());
        assert_eq!(active(&g), Some(a));
        assert_eq!(active_count(&g), 1);
    }

    #[test]
    fn test_stable_gives_way_to_answered_candidate() {
        let mut g = group(SelectionPolicy::Stable);
        let a = add_silent_port(&mut g, 0, LinkSpeed::Gbps10);
        assert_eq!(active(&g), Some(a));

        let b = add_link(&mut g, 1, 1, LinkSpeed::Gbps1, PEER_A);
        assert_eq!(active(&g), Some(b));
        assert_eq!(active_count(&g), 1);
    }

    #[test]
    fn test_stable_replaces_zero_key_incumbent() {
        let mut g = group(SelectionPolicy::Stable);
        let a = add_link(&mut g, 0, 1, LinkSpeed::Gbps1, PEER_A);
        assert_eq!(active(&g), Some(a));
        if let Some(agg) = g.aggregators.get_mut(&a) {
            agg.actor_oper_key = 0;
        }

        let b = add_link(&mut g, 1, 1, LinkSpeed::Gbps10, PEER_B);
        assert_ne!(a, b);
        assert_eq!(active(&g), Some(b));
        assert_eq!(active_count(&g), 1);
    }

    #[test]
    fn test_count_prefers_more_ports() {
        let mut g = group(SelectionPolicy::Count);
        let a = add_link(&mut g, 0, 2, LinkSpeed::Gbps1, PEER_A);
        let b = add_link(&mut g, 2, 3, LinkSpeed::Mbps100, PEER_B);
        g.run_agg_selection();
        assert_eq!(active(&g), Some(b));
        assert_ne!(a, b);
        assert_eq!(active_count(&g), 1);
    }

    #[test]
    fn test_bandwidth_prefers_faster_aggregate() {
        let mut g = group(SelectionPolicy::Bandwidth);
        let a = add_link(&mut g, 0, 2, LinkSpeed::Gbps1, PEER_A);
        let _b = add_link(&mut g, 2, 3, LinkSpeed::Mbps100, PEER_B);
        g.run_agg_selection();
        assert_eq!(active(&g), Some(a));
        assert_eq!(active_count(&g), 1);
    }

    #[test]
    fn test_displaced_aggregator_stops_forwarding() {
        let mut g = group(SelectionPolicy::Bandwidth);
        let a = add_link(&mut g, 0, 1, LinkSpeed::Gbps1, PEER_A);
        let member = g.aggregator(a).unwrap().ports()[0];
        g.enable_port(member);
        assert!(g.port(member).unwrap().is_forwarding());

        let b = add_link(&mut g, 1, 2, LinkSpeed::Gbps10, PEER_B);
        assert_eq!(active(&g), Some(b));
        assert!(!g.port(member).unwrap().is_forwarding());
    }

    #[test]
    fn test_link_down_members_do_not_count() {
        let mut g = group(SelectionPolicy::Count);
        let a = add_link(&mut g, 0, 2, LinkSpeed::Gbps1, PEER_A);
        let b = add_link(&mut g, 2, 3, LinkSpeed::Gbps1, PEER_B);
        assert_eq!(active(&g), Some(b));

        for member in g.aggregator(b).unwrap().ports().to_vec() {
            g.link_changed(member, false).unwrap();
        }
        assert_eq!(active(&g), Some(a));
    }

    #[test]
    fn test_partnerless_active_aggregator_forwards() {
        let mut g = group(SelectionPolicy::Stable);
        let id = g
            .bind_port(
                PortConfig::new("Ethernet0", MacAddress::new([2, 0, 0, 0, 5, 0]))
                    .with_speed(LinkSpeed::Gbps1),
            )
            .unwrap();
        g.run_port_selection(id);
        assert!(g.port(id).unwrap().is_forwarding());
        assert!(g.carrier_up());
    }
}
