//! Serializable snapshots of a group.

use crate::aggregator::AggregatorId;
use crate::churn::ChurnMonitor;
use crate::config::{LacpRate, SelectionPolicy};
use crate::group::Group;
use crate::mux::MuxState;
use crate::periodic::PeriodicState;
use crate::port::{PartnerInfo, PortId, SmVars};
use crate::rx::RxState;
use crate::state::PortState;
use crate::stats::LacpStats;
use serde::Serialize;
use sonic_types::{Duplex, LinkSpeed, MacAddress};

/// The aggregator currently carrying traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveAggregatorInfo {
    pub aggregator: AggregatorId,
    /// Members with link up
    pub active_ports: usize,
    pub actor_key: u16,
    pub partner_key: u16,
    pub partner_system: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortStatus {
    pub id: PortId,
    pub name: String,
    pub mac: MacAddress,
    pub speed: Option<LinkSpeed>,
    pub duplex: Duplex,
    pub enabled: bool,
    pub forwarding: bool,
    pub incarnation: u32,
    pub actor_key: u16,
    pub actor_port_priority: u16,
    pub actor_state: PortState,
    /// Human readable rendering of `actor_state`
    pub actor_flags: String,
    pub partner: PartnerInfo,
    pub partner_flags: String,
    pub aggregator: Option<AggregatorId>,
    pub vars: SmVars,
    pub rx_state: Option<RxState>,
    pub periodic_state: Option<PeriodicState>,
    pub mux_state: Option<MuxState>,
    pub actor_churn: ChurnMonitor,
    pub partner_churn: ChurnMonitor,
    pub stats: LacpStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatorStatus {
    pub id: AggregatorId,
    pub mac: MacAddress,
    pub owner: PortId,
    pub actor_key: u16,
    pub partner_system: MacAddress,
    pub partner_system_priority: u16,
    pub partner_key: u16,
    pub ports: Vec<PortId>,
    pub is_active: bool,
    pub is_individual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatus {
    pub name: String,
    pub system: MacAddress,
    pub system_priority: u16,
    pub selection_policy: SelectionPolicy,
    pub lacp_rate: LacpRate,
    pub min_links: usize,
    pub carrier_up: bool,
    pub agg_select_timer: u32,
    pub active: Option<ActiveAggregatorInfo>,
    pub ports: Vec<PortStatus>,
    pub aggregators: Vec<AggregatorStatus>,
    pub stats: LacpStats,
}

impl Group {
    pub fn status(&self) -> GroupStatus {
        let ports = self
            .ports()
            .map(|port| PortStatus {
                id: port.id,
                name: port.name.clone(),
                mac: port.mac,
                speed: port.speed,
                duplex: port.duplex,
                enabled: port.is_enabled,
                forwarding: port.forwarding,
                incarnation: port.incarnation,
                actor_key: port.actor_oper_key,
                actor_port_priority: port.actor_port_priority,
                actor_state: port.actor_oper_state,
                actor_flags: port.actor_oper_state.to_string(),
                partner: port.partner_oper,
                partner_flags: port.partner_oper.state.to_string(),
                aggregator: port.aggregator,
                vars: port.vars,
                rx_state: port.rx_state,
                periodic_state: port.periodic_state,
                mux_state: port.mux_state,
                actor_churn: port.actor_churn,
                partner_churn: port.partner_churn,
                stats: port.stats,
            })
            .collect();
        let aggregators = self
            .aggregators()
            .map(|agg| AggregatorStatus {
                id: agg.id,
                mac: agg.mac,
                owner: agg.owner,
                actor_key: agg.actor_oper_key,
                partner_system: agg.partner_system,
                partner_system_priority: agg.partner_system_priority,
                partner_key: agg.partner_oper_key,
                ports: agg.ports.clone(),
                is_active: agg.is_active,
                is_individual: agg.is_individual,
            })
            .collect();

        GroupStatus {
            name: self.name.clone(),
            system: self.system_id(),
            system_priority: self.config.system_priority,
            selection_policy: self.config.selection_policy,
            lacp_rate: self.config.lacp_rate,
            min_links: self.config.min_links,
            carrier_up: self.carrier_up(),
            agg_select_timer: self.agg_select_timer,
            active: self.active_aggregator_info(),
            ports,
            aggregators,
            stats: *self.stats(),
        }
    }
}
