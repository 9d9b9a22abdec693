//! Per-link actor/partner state.

use crate::churn::ChurnMonitor;
use crate::config::{PortConfig, DEFAULT_PORT_PRIORITY};
use crate::aggregator::AggregatorId;
use crate::mux::MuxState;
use crate::periodic::PeriodicState;
use crate::rx::RxState;
use crate::state::PortState;
use crate::stats::LacpStats;
use serde::{Deserialize, Serialize};
use sonic_types::{Duplex, LinkSpeed, MacAddress};
use std::fmt;
use tracing::error;

/// Bit 0 of the operational key: full duplex.
pub const DUPLEX_KEY_MASK: u16 = 0x0001;
/// Bits 1-5 of the operational key: speed code.
pub const SPEED_KEY_MASK: u16 = 0x003e;
pub const USER_KEY_SHIFT: u16 = 6;

/// Actor port number, unique within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u16);

impl PortId {
    pub const fn new(number: u16) -> Self {
        PortId(number)
    }

    pub const fn number(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a port knows about its partner, learned or administratively
/// defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub system: MacAddress,
    pub system_priority: u16,
    pub key: u16,
    pub port_number: u16,
    pub port_priority: u16,
    pub state: PortState,
}

impl PartnerInfo {
    /// Values assumed while no LACPDU has been received.
    pub const fn admin_default() -> Self {
        Self {
            system: MacAddress::ZERO,
            system_priority: 0xffff,
            key: 1,
            port_number: 1,
            port_priority: 0xff,
            state: PortState::LACP_ACTIVITY,
        }
    }

    /// Same partner identity, ignoring every state bit but AGGREGATION.
    pub(crate) fn same_identity(&self, other: &PartnerInfo) -> bool {
        self.port_number == other.port_number
            && self.port_priority == other.port_priority
            && self.system == other.system
            && self.system_priority == other.system_priority
            && self.key == other.key
            && self.state.agrees(other.state, PortState::AGGREGATION)
    }
}

impl Default for PartnerInfo {
    fn default() -> Self {
        Self::admin_default()
    }
}

/// State machine variables shared between the per-port machines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmVars {
    pub begin: bool,
    pub lacp_enabled: bool,
    /// A churn machine restart is pending.
    pub churned: bool,
    pub ready: bool,
    pub ready_n: bool,
    pub matched: bool,
    pub standby: bool,
    pub selected: bool,
    pub moved: bool,
}

/// One member link of a group.
#[derive(Debug, Clone)]
pub struct PortRecord {
    pub(crate) id: PortId,
    pub(crate) name: String,
    pub(crate) mac: MacAddress,
    pub(crate) speed: Option<LinkSpeed>,
    pub(crate) duplex: Duplex,
    /// Link is up and the port takes part in the protocol.
    pub(crate) is_enabled: bool,
    /// Port currently collects and distributes aggregated traffic.
    pub(crate) forwarding: bool,
    pub(crate) incarnation: u32,

    pub(crate) actor_system: MacAddress,
    pub(crate) actor_system_priority: u16,
    pub(crate) actor_port_priority: u16,
    pub(crate) actor_admin_key: u16,
    pub(crate) actor_oper_key: u16,
    pub(crate) actor_admin_state: PortState,
    pub(crate) actor_oper_state: PortState,
    pub(crate) partner_admin: PartnerInfo,
    pub(crate) partner_oper: PartnerInfo,

    pub(crate) vars: SmVars,
    pub(crate) ntt: bool,
    pub(crate) aggregator: Option<AggregatorId>,

    pub(crate) rx_state: Option<RxState>,
    pub(crate) rx_timer: u32,
    pub(crate) periodic_state: Option<PeriodicState>,
    pub(crate) periodic_timer: u32,
    pub(crate) mux_state: Option<MuxState>,
    pub(crate) mux_timer: u32,
    pub(crate) tx_timer: u32,
    pub(crate) actor_churn: ChurnMonitor,
    pub(crate) partner_churn: ChurnMonitor,

    pub(crate) transaction_id: u32,
    pub(crate) stats: LacpStats,
}

impl PortRecord {
    /// Creates a port in its BEGIN state.
    pub(crate) fn new(id: PortId, config: &PortConfig, lacp_fast: bool, user_key: u16) -> Self {
        let base = PortState::AGGREGATION | PortState::LACP_ACTIVITY;
        let mut oper = base;
        oper.set(PortState::LACP_TIMEOUT, lacp_fast);

        Self {
            id,
            name: config.name.clone(),
            mac: config.mac,
            speed: config.speed,
            duplex: config.duplex,
            is_enabled: config.link_up,
            forwarding: false,
            incarnation: u32::from(config.link_up),
            actor_system: MacAddress::ZERO,
            actor_system_priority: 0,
            actor_port_priority: config.priority.unwrap_or(DEFAULT_PORT_PRIORITY),
            actor_admin_key: user_key << USER_KEY_SHIFT,
            actor_oper_key: 0,
            actor_admin_state: base,
            actor_oper_state: oper,
            partner_admin: PartnerInfo::admin_default(),
            partner_oper: PartnerInfo::admin_default(),
            vars: SmVars {
                begin: true,
                lacp_enabled: true,
                ..Default::default()
            },
            ntt: false,
            aggregator: None,
            rx_state: None,
            rx_timer: 0,
            periodic_state: None,
            periodic_timer: 0,
            mux_state: None,
            mux_timer: 0,
            tx_timer: 0,
            actor_churn: ChurnMonitor::default(),
            partner_churn: ChurnMonitor::default(),
            transaction_id: 0,
            stats: LacpStats::default(),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }

    pub fn incarnation(&self) -> u32 {
        self.incarnation
    }

    pub fn actor_state(&self) -> PortState {
        self.actor_oper_state
    }

    pub fn actor_oper_key(&self) -> u16 {
        self.actor_oper_key
    }

    pub fn actor_system(&self) -> MacAddress {
        self.actor_system
    }

    pub fn actor_port_priority(&self) -> u16 {
        self.actor_port_priority
    }

    pub fn partner(&self) -> &PartnerInfo {
        &self.partner_oper
    }

    pub fn vars(&self) -> &SmVars {
        &self.vars
    }

    pub fn ntt(&self) -> bool {
        self.ntt
    }

    pub fn aggregator(&self) -> Option<AggregatorId> {
        self.aggregator
    }

    pub fn rx_state(&self) -> Option<RxState> {
        self.rx_state
    }

    pub fn periodic_state(&self) -> Option<PeriodicState> {
        self.periodic_state
    }

    pub fn mux_state(&self) -> Option<MuxState> {
        self.mux_state
    }

    pub fn actor_churn(&self) -> &ChurnMonitor {
        &self.actor_churn
    }

    pub fn partner_churn(&self) -> &ChurnMonitor {
        &self.partner_churn
    }

    pub fn stats(&self) -> &LacpStats {
        &self.stats
    }

    /// Speed code for the key, 0 while the link is down or the speed unknown.
    pub(crate) fn link_speed_code(&self) -> u16 {
        if !self.is_enabled {
            return 0;
        }
        self.speed.map(LinkSpeed::key_code).unwrap_or(0)
    }

    /// Speed used for aggregator bandwidth, 0 while the link is down.
    pub(crate) fn link_speed_mbps(&self) -> u32 {
        if !self.is_enabled {
            return 0;
        }
        self.speed.map(LinkSpeed::mbps).unwrap_or(0)
    }

    fn duplex_bit(&self) -> u16 {
        u16::from(self.is_enabled && self.duplex.is_full())
    }

    pub(crate) fn is_full_duplex_key(&self) -> bool {
        self.actor_oper_key & DUPLEX_KEY_MASK != 0
    }

    /// Recomputes the operational key from speed, duplex and user key.
    ///
    /// `reset` zeroes the speed and duplex parts (link down). A changed key
    /// re-derives LACP_ENABLED from duplex, and a speed change on a
    /// full-duplex link restarts the port.
    pub(crate) fn update_actor_keys(&mut self, reset: bool) {
        let old_key = self.actor_oper_key;
        let (speed, duplex) = if reset {
            (0, 0)
        } else {
            (self.link_speed_code(), self.duplex_bit())
        };
        let old_speed = (old_key & SPEED_KEY_MASK) >> 1;

        self.actor_admin_key &= !(SPEED_KEY_MASK | DUPLEX_KEY_MASK);
        self.actor_admin_key |= (speed << 1) | duplex;
        self.actor_oper_key = self.actor_admin_key;

        if old_key == self.actor_oper_key {
            return;
        }
        self.vars.lacp_enabled = duplex != 0;
        if reset {
            return;
        }
        if speed == 0 {
            error!(port = %self.id, name = %self.name, "speed changed to 0");
        } else if duplex != 0 && old_speed != speed {
            self.vars.begin = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn port(speed: LinkSpeed, duplex: Duplex) -> PortRecord {
        let config = PortConfig::new("Ethernet0", MacAddress::new([2, 0, 0, 0, 0, 1]))
            .with_speed(speed)
            .with_duplex(duplex);
        PortRecord::new(PortId::new(1), &config, false, 0)
    }

    #[test]
    fn test_new_port_starts_in_begin() {
        let p = port(LinkSpeed::Gbps1, Duplex::Full);
        assert!(p.vars.begin);
        assert!(p.vars.lacp_enabled);
        assert_eq!(p.actor_port_priority, 0xff);
        assert_eq!(
            p.actor_oper_state,
            PortState::AGGREGATION | PortState::LACP_ACTIVITY
        );
        assert_eq!(p.partner_oper, PartnerInfo::admin_default());
    }

    #[test]
    fn test_fast_rate_sets_timeout_bit() {
        let config = PortConfig::new("Ethernet4", MacAddress::new([2, 0, 0, 0, 0, 2]));
        let p = PortRecord::new(PortId::new(2), &config, true, 0);
        assert!(p.actor_oper_state.contains(PortState::LACP_TIMEOUT));
        assert!(!p.actor_admin_state.contains(PortState::LACP_TIMEOUT));
    }

    #[test]
    fn test_key_layout() {
        let config = PortConfig::new("Ethernet0", MacAddress::new([2, 0, 0, 0, 0, 1]))
            .with_speed(LinkSpeed::Gbps10);
        let mut p = PortRecord::new(PortId::new(1), &config, false, 3);
        p.update_actor_keys(false);
        // user key 3, speed code 7, full duplex
        assert_eq!(p.actor_oper_key, (3 << 6) | (7 << 1) | 1);
        assert!(p.is_full_duplex_key());
    }

    #[test]
    fn test_half_duplex_disables_lacp() {
        let mut p = port(LinkSpeed::Mbps100, Duplex::Half);
        p.update_actor_keys(false);
        assert_eq!(p.actor_oper_key, 3 << 1);
        assert!(!p.vars.lacp_enabled);
    }

    #[test]
    fn test_speed_change_restarts_full_duplex_port() {
        let mut p = port(LinkSpeed::Gbps1, Duplex::Full);
        p.update_actor_keys(false);
        p.vars.begin = false;

        p.speed = Some(LinkSpeed::Gbps10);
        p.update_actor_keys(false);
        assert!(p.vars.begin);
    }

    #[test]
    fn test_reset_clears_speed_and_duplex() {
        let mut p = port(LinkSpeed::Gbps1, Duplex::Full);
        p.update_actor_keys(false);
        p.vars.begin = false;

        p.update_actor_keys(true);
        assert_eq!(p.actor_oper_key, 0);
        assert!(!p.vars.lacp_enabled);
        assert!(!p.vars.begin);
    }

    #[test]
    fn test_link_down_contributes_no_speed() {
        let mut p = port(LinkSpeed::Gbps25, Duplex::Full);
        assert_eq!(p.link_speed_mbps(), 25_000);
        p.is_enabled = false;
        assert_eq!(p.link_speed_mbps(), 0);
        assert_eq!(p.link_speed_code(), 0);
    }
}
