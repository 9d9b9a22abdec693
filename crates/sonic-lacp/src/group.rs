//! The bonding group: owns every port and aggregator of one logical link
//! and drives their machines.

use crate::aggregator::{Aggregator, AggregatorId};
use crate::config::{LacpConfig, LacpRate, PortConfig};
use crate::error::{LacpError, Result};
use crate::pdu::{parse_frame, MarkerKind, SlowPdu, ETHERNET_HEADER_LEN, FRAME_LEN, SLOW_PDU_LEN};
use crate::port::{PortId, PortRecord};
use crate::rx::expire;
use crate::state::PortState;
use crate::stats::{Counter, LacpStats};
use crate::status::ActiveAggregatorInfo;
use crate::timers::TickClock;
use crate::transport::LinkTransport;
use itertools::Itertools;
use sonic_types::{Duplex, LinkSpeed, MacAddress};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a frame handed to [`Group::rx_indication`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxVerdict {
    /// Slow-protocols PDU handled by LACP
    Consumed,
    /// Not ours, the caller should keep processing it
    Passed,
}

/// One bonding group. Not thread-safe on its own; wrap it in a
/// [`crate::GroupHandle`] to share it between a ticker and a receive path.
pub struct Group {
    pub(crate) name: String,
    pub(crate) config: LacpConfig,
    pub(crate) clock: TickClock,
    /// Device address, used as aggregator MAC and default system id
    pub(crate) mac: MacAddress,
    pub(crate) ports: BTreeMap<PortId, PortRecord>,
    pub(crate) aggregators: BTreeMap<AggregatorId, Aggregator>,
    next_port_number: u16,
    next_aggregator_id: u16,
    pub(crate) agg_select_timer: u32,
    carrier_up: bool,
    pub(crate) stats: LacpStats,
    pub(crate) transport: Arc<dyn LinkTransport>,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("mac", &self.mac)
            .field("ports", &self.ports.len())
            .field("aggregators", &self.aggregators.len())
            .field("carrier_up", &self.carrier_up)
            .finish()
    }
}

impl Group {
    pub fn new(
        name: impl Into<String>,
        mac: MacAddress,
        config: LacpConfig,
        transport: Arc<dyn LinkTransport>,
    ) -> Result<Self> {
        config.validate()?;
        if mac.is_multicast() {
            return Err(LacpError::InvalidConfig(format!(
                "group address {} is a multicast address",
                mac
            )));
        }
        let clock = config.clock();
        Ok(Self {
            name: name.into(),
            config,
            clock,
            mac,
            ports: BTreeMap::new(),
            aggregators: BTreeMap::new(),
            next_port_number: 1,
            next_aggregator_id: 1,
            agg_select_timer: clock.aggregator_selection(),
            carrier_up: false,
            stats: LacpStats::default(),
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LacpConfig {
        &self.config
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn clock(&self) -> TickClock {
        self.clock
    }

    /// Actor system id advertised by every port.
    pub fn system_id(&self) -> MacAddress {
        self.config.system_mac.unwrap_or(self.mac)
    }

    pub fn carrier_up(&self) -> bool {
        self.carrier_up
    }

    pub fn stats(&self) -> &LacpStats {
        &self.stats
    }

    /// Ticks left before the aggregator selection grace period ends.
    pub fn agg_select_timer(&self) -> u32 {
        self.agg_select_timer
    }

    pub fn ports(&self) -> impl Iterator<Item = &PortRecord> {
        self.ports.values()
    }

    pub fn port(&self, id: PortId) -> Option<&PortRecord> {
        self.ports.get(&id)
    }

    pub fn port_by_name(&self, name: &str) -> Option<&PortRecord> {
        self.ports.values().find(|port| port.name == name)
    }

    pub fn aggregators(&self) -> impl Iterator<Item = &Aggregator> {
        self.aggregators.values()
    }

    pub fn aggregator(&self, id: AggregatorId) -> Option<&Aggregator> {
        self.aggregators.get(&id)
    }

    pub fn active_aggregator(&self) -> Option<&Aggregator> {
        self.aggregators.values().find(|agg| agg.is_active)
    }

    /// Adds a member link. The port starts in BEGIN and is picked up by the
    /// next tick.
    #[instrument(skip(self, config), fields(group = %self.name, name = %config.name))]
    pub fn bind_port(&mut self, config: PortConfig) -> Result<PortId> {
        config.validate()?;
        if self.port_by_name(&config.name).is_some() {
            return Err(LacpError::DuplicatePort(config.name));
        }
        let (Some(next_port), Some(next_agg)) = (
            self.next_port_number.checked_add(1),
            self.next_aggregator_id.checked_add(1),
        ) else {
            return Err(LacpError::InvalidConfig(
                "port numbers exhausted".to_string(),
            ));
        };
        let id = PortId::new(self.next_port_number);
        let agg_id = AggregatorId::new(self.next_aggregator_id);
        self.next_port_number = next_port;
        self.next_aggregator_id = next_agg;

        let user_key = config.user_key.unwrap_or(self.config.user_port_key);
        let mut port = PortRecord::new(id, &config, self.config.lacp_rate.is_fast(), user_key);
        port.update_actor_keys(false);
        port.actor_system = self.system_id();
        port.actor_system_priority = self.config.system_priority;
        port.tx_timer = self.clock.tx_interval();

        self.ports.insert(id, port);
        self.aggregators
            .insert(agg_id, Aggregator::new(agg_id, self.mac, id));
        info!(port = %id, aggregator = %agg_id, "port bound");
        Ok(id)
    }

    /// Removes a member link, migrating any ports that were attached to its
    /// aggregator slot.
    #[instrument(skip(self), fields(group = %self.name))]
    pub fn unbind_port(&mut self, id: PortId) -> Result<()> {
        let port = self.ports.get_mut(&id).ok_or(LacpError::PortNotFound(id))?;
        port.actor_oper_state.remove(
            PortState::SYNCHRONIZATION
                | PortState::COLLECTING
                | PortState::DISTRIBUTING
                | PortState::AGGREGATION,
        );
        // best effort, the port is going away either way
        let _ = self.send_lacpdu(id);

        let slot_id = self.slot_of(id);
        if let Some(slot_id) = slot_id {
            self.vacate_slot(id, slot_id);
        }

        let listing: Vec<AggregatorId> = self
            .aggregators
            .values()
            .filter(|agg| agg.ports.contains(&id))
            .map(|agg| agg.id)
            .collect();
        for agg_id in listing {
            let Some(agg) = self.aggregators.get_mut(&agg_id) else {
                continue;
            };
            agg.ports.retain(|member| *member != id);
            let was_active = agg.is_active;
            if agg.ports.is_empty() {
                agg.clear();
                if was_active {
                    info!(aggregator = %agg_id, "removing an active aggregator");
                    self.run_agg_selection();
                }
            } else if was_active && self.active_ports(agg_id) == 0 {
                self.run_agg_selection();
            }
        }

        self.disable_port(id);
        self.ports.remove(&id);
        if let Some(slot_id) = slot_id {
            self.aggregators.remove(&slot_id);
        }
        self.update_carrier();
        info!(port = %id, "port unbound");
        Ok(())
    }

    /// Empties the aggregator slot owned by a departing port.
    fn vacate_slot(&mut self, id: PortId, slot_id: AggregatorId) {
        let Some(slot) = self.aggregators.get(&slot_id).cloned() else {
            return;
        };
        if slot.is_free() {
            return;
        }
        if slot.ports != [id] {
            let target = self
                .aggregators
                .values()
                .find(|agg| agg.id != slot_id && (agg.is_free() || agg.ports == [id]))
                .map(|agg| (agg.id, agg.is_active && agg.ports == [id]));

            match target {
                Some((target_id, reselect)) => {
                    debug!(
                        from = %slot_id,
                        to = %target_id,
                        "moving remaining ports to another aggregator"
                    );
                    if let Some(agg) = self.aggregators.get_mut(&target_id) {
                        agg.take_over(&slot);
                    }
                    for member in &slot.ports {
                        self.update_port(*member, |port| port.aggregator = Some(target_id));
                    }
                    if let Some(agg) = self.aggregators.get_mut(&slot_id) {
                        agg.clear();
                    }
                    if reselect {
                        info!(aggregator = %target_id, "removing an active aggregator");
                        self.run_agg_selection();
                    }
                }
                None => {
                    warn!(
                        aggregator = %slot_id,
                        ports = %slot.ports.iter().join(","),
                        "unbinding aggregator, and could not find a new aggregator for its ports"
                    );
                    for member in &slot.ports {
                        self.update_port(*member, |port| {
                            port.aggregator = None;
                            port.vars.selected = false;
                        });
                    }
                    if let Some(agg) = self.aggregators.get_mut(&slot_id) {
                        agg.clear();
                    }
                    if slot.is_active {
                        self.run_agg_selection();
                    }
                }
            }
        } else {
            if let Some(agg) = self.aggregators.get_mut(&slot_id) {
                agg.clear();
            }
            if slot.is_active {
                info!(aggregator = %slot_id, "removing an active aggregator");
                self.run_agg_selection();
            }
        }
    }

    fn slot_of(&self, id: PortId) -> Option<AggregatorId> {
        self.aggregators
            .values()
            .find(|agg| agg.owner == id)
            .map(|agg| agg.id)
    }

    /// Link went up or down.
    #[instrument(skip(self), fields(group = %self.name))]
    pub fn link_changed(&mut self, id: PortId, up: bool) -> Result<()> {
        let port = self.ports.get_mut(&id).ok_or(LacpError::PortNotFound(id))?;
        if up {
            port.is_enabled = true;
            port.incarnation = port.incarnation.wrapping_add(1);
            port.update_actor_keys(false);
        } else {
            port.is_enabled = false;
            port.update_actor_keys(true);
            self.disable_port(id);
        }
        info!(port = %id, up, "link state changed");
        self.run_agg_selection();
        Ok(())
    }

    /// Adapter reported new speed or duplex.
    pub fn speed_duplex_changed(
        &mut self,
        id: PortId,
        speed: Option<LinkSpeed>,
        duplex: Duplex,
    ) -> Result<()> {
        let port = self.ports.get_mut(&id).ok_or(LacpError::PortNotFound(id))?;
        port.speed = speed;
        port.duplex = duplex;
        port.update_actor_keys(false);
        debug!(
            port = %id,
            speed = ?speed,
            %duplex,
            key = port.actor_oper_key,
            "speed/duplex changed"
        );
        Ok(())
    }

    /// Switches every port between fast and slow partner polling.
    pub fn set_lacp_rate(&mut self, rate: LacpRate) {
        self.config.lacp_rate = rate;
        for port in self.ports.values_mut() {
            port.actor_oper_state
                .set(PortState::LACP_TIMEOUT, rate.is_fast());
        }
        info!(group = %self.name, %rate, "LACP rate updated");
    }

    /// Changes the actor system priority and id on every port.
    pub fn update_actor_settings(
        &mut self,
        system_priority: u16,
        system_mac: Option<MacAddress>,
    ) -> Result<()> {
        let mut config = self.config.clone();
        config.system_priority = system_priority;
        config.system_mac = system_mac;
        config.validate()?;
        self.config = config;

        let system = self.system_id();
        for port in self.ports.values_mut() {
            port.actor_system = system;
            port.actor_system_priority = system_priority;
            port.ntt = true;
        }
        info!(group = %self.name, %system, system_priority, "actor settings updated");
        Ok(())
    }

    /// Re-arms the aggregator selection grace timer.
    pub fn initiate_agg_selection(&mut self, ticks: u32) {
        self.agg_select_timer = ticks;
    }

    pub fn active_aggregator_info(&self) -> Option<ActiveAggregatorInfo> {
        let agg = self.active_aggregator()?;
        Some(ActiveAggregatorInfo {
            aggregator: agg.id,
            active_ports: self.active_ports(agg.id),
            actor_key: agg.actor_oper_key,
            partner_key: agg.partner_oper_key,
            partner_system: agg.partner_system,
        })
    }

    /// Emits a Marker Information PDU. Returns the transaction id used.
    pub fn send_marker(&mut self, id: PortId) -> Result<u32> {
        if !self.ports.contains_key(&id) {
            return Err(LacpError::PortNotFound(id));
        }
        Ok(self.send_marker_info(id)?)
    }

    /// Hands a received frame to the engine.
    pub fn rx_indication(&mut self, id: PortId, frame: &[u8]) -> Result<RxVerdict> {
        if !self.ports.contains_key(&id) {
            return Err(LacpError::PortNotFound(id));
        }
        let pdu = match parse_frame(frame) {
            Ok(pdu) => pdu,
            Err(e) => {
                if e.is_illegal() {
                    debug!(port = %id, error = %e, "illegal slow-protocols frame");
                    self.count(id, Counter::LacpduIllegalRx);
                }
                return Ok(RxVerdict::Passed);
            }
        };

        match pdu {
            SlowPdu::Lacp(lacpdu) => {
                self.count(id, Counter::LacpduRx);
                let clock = self.clock;
                let Some(port) = self.ports.get_mut(&id) else {
                    return Err(LacpError::PortNotFound(id));
                };
                if lacpdu.actor.system == port.actor_system {
                    error!(
                        port = %id,
                        system = %lacpdu.actor.system,
                        "an illegal loopback occurred, check that all adapters are connected to 802.3ad compliant switch ports"
                    );
                    return Ok(RxVerdict::Consumed);
                }
                port.run_rx_machine(Some(&lacpdu), &clock);
            }
            SlowPdu::Marker(marker) => match marker.kind {
                MarkerKind::Information => {
                    self.count(id, Counter::MarkerRx);
                    let request: Option<&[u8; SLOW_PDU_LEN]> = frame
                        .get(ETHERNET_HEADER_LEN..FRAME_LEN)
                        .and_then(|payload| payload.try_into().ok());
                    if let Some(request) = request {
                        if let Err(e) = self.send_marker_response(id, request) {
                            debug!(port = %id, error = %e, "marker response not sent");
                        }
                    }
                }
                MarkerKind::Response => self.count(id, Counter::MarkerRespRx),
                MarkerKind::Unknown(tlv) => {
                    debug!(port = %id, tlv, "unknown marker TLV");
                    self.count(id, Counter::MarkerUnknownRx);
                }
            },
            SlowPdu::Unknown(subtype) => {
                debug!(port = %id, subtype, "unknown slow-protocols subtype");
                self.count(id, Counter::LacpduUnknownRx);
                return Ok(RxVerdict::Passed);
            }
        }
        Ok(RxVerdict::Consumed)
    }

    /// One pass of every machine over every port.
    pub fn tick(&mut self) {
        if self.ports.is_empty() {
            return;
        }
        if expire(&mut self.agg_select_timer) {
            debug!(group = %self.name, "aggregator selection grace period over");
            self.run_agg_selection();
        }

        let clock = self.clock;
        let ids: Vec<PortId> = self.ports.keys().copied().collect();
        for id in ids {
            if let Some(port) = self.ports.get_mut(&id) {
                port.run_rx_machine(None, &clock);
                port.run_periodic_machine(&clock);
            }
            self.run_port_selection(id);
            self.run_mux_machine(id);
            self.run_tx_machine(id);
            if let Some(port) = self.ports.get_mut(&id) {
                port.run_churn_machine(&clock);
                port.vars.begin = false;
            }
        }
    }

    fn count(&mut self, id: PortId, counter: Counter) {
        if let Some(port) = self.ports.get_mut(&id) {
            port.stats.bump(counter);
        }
        self.stats.bump(counter);
    }

    pub(crate) fn update_port(&mut self, id: PortId, f: impl FnOnce(&mut PortRecord)) {
        if let Some(port) = self.ports.get_mut(&id) {
            f(port);
        }
    }

    pub(crate) fn active_aggregator_id(&self) -> Option<AggregatorId> {
        self.active_aggregator().map(|agg| agg.id)
    }

    pub(crate) fn aggregator_is_active(&self, id: AggregatorId) -> bool {
        self.aggregators.get(&id).is_some_and(|agg| agg.is_active)
    }

    pub(crate) fn port_aggregator_is_active(&self, id: PortId) -> bool {
        self.ports
            .get(&id)
            .and_then(|port| port.aggregator)
            .is_some_and(|agg| self.aggregator_is_active(agg))
    }

    pub(crate) fn aggregator_members(&self, id: AggregatorId) -> Vec<PortId> {
        self.aggregators
            .get(&id)
            .map(|agg| agg.ports.clone())
            .unwrap_or_default()
    }

    /// Members whose link is up.
    pub(crate) fn active_ports(&self, id: AggregatorId) -> usize {
        self.aggregator_members(id)
            .iter()
            .filter(|member| self.ports.get(member).is_some_and(|port| port.is_enabled))
            .count()
    }

    /// READY is the AND of READY_N over every member of the aggregator.
    pub(crate) fn refresh_ready(&mut self, agg: Option<AggregatorId>) {
        let Some(agg) = agg else {
            return;
        };
        let members = self.aggregator_members(agg);
        let ready = members
            .iter()
            .all(|member| self.ports.get(member).is_some_and(|port| port.vars.ready_n));
        for member in members {
            self.update_port(member, |port| port.vars.ready = ready);
        }
    }

    /// Starts forwarding on a port whose link is up.
    pub(crate) fn enable_port(&mut self, id: PortId) {
        let Some(port) = self.ports.get_mut(&id) else {
            return;
        };
        if port.is_enabled && !port.forwarding {
            port.forwarding = true;
            debug!(port = %id, "forwarding enabled");
            self.transport.enable_port(id);
        }
    }

    pub(crate) fn disable_port(&mut self, id: PortId) {
        let Some(port) = self.ports.get_mut(&id) else {
            return;
        };
        if port.forwarding {
            port.forwarding = false;
            debug!(port = %id, "forwarding disabled");
            self.transport.disable_port(id);
        }
    }

    /// Carrier is up while an active aggregator has at least `min_links`
    /// members with link up.
    pub(crate) fn update_carrier(&mut self) {
        let up = self
            .active_aggregator_id()
            .is_some_and(|agg| self.active_ports(agg) >= self.config.min_links);
        if up == self.carrier_up {
            return;
        }
        self.carrier_up = up;
        info!(group = %self.name, up, "carrier changed");
        self.transport.carrier_changed(up);
    }
}
