//! Candidate logical links.

use crate::port::PortId;
use serde::{Deserialize, Serialize};
use sonic_types::MacAddress;
use std::fmt;

/// Aggregator identifier, 1-based and never reused within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatorId(u16);

impl AggregatorId {
    pub const fn new(id: u16) -> Self {
        AggregatorId(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for AggregatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group of ports sharing keys and partner identity.
///
/// Every port owns exactly one aggregator slot (its `owner`), but may be
/// attached to any aggregator of the group. Members are referenced by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    pub(crate) id: AggregatorId,
    pub(crate) mac: MacAddress,
    pub(crate) owner: PortId,
    pub(crate) actor_admin_key: u16,
    pub(crate) actor_oper_key: u16,
    pub(crate) partner_system: MacAddress,
    pub(crate) partner_system_priority: u16,
    pub(crate) partner_oper_key: u16,
    pub(crate) ports: Vec<PortId>,
    pub(crate) is_active: bool,
    /// Members cannot aggregate (half duplex).
    pub(crate) is_individual: bool,
}

impl Aggregator {
    pub(crate) fn new(id: AggregatorId, mac: MacAddress, owner: PortId) -> Self {
        Self {
            id,
            mac,
            owner,
            actor_admin_key: 0,
            actor_oper_key: 0,
            partner_system: MacAddress::ZERO,
            partner_system_priority: 0,
            partner_oper_key: 0,
            ports: Vec::new(),
            is_active: false,
            is_individual: false,
        }
    }

    /// Frees the slot, resetting every matching criterion.
    pub(crate) fn clear(&mut self) {
        self.actor_admin_key = 0;
        self.actor_oper_key = 0;
        self.partner_system = MacAddress::ZERO;
        self.partner_system_priority = 0;
        self.partner_oper_key = 0;
        self.ports.clear();
        self.is_active = false;
        self.is_individual = false;
    }

    /// Copies identity and membership from `other`, keeping our id, MAC and
    /// owner.
    pub(crate) fn take_over(&mut self, other: &Aggregator) {
        self.actor_admin_key = other.actor_admin_key;
        self.actor_oper_key = other.actor_oper_key;
        self.partner_system = other.partner_system;
        self.partner_system_priority = other.partner_system_priority;
        self.partner_oper_key = other.partner_oper_key;
        self.ports = other.ports.clone();
        self.is_active = other.is_active;
        self.is_individual = other.is_individual;
    }

    pub fn id(&self) -> AggregatorId {
        self.id
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn owner(&self) -> PortId {
        self.owner
    }

    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    pub fn is_free(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_individual(&self) -> bool {
        self.is_individual
    }

    pub fn actor_oper_key(&self) -> u16 {
        self.actor_oper_key
    }

    pub fn partner_oper_key(&self) -> u16 {
        self.partner_oper_key
    }

    pub fn partner_system(&self) -> MacAddress {
        self.partner_system
    }

    /// A partner has answered on behalf of this aggregator.
    pub fn has_partner(&self) -> bool {
        !self.partner_system.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clear_frees_slot() {
        let mut agg = Aggregator::new(
            AggregatorId::new(2),
            MacAddress::new([2, 0, 0, 0, 0, 9]),
            PortId::new(2),
        );
        agg.actor_oper_key = 0x09;
        agg.partner_system = MacAddress::new([2, 0, 0, 0, 0, 7]);
        agg.ports = vec![PortId::new(2), PortId::new(3)];
        agg.is_active = true;
        assert!(agg.has_partner());

        agg.clear();
        assert!(agg.is_free());
        assert!(!agg.has_partner());
        assert!(!agg.is_active());
        assert_eq!(agg.owner(), PortId::new(2));
        assert_eq!(agg.id().to_string(), "2");
    }

    #[test]
    fn test_take_over_keeps_identity() {
        let mac = MacAddress::new([2, 0, 0, 0, 0, 1]);
        let mut source = Aggregator::new(AggregatorId::new(1), mac, PortId::new(1));
        source.actor_oper_key = 0x0f;
        source.ports = vec![PortId::new(1), PortId::new(2)];
        source.is_active = true;

        let mut target = Aggregator::new(AggregatorId::new(3), mac, PortId::new(3));
        target.take_over(&source);
        assert_eq!(target.id(), AggregatorId::new(3));
        assert_eq!(target.owner(), PortId::new(3));
        assert_eq!(target.ports(), source.ports());
        assert!(target.is_active());
    }
}
