//! LACPDU and Marker PDU wire formats.
//!
//! Both PDUs travel in slow-protocols frames (ethertype 0x8809) addressed to
//! 01:80:c2:00:00:02 and occupy a fixed 110-byte payload. Fields are in
//! network byte order at fixed offsets:
//!
//! ```text
//! LACPDU                               Marker PDU
//!  0  subtype = 1                       0  subtype = 2
//!  1  version = 1                       1  version = 1
//!  2  actor TLV   (type 1, len 20)      2  marker TLV (type 1 info / 2 response, len 16)
//! 22  partner TLV (type 2, len 20)      4  requester port, system, transaction id, pad
//! 42  collector TLV (type 3, len 16)   18  terminator (type 0, len 0)
//! 58  terminator (type 0, len 0)       20  90 reserved bytes
//! 60  50 reserved bytes
//! ```

use crate::error::PduError;
use crate::state::PortState;
use byteorder::{ByteOrder, NetworkEndian};
use serde::{Deserialize, Serialize};
use sonic_types::MacAddress;

pub const SLOW_PROTOCOLS_ETHERTYPE: u16 = 0x8809;
pub const ETHERNET_HEADER_LEN: usize = 14;
/// Payload length shared by LACPDUs and Marker PDUs.
pub const SLOW_PDU_LEN: usize = 110;
pub const FRAME_LEN: usize = ETHERNET_HEADER_LEN + SLOW_PDU_LEN;

pub const SUBTYPE_LACP: u8 = 1;
pub const SUBTYPE_MARKER: u8 = 2;
const VERSION: u8 = 1;

const TLV_ACTOR: u8 = 1;
const TLV_PARTNER: u8 = 2;
const TLV_COLLECTOR: u8 = 3;
const INFO_TLV_LEN: u8 = 20;
const COLLECTOR_TLV_LEN: u8 = 16;
const MARKER_TLV_LEN: u8 = 16;

const ACTOR_OFFSET: usize = 2;
const MARKER_TLV_OFFSET: usize = 2;
const PARTNER_OFFSET: usize = 22;
const COLLECTOR_OFFSET: usize = 42;

/// Contents of an Actor or Partner information TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LacpInfo {
    pub system_priority: u16,
    pub system: MacAddress,
    pub key: u16,
    pub port_priority: u16,
    pub port: u16,
    pub state: PortState,
}

impl LacpInfo {
    fn write(&self, buf: &mut [u8], tlv_type: u8) {
        buf[0] = tlv_type;
        buf[1] = INFO_TLV_LEN;
        NetworkEndian::write_u16(&mut buf[2..4], self.system_priority);
        buf[4..10].copy_from_slice(self.system.as_bytes());
        NetworkEndian::write_u16(&mut buf[10..12], self.key);
        NetworkEndian::write_u16(&mut buf[12..14], self.port_priority);
        NetworkEndian::write_u16(&mut buf[14..16], self.port);
        buf[16] = self.state.bits();
    }

    fn read(buf: &[u8]) -> Self {
        let mut system = [0u8; 6];
        system.copy_from_slice(&buf[4..10]);
        Self {
            system_priority: NetworkEndian::read_u16(&buf[2..4]),
            system: MacAddress::new(system),
            key: NetworkEndian::read_u16(&buf[10..12]),
            port_priority: NetworkEndian::read_u16(&buf[12..14]),
            port: NetworkEndian::read_u16(&buf[14..16]),
            state: PortState::from_bits(buf[16]),
        }
    }
}

/// A decoded LACPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lacpdu {
    pub actor: LacpInfo,
    pub partner: LacpInfo,
    pub collector_max_delay: u16,
}

impl Lacpdu {
    pub fn encode(&self) -> [u8; SLOW_PDU_LEN] {
        let mut buf = [0u8; SLOW_PDU_LEN];
        buf[0] = SUBTYPE_LACP;
        buf[1] = VERSION;
        self.actor.write(&mut buf[ACTOR_OFFSET..PARTNER_OFFSET], TLV_ACTOR);
        self.partner.write(&mut buf[PARTNER_OFFSET..COLLECTOR_OFFSET], TLV_PARTNER);
        buf[COLLECTOR_OFFSET] = TLV_COLLECTOR;
        buf[COLLECTOR_OFFSET + 1] = COLLECTOR_TLV_LEN;
        NetworkEndian::write_u16(
            &mut buf[COLLECTOR_OFFSET + 2..COLLECTOR_OFFSET + 4],
            self.collector_max_delay,
        );
        // terminator TLV and reserved octets stay zero
        buf
    }

    /// Decodes a payload. TLV types and lengths are not checked, matching
    /// the fixed-layout reading done by deployed LACP implementations.
    pub fn decode(payload: &[u8]) -> Result<Self, PduError> {
        check_len(payload)?;
        Ok(Self {
            actor: LacpInfo::read(&payload[ACTOR_OFFSET..PARTNER_OFFSET]),
            partner: LacpInfo::read(&payload[PARTNER_OFFSET..COLLECTOR_OFFSET]),
            collector_max_delay: NetworkEndian::read_u16(
                &payload[COLLECTOR_OFFSET + 2..COLLECTOR_OFFSET + 4],
            ),
        })
    }
}

/// Marker TLV type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Information,
    Response,
    Unknown(u8),
}

impl MarkerKind {
    const fn from_wire(value: u8) -> Self {
        match value {
            1 => MarkerKind::Information,
            2 => MarkerKind::Response,
            other => MarkerKind::Unknown(other),
        }
    }

    const fn to_wire(self) -> u8 {
        match self {
            MarkerKind::Information => 1,
            MarkerKind::Response => 2,
            MarkerKind::Unknown(other) => other,
        }
    }
}

/// A decoded Marker PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPdu {
    pub kind: MarkerKind,
    pub requester_port: u16,
    pub requester_system: MacAddress,
    pub requester_transaction_id: u32,
}

impl MarkerPdu {
    pub fn encode(&self) -> [u8; SLOW_PDU_LEN] {
        let mut buf = [0u8; SLOW_PDU_LEN];
        buf[0] = SUBTYPE_MARKER;
        buf[1] = VERSION;
        buf[MARKER_TLV_OFFSET] = self.kind.to_wire();
        buf[MARKER_TLV_OFFSET + 1] = MARKER_TLV_LEN;
        NetworkEndian::write_u16(&mut buf[4..6], self.requester_port);
        buf[6..12].copy_from_slice(self.requester_system.as_bytes());
        NetworkEndian::write_u32(&mut buf[12..16], self.requester_transaction_id);
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<Self, PduError> {
        check_len(payload)?;
        let mut system = [0u8; 6];
        system.copy_from_slice(&payload[6..12]);
        Ok(Self {
            kind: MarkerKind::from_wire(payload[MARKER_TLV_OFFSET]),
            requester_port: NetworkEndian::read_u16(&payload[4..6]),
            requester_system: MacAddress::new(system),
            requester_transaction_id: NetworkEndian::read_u32(&payload[12..16]),
        })
    }
}

/// The reply to a Marker Information payload: every octet of the request,
/// pad and reserved bytes included, with only the TLV type rewritten.
pub fn marker_response(info: &[u8; SLOW_PDU_LEN]) -> [u8; SLOW_PDU_LEN] {
    let mut response = *info;
    response[MARKER_TLV_OFFSET] = MarkerKind::Response.to_wire();
    response
}

/// A slow-protocols PDU, dispatched on its subtype octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowPdu {
    Lacp(Lacpdu),
    Marker(MarkerPdu),
    Unknown(u8),
}

/// Parses a complete Ethernet frame carrying a slow-protocols PDU.
pub fn parse_frame(frame: &[u8]) -> Result<SlowPdu, PduError> {
    if frame.len() < ETHERNET_HEADER_LEN {
        return Err(PduError::Runt(frame.len()));
    }
    let ethertype = NetworkEndian::read_u16(&frame[12..14]);
    if ethertype != SLOW_PROTOCOLS_ETHERTYPE {
        return Err(PduError::WrongEthertype(ethertype));
    }
    let destination = MacAddress::from_slice(&frame[0..6]).unwrap_or_default();
    if destination != MacAddress::SLOW_PROTOCOLS_MULTICAST {
        return Err(PduError::WrongDestination(destination));
    }

    let payload = &frame[ETHERNET_HEADER_LEN..];
    if payload.len() < SLOW_PDU_LEN {
        return Err(PduError::Truncated {
            len: frame.len(),
            needed: FRAME_LEN,
        });
    }
    match payload[0] {
        SUBTYPE_LACP => Ok(SlowPdu::Lacp(Lacpdu::decode(payload)?)),
        SUBTYPE_MARKER => Ok(SlowPdu::Marker(MarkerPdu::decode(payload)?)),
        other => Ok(SlowPdu::Unknown(other)),
    }
}

/// Wraps a PDU payload in an Ethernet header sourced from `source`.
pub fn build_frame(source: MacAddress, payload: &[u8; SLOW_PDU_LEN]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(MacAddress::SLOW_PROTOCOLS_MULTICAST.as_bytes());
    frame.extend_from_slice(source.as_bytes());
    frame.extend_from_slice(&SLOW_PROTOCOLS_ETHERTYPE.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn check_len(payload: &[u8]) -> Result<(), PduError> {
    if payload.len() < SLOW_PDU_LEN {
        return Err(PduError::Truncated {
            len: payload.len(),
            needed: SLOW_PDU_LEN,
        });
    }
    Ok(())
}
