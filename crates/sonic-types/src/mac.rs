//! Ethernet station and group addresses.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Individual/group bit of the first octet.
const GROUP_BIT: u8 = 0x01;
/// Universal/local bit of the first octet.
const LOCAL_BIT: u8 = 0x02;

/// A 48-bit IEEE 802 address.
///
/// Serves as port address and as LACP system identifier. Ordering compares
/// octets in transmission order, which is how system ids are ranked.
///
/// ```
/// use sonic_types::MacAddress;
///
/// let system: MacAddress = "02:00:00:00:00:01".parse().unwrap();
/// assert!(system.is_local());
/// assert_eq!(system, "02-00-00-00-00-01".parse::<MacAddress>().unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Partner system recorded before any LACPDU was heard.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Slow-protocols group address (LACP and Marker destination).
    pub const SLOW_PROTOCOLS_MULTICAST: MacAddress =
        MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x02]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Reads the first six octets of `buf`, e.g. a frame header.
    pub fn from_slice(buf: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = buf.get(..6)?.try_into().ok()?;
        Some(MacAddress(octets))
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub const fn is_multicast(&self) -> bool {
        self.0[0] & GROUP_BIT != 0
    }

    pub const fn is_local(&self) -> bool {
        self.0[0] & LOCAL_BIT != 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Forces the locally-administered bit on and the group bit off, so any
    /// six octets become a usable unicast station address.
    pub const fn into_local_unicast(self) -> Self {
        let mut octets = self.0;
        octets[0] = (octets[0] & !GROUP_BIT) | LOCAL_BIT;
        MacAddress(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, one separator style
/// per address.
impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let separator = match s.as_bytes().get(2) {
            Some(b':') => ':',
            Some(b'-') => '-',
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; 6];
        let mut fields = s.split(separator);
        for octet in octets.iter_mut() {
            let field = fields.next().ok_or_else(invalid)?;
            if field.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(field, 16).map_err(|_| invalid())?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slow_protocols_group_address() {
        let dst = MacAddress::SLOW_PROTOCOLS_MULTICAST;
        assert!(dst.is_multicast());
        assert!(!dst.is_local());
        assert_eq!(dst.to_string(), "01:80:c2:00:00:02");
    }

    #[test]
    fn test_header_octets() {
        let header = [0x01, 0x80, 0xc2, 0x00, 0x00, 0x02, 0x02, 0x00];
        assert_eq!(
            MacAddress::from_slice(&header),
            Some(MacAddress::SLOW_PROTOCOLS_MULTICAST)
        );
        assert_eq!(MacAddress::from_slice(&header[..5]), None);
    }

    #[test]
    fn test_unanswered_partner_is_zero() {
        assert!(MacAddress::ZERO.is_zero());
        assert!(MacAddress::default().is_zero());
        assert!(!MacAddress::new([0, 0, 0, 0, 0, 1]).is_zero());
    }

    #[test]
    fn test_random_octets_become_station_address() {
        let mac = MacAddress::new([0xff, 0xa1, 0, 0, 0, 0x7e]).into_local_unicast();
        assert_eq!(mac.to_string(), "fe:a1:00:00:00:7e");
        assert!(mac.is_local());
        assert!(!mac.is_multicast());
    }

    #[test]
    fn test_system_ids_rank_by_octets() {
        let low: MacAddress = "00:00:00:00:00:ff".parse().unwrap();
        let high: MacAddress = "00:00:00:00:01:00".parse().unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_rejects_malformed_text() {
        for bad in [
            "",
            "0:11:22:33:44:55",
            "00:11:22:33:44",
            "00:11:22:33:44:55:66",
            "00:11-22:33:44:55",
            "zz:11:22:33:44:55",
            "0011.2233.4455",
        ] {
            assert!(bad.parse::<MacAddress>().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_serde_uses_text_form() {
        let mac: MacAddress = serde_json::from_str("\"02-00-00-00-0A-01\"").unwrap();
        assert_eq!(mac, MacAddress::new([2, 0, 0, 0, 0x0a, 1]));
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"02:00:00:00:0a:01\"");
    }
}
