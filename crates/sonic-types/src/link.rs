//! Link speed and duplex as reported by a port adapter.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Negotiated link speed.
///
/// The discriminant is the 5-bit speed code carried in bits 1-5 of an
/// LACP operational key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum LinkSpeed {
    Mbps1 = 1,
    Mbps10,
    Mbps100,
    Gbps1,
    Mbps2500,
    Gbps5,
    Gbps10,
    Gbps14,
    Gbps20,
    Gbps25,
    Gbps40,
    Gbps50,
    Gbps56,
    Gbps100,
    Gbps200,
    Gbps400,
}

impl LinkSpeed {
    const ALL: [LinkSpeed; 16] = [
        LinkSpeed::Mbps1,
        LinkSpeed::Mbps10,
        LinkSpeed::Mbps100,
        LinkSpeed::Gbps1,
        LinkSpeed::Mbps2500,
        LinkSpeed::Gbps5,
        LinkSpeed::Gbps10,
        LinkSpeed::Gbps14,
        LinkSpeed::Gbps20,
        LinkSpeed::Gbps25,
        LinkSpeed::Gbps40,
        LinkSpeed::Gbps50,
        LinkSpeed::Gbps56,
        LinkSpeed::Gbps100,
        LinkSpeed::Gbps200,
        LinkSpeed::Gbps400,
    ];

    /// Speed in megabits per second.
    pub const fn mbps(self) -> u32 {
        match self {
            LinkSpeed::Mbps1 => 1,
            LinkSpeed::Mbps10 => 10,
            LinkSpeed::Mbps100 => 100,
            LinkSpeed::Gbps1 => 1_000,
            LinkSpeed::Mbps2500 => 2_500,
            LinkSpeed::Gbps5 => 5_000,
            LinkSpeed::Gbps10 => 10_000,
            LinkSpeed::Gbps14 => 14_000,
            LinkSpeed::Gbps20 => 20_000,
            LinkSpeed::Gbps25 => 25_000,
            LinkSpeed::Gbps40 => 40_000,
            LinkSpeed::Gbps50 => 50_000,
            LinkSpeed::Gbps56 => 56_000,
            LinkSpeed::Gbps100 => 100_000,
            LinkSpeed::Gbps200 => 200_000,
            LinkSpeed::Gbps400 => 400_000,
        }
    }

    /// Maps an adapter-reported speed onto a known value.
    pub fn from_mbps(mbps: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|speed| speed.mbps() == mbps)
    }

    /// Speed code used in the operational key (1..=16).
    pub const fn key_code(self) -> u16 {
        self as u16
    }

    /// Inverse of [`LinkSpeed::key_code`].
    pub fn from_key_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|speed| speed.key_code() == code)
    }
}

impl fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mbps = self.mbps();
        if mbps >= 1_000 && mbps % 1_000 == 0 {
            write!(f, "{}G", mbps / 1_000)
        } else {
            write!(f, "{}M", mbps)
        }
    }
}

impl FromStr for LinkSpeed {
    type Err = ParseError;

    /// Accepts plain megabits (`"25000"`) or a unit suffix (`"25G"`, `"100m"`,
    /// `"2.5G"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::InvalidLinkSpeed(s.to_string());
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();

        let mbps = if let Some(gbps) = lower.strip_suffix('g') {
            if gbps == "2.5" {
                2_500
            } else {
                gbps.parse::<u32>().map_err(|_| err())?.checked_mul(1_000).ok_or_else(err)?
            }
        } else if let Some(mbps) = lower.strip_suffix('m') {
            mbps.parse::<u32>().map_err(|_| err())?
        } else {
            lower.parse::<u32>().map_err(|_| err())?
        };

        LinkSpeed::from_mbps(mbps).ok_or_else(err)
    }
}

impl TryFrom<String> for LinkSpeed {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LinkSpeed> for String {
    fn from(speed: LinkSpeed) -> String {
        speed.to_string()
    }
}

/// Negotiated link duplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Half,
    /// Only full-duplex links take part in LACP.
    #[default]
    Full,
}

impl Duplex {
    /// Returns true for full duplex.
    pub const fn is_full(&self) -> bool {
        matches!(self, Duplex::Full)
    }
}

impl fmt::Display for Duplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Duplex::Half => "half",
            Duplex::Full => "full",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Duplex {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "half" => Ok(Duplex::Half),
            "full" => Ok(Duplex::Full),
            _ => Err(ParseError::InvalidDuplex(s.to_string())),
        }
    }
}
