//! Group and port configuration.

use crate::error::{LacpError, Result};
use crate::timers::TickClock;
use serde::{Deserialize, Serialize};
use sonic_types::{Duplex, LinkSpeed, MacAddress};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Largest user key that fits in bits 6-15 of the operational key.
pub const MAX_USER_PORT_KEY: u16 = 0x3ff;
pub const DEFAULT_PORT_PRIORITY: u16 = 0xff;
const MAX_TICKS_PER_SEC: u16 = 100;

/// Policy used to pick the active aggregator of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Keep the current aggregator while its partner still answers.
    #[default]
    Stable,
    /// Prefer the highest aggregate bandwidth.
    Bandwidth,
    /// Prefer the most active ports, then bandwidth.
    Count,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectionPolicy::Stable => "stable",
            SelectionPolicy::Bandwidth => "bandwidth",
            SelectionPolicy::Count => "count",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SelectionPolicy {
    type Err = LacpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stable" => Ok(SelectionPolicy::Stable),
            "bandwidth" => Ok(SelectionPolicy::Bandwidth),
            "count" => Ok(SelectionPolicy::Count),
            _ => Err(LacpError::InvalidConfig(format!(
                "unknown selection policy: {}",
                s
            ))),
        }
    }
}

/// Rate at which we ask the partner to send LACPDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpRate {
    /// Every 30 seconds, 90 second timeout.
    #[default]
    Slow,
    /// Every second, 3 second timeout.
    Fast,
}

impl LacpRate {
    pub const fn is_fast(self) -> bool {
        matches!(self, LacpRate::Fast)
    }
}

impl fmt::Display for LacpRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LacpRate::Slow => write!(f, "slow"),
            LacpRate::Fast => write!(f, "fast"),
        }
    }
}

/// Per-group LACP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LacpConfig {
    /// Actor system priority
    #[serde(default = "default_system_priority")]
    pub system_priority: u16,

    /// Overrides the group MAC as actor system id
    #[serde(default)]
    pub system_mac: Option<MacAddress>,

    /// User part of the operational key (bits 6-15)
    #[serde(default)]
    pub user_port_key: u16,

    #[serde(default)]
    pub selection_policy: SelectionPolicy,

    #[serde(default)]
    pub lacp_rate: LacpRate,

    /// Active ports needed on the active aggregator for carrier up
    #[serde(default)]
    pub min_links: usize,

    /// Group tick resolution
    #[serde(default = "default_ticks_per_sec")]
    pub ticks_per_sec: u16,
}

fn default_system_priority() -> u16 {
    0xffff
}

fn default_ticks_per_sec() -> u16 {
    10
}

impl Default for LacpConfig {
    fn default() -> Self {
        Self {
            system_priority: default_system_priority(),
            system_mac: None,
            user_port_key: 0,
            selection_policy: SelectionPolicy::default(),
            lacp_rate: LacpRate::default(),
            min_links: 0,
            ticks_per_sec: default_ticks_per_sec(),
        }
    }
}

impl LacpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_port_key > MAX_USER_PORT_KEY {
            return Err(LacpError::InvalidConfig(format!(
                "user_port_key {} exceeds {}",
                self.user_port_key, MAX_USER_PORT_KEY
            )));
        }
        if self.ticks_per_sec == 0 || self.ticks_per_sec > MAX_TICKS_PER_SEC {
            return Err(LacpError::InvalidConfig(format!(
                "ticks_per_sec must be 1-{}, got {}",
                MAX_TICKS_PER_SEC, self.ticks_per_sec
            )));
        }
        if let Some(mac) = self.system_mac {
            if mac.is_multicast() {
                return Err(LacpError::InvalidConfig(format!(
                    "system_mac {} is a multicast address",
                    mac
                )));
            }
        }
        Ok(())
    }

    pub fn clock(&self) -> TickClock {
        TickClock::new(self.ticks_per_sec)
    }

    /// Get tick period as Duration
    pub fn tick_interval(&self) -> Duration {
        self.clock().tick_interval()
    }
}

/// Configuration of one member link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub name: String,

    /// Permanent hardware address, used as frame source
    pub mac: MacAddress,

    /// Speed reported by the adapter, if known
    #[serde(default)]
    pub speed: Option<LinkSpeed>,

    #[serde(default)]
    pub duplex: Duplex,

    #[serde(default = "default_link_up")]
    pub link_up: bool,

    /// Actor port priority, defaults to 255
    #[serde(default)]
    pub priority: Option<u16>,

    /// Overrides the group user key for this port
    #[serde(default)]
    pub user_key: Option<u16>,
}

fn default_link_up() -> bool {
    true
}

impl PortConfig {
    pub fn new(name: impl Into<String>, mac: MacAddress) -> Self {
        Self {
            name: name.into(),
            mac,
            speed: None,
            duplex: Duplex::Full,
            link_up: true,
            priority: None,
            user_key: None,
        }
    }

    pub fn with_speed(mut self, speed: LinkSpeed) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_duplex(mut self, duplex: Duplex) -> Self {
        self.duplex = duplex;
        self
    }

    pub fn with_link_up(mut self, link_up: bool) -> Self {
        self.link_up = link_up;
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_user_key(mut self, user_key: u16) -> Self {
        self.user_key = Some(user_key);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LacpError::InvalidConfig("port name is empty".to_string()));
        }
        if let Some(key) = self.user_key {
            if key > MAX_USER_PORT_KEY {
                return Err(LacpError::InvalidConfig(format!(
                    "port {}: user_key {} exceeds {}",
                    self.name, key, MAX_USER_PORT_KEY
                )));
            }
        }
        Ok(())
    }
}
