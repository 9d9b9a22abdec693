//! Configuration file support for lacpd
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/sonic/lacpd.toml
//!
//! ```toml
//! [group]
//! name = "PortChannel0001"
//! mac = "02:00:00:00:00:01"
//! lacp_rate = "fast"
//! min_links = 1
//!
//! [[ports]]
//! name = "Ethernet0"
//! mac = "02:00:00:00:01:00"
//! speed = "100G"
//!
//! [daemon]
//! state_file = "/var/run/lacpd/PortChannel0001.json"
//!
//! [partner]
//! enabled = true
//! ```

use crate::error::{LacpdError, Result};
use serde::{Deserialize, Serialize};
use sonic_lacp::{LacpConfig, PortConfig};
use sonic_types::MacAddress;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/lacpd.toml";

/// The bonding group this daemon runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSection {
    #[serde(default = "default_group_name")]
    pub name: String,

    /// Device address, also the default actor system id
    #[serde(default = "default_group_mac")]
    pub mac: MacAddress,

    #[serde(flatten)]
    pub lacp: LacpConfig,
}

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSection {
    /// JSON state export, disabled when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

/// Simulated link partner cabled back to back with every configured port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerSection {
    #[serde(default)]
    pub enabled: bool,

    /// Random locally administered address when unset
    #[serde(default)]
    pub system_mac: Option<MacAddress>,

    #[serde(default = "default_partner_priority")]
    pub system_priority: u16,
}

/// Complete lacpd configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LacpdConfig {
    #[serde(default)]
    pub group: GroupSection,

    #[serde(default)]
    pub ports: Vec<PortConfig>,

    #[serde(default)]
    pub daemon: DaemonSection,

    #[serde(default)]
    pub partner: PartnerSection,
}

fn default_group_name() -> String {
    "PortChannel0001".to_string()
}

fn default_group_mac() -> MacAddress {
    MacAddress::new([0x02, 0, 0, 0, 0, 0x01])
}

fn default_snapshot_interval() -> u64 {
    5
}

fn default_partner_priority() -> u16 {
    0xffff
}

impl Default for GroupSection {
    fn default() -> Self {
        Self {
            name: default_group_name(),
            mac: default_group_mac(),
            lacp: LacpConfig::default(),
        }
    }
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            state_file: None,
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

impl Default for PartnerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            system_mac: None,
            system_priority: default_partner_priority(),
        }
    }
}

impl LacpdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                LacpdError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(LacpdError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            LacpdError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get snapshot interval as Duration
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.snapshot_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.group.name.is_empty() {
            return Err(LacpdError::Configuration(
                "group name must not be empty".to_string(),
            ));
        }
        if self.group.mac.is_multicast() || self.group.mac.is_zero() {
            return Err(LacpdError::Configuration(format!(
                "group mac {} is not a unicast address",
                self.group.mac
            )));
        }
        self.group.lacp.validate()?;

        let mut names = BTreeSet::new();
        for port in &self.ports {
            port.validate()?;
            if !names.insert(port.name.as_str()) {
                return Err(LacpdError::Configuration(format!(
                    "port {} is listed twice",
                    port.name
                )));
            }
        }

        if self.daemon.snapshot_interval_secs == 0 {
            return Err(LacpdError::Configuration(
                "snapshot_interval_secs must be > 0".to_string(),
            ));
        }

        if let Some(mac) = self.partner.system_mac {
            if mac.is_multicast() {
                return Err(LacpdError::Configuration(format!(
                    "partner system_mac {} is a multicast address",
                    mac
                )));
            }
            if self.partner.enabled && mac == self.group.lacp.system_mac.unwrap_or(self.group.mac) {
                return Err(LacpdError::Configuration(
                    "partner system_mac equals the local system id".to_string(),
                ));
            }
        }

        Ok(())
    }
}
