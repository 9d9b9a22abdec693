//! Periodic JSON export of group state.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sonic_lacp::{GroupHandle, GroupStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub group: GroupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner: Option<GroupStatus>,
}

impl Snapshot {
    pub fn capture(group: &GroupHandle, partner: Option<&GroupHandle>) -> Self {
        Self {
            timestamp: Utc::now(),
            group: group.status(),
            partner: partner.map(GroupHandle::status),
        }
    }

    /// Writes next to `path` first and renames over it, so readers never see
    /// a partial file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = temp_path(path);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Exports a snapshot every `period` and once more on cancellation. Returns
/// how many were written.
pub async fn run_snapshots(
    path: PathBuf,
    period: Duration,
    group: GroupHandle,
    partner: Option<GroupHandle>,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut written = 0u64;
    let mut write = || match Snapshot::capture(&group, partner.as_ref()).write(&path) {
        Ok(()) => written += 1,
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write state snapshot"),
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => write(),
        }
    }
    write();
    debug!(path = %path.display(), written, "snapshot writer stopped");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_lacp::{Group, LacpConfig, NullTransport, PortConfig};
    use sonic_types::MacAddress;
    use std::sync::Arc;

    fn handle() -> GroupHandle {
        let mut group = Group::new(
            "PortChannel0001",
            MacAddress::new([2, 0, 0, 0, 0, 1]),
            LacpConfig::default(),
            Arc::new(NullTransport),
        )
        .unwrap();
        group
            .bind_port(PortConfig::new("Ethernet0", MacAddress::new([2, 0, 0, 0, 1, 0])))
            .unwrap();
        GroupHandle::new(group)
    }

    #[test]
    fn test_write_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lacpd.json");
        fs::write(&path, "stale").unwrap();

        Snapshot::capture(&handle(), None).write(&path).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["group"]["name"], "PortChannel0001");
        assert!(json["timestamp"].is_string());
        assert!(json.get("partner").is_none());
        assert!(!dir.path().join("lacpd.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_final_snapshot_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let written = run_snapshots(path.clone(), Duration::from_secs(60), handle(), Some(handle()), cancel).await;
        assert_eq!(written, 1);
        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["partner"]["ports"][0]["name"], "Ethernet0");
    }
}
