//! Daemon assembly: config files on disk and short driven runs.

use pretty_assertions::assert_eq;
use sonic_lacp::{LacpError, LacpRate, PortConfig};
use sonic_lacpd::{Daemon, LacpdConfig, LacpdError};
use sonic_types::{LinkSpeed, MacAddress};
use std::fs;
use tokio_util::sync::CancellationToken;

const PARTNER_MAC: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0x0b, 0x01]);

fn two_port_config() -> LacpdConfig {
    let mut config = LacpdConfig::default();
    config.group.lacp.ticks_per_sec = 100;
    config.ports = (0..2u8)
        .map(|i| {
            PortConfig::new(format!("Ethernet{}", i * 4), MacAddress::new([2, 0, 0, 0, 1, i]))
                .with_speed(LinkSpeed::Gbps10)
        })
        .collect();
    config
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lacpd.toml");

    let mut config = two_port_config();
    config.group.lacp.lacp_rate = LacpRate::Fast;
    config.daemon.state_file = Some(dir.path().join("state.json"));
    config.partner.enabled = true;
    config.partner.system_mac = Some(PARTNER_MAC);
    config.save(&path).unwrap();

    let loaded = LacpdConfig::load_or_default(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = LacpdConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded, LacpdConfig::default());
}

#[test]
fn test_malformed_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lacpd.toml");
    fs::write(&path, "[group]\nmin_links = \"many\"\n").unwrap();
    assert!(matches!(
        LacpdConfig::load_or_default(&path),
        Err(LacpdError::Configuration(_))
    ));
}

#[test]
fn test_build_rejects_duplicate_ports() {
    let mut config = two_port_config();
    config.ports[1].name = config.ports[0].name.clone();
    assert!(matches!(
        Daemon::build(&config),
        Err(LacpdError::Lacp(LacpError::DuplicatePort(_)))
    ));
}

#[tokio::test]
async fn test_lone_group_runs_its_budget() {
    let daemon = Daemon::build(&two_port_config()).unwrap();
    assert!(daemon.partner_handle().is_none());

    let summary = daemon.run(CancellationToken::new(), Some(3)).await;
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.snapshots, 0);
    assert_eq!(summary.routed.frames_forwarded, 0);
    // a partnerless aggregator still carries traffic
    assert!(summary.carrier_up);
}

#[tokio::test]
async fn test_simulated_partner_exchanges_lacpdus() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let mut config = two_port_config();
    config.daemon.state_file = Some(state.clone());
    config.partner.enabled = true;
    config.partner.system_mac = Some(PARTNER_MAC);

    let daemon = Daemon::build(&config).unwrap();
    let local = daemon.handle().clone();
    let partner = daemon.partner_handle().cloned().expect("partner group");

    let summary = daemon.run(CancellationToken::new(), Some(60)).await;
    assert_eq!(summary.ticks, 60);
    assert!(summary.routed.frames_forwarded > 0);
    assert!(summary.snapshots >= 1);

    local.with(|group| {
        for port in group.ports() {
            assert_eq!(port.partner().system, PARTNER_MAC);
        }
    });
    partner.with(|group| {
        for port in group.ports() {
            assert_eq!(port.partner().system, config.group.mac);
        }
    });

    let json: serde_json::Value = serde_json::from_slice(&fs::read(&state).unwrap()).unwrap();
    assert_eq!(json["group"]["name"], "PortChannel0001");
    assert_eq!(json["group"]["ports"][0]["partner"]["system"], "02:00:00:00:0b:01");
    assert_eq!(json["group"]["ports"][0]["rx_state"], "current");
    assert_eq!(json["partner"]["name"], "PortChannel0001-partner");
}
