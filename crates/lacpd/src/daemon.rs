//! Builds the configured group (and optional simulated partner) and runs
//! the tick drivers, event routers and snapshot writer until shutdown.

use crate::config_file::LacpdConfig;
use crate::driver::GroupTickDriver;
use crate::error::Result;
use crate::snapshot::run_snapshots;
use crate::transport::{ChannelTransport, TransportEvent};
use crate::wiring::{route_events, Peer, RouteSummary};
use rand::Rng;
use sonic_lacp::{Group, GroupHandle, PortConfig, PortId};
use sonic_types::MacAddress;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One group with the receiving end of its transport.
struct Node {
    handle: GroupHandle,
    events: UnboundedReceiver<TransportEvent>,
    ports: Vec<PortId>,
}

impl Node {
    fn build(
        name: String,
        mac: MacAddress,
        config: &sonic_lacp::LacpConfig,
        ports: Vec<PortConfig>,
    ) -> Result<Self> {
        let (transport, events) = ChannelTransport::channel();
        let mut group = Group::new(name, mac, config.clone(), Arc::new(transport))?;
        let ports = ports
            .into_iter()
            .map(|port| group.bind_port(port))
            .collect::<sonic_lacp::Result<Vec<_>>>()?;
        Ok(Self {
            handle: GroupHandle::new(group),
            events,
            ports,
        })
    }
}

/// Totals reported after shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub routed: RouteSummary,
    pub snapshots: u64,
    pub carrier_up: bool,
}

pub struct Daemon {
    config: LacpdConfig,
    local: Node,
    partner: Option<Node>,
}

fn random_local_mac() -> MacAddress {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill(&mut bytes);
    MacAddress::new(bytes).into_local_unicast()
}

impl Daemon {
    pub fn build(config: &LacpdConfig) -> Result<Self> {
        let group = &config.group;
        let local = Node::build(group.name.clone(), group.mac, &group.lacp, config.ports.clone())?;

        let partner = if config.partner.enabled {
            let mac = config.partner.system_mac.unwrap_or_else(random_local_mac);
            let mut lacp = group.lacp.clone();
            lacp.system_priority = config.partner.system_priority;
            lacp.system_mac = None;
            let ports = config
                .ports
                .iter()
                .map(|port| {
                    let mut mirror = port.clone();
                    mirror.mac = random_local_mac();
                    mirror
                })
                .collect();
            info!(system = %mac, ports = config.ports.len(), "simulated partner cabled back to back");
            Some(Node::build(format!("{}-partner", group.name), mac, &lacp, ports)?)
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            local,
            partner,
        })
    }

    pub fn handle(&self) -> &GroupHandle {
        &self.local.handle
    }

    pub fn partner_handle(&self) -> Option<&GroupHandle> {
        self.partner.as_ref().map(|node| &node.handle)
    }

    /// Runs until `cancel` fires or, when `tick_budget` is set, until the
    /// local group has ticked that many times.
    pub async fn run(self, cancel: CancellationToken, tick_budget: Option<u64>) -> RunSummary {
        let Daemon {
            config,
            local,
            partner,
        } = self;
        let Node {
            handle: local_handle,
            events: local_events,
            ports: local_ports,
        } = local;
        let period = config.group.lacp.tick_interval();
        let stop = cancel.child_token();

        let (local_peer, partner_parts) = match partner {
            Some(node) => {
                let cables: BTreeMap<PortId, PortId> =
                    local_ports.iter().copied().zip(node.ports.iter().copied()).collect();
                let reverse = cables.iter().map(|(a, b)| (*b, *a)).collect();
                let local_peer = Peer {
                    handle: node.handle.clone(),
                    cables,
                };
                let partner_peer = Peer {
                    handle: local_handle.clone(),
                    cables: reverse,
                };
                (Some(local_peer), Some((node.handle, node.events, partner_peer)))
            }
            None => (None, None),
        };
        let partner_handle = partner_parts.as_ref().map(|(handle, _, _)| handle.clone());

        let drivers = async {
            let local_driver = GroupTickDriver::new(local_handle.clone(), period)
                .with_budget(tick_budget)
                .run(stop.clone());
            let partner_driver = async {
                match &partner_handle {
                    Some(handle) => {
                        GroupTickDriver::new(handle.clone(), period)
                            .with_budget(tick_budget)
                            .run(stop.clone())
                            .await
                    }
                    None => 0,
                }
            };
            let (ticks, _) = tokio::join!(local_driver, partner_driver);
            // budget used up or shutdown requested: stop everything else
            stop.cancel();
            ticks
        };

        let local_router = route_events(
            config.group.name.clone(),
            local_events,
            local_peer,
            stop.clone(),
        );
        let partner_router = async {
            match partner_parts {
                Some((handle, events, peer)) => {
                    let name = handle.with(|group| group.name().to_string());
                    Some(route_events(name, events, Some(peer), stop.clone()).await)
                }
                None => None,
            }
        };
        let snapshots = async {
            match &config.daemon.state_file {
                Some(path) => {
                    run_snapshots(
                        path.clone(),
                        config.snapshot_interval(),
                        local_handle.clone(),
                        partner_handle.clone(),
                        stop.clone(),
                    )
                    .await
                }
                None => 0,
            }
        };

        let (ticks, routed, partner_routed, snapshots) =
            tokio::join!(drivers, local_router, partner_router, snapshots);
        if let Some(partner_routed) = partner_routed {
            info!(?partner_routed, "simulated partner stopped");
        }

        RunSummary {
            ticks,
            routed,
            snapshots,
            carrier_up: local_handle.with(|group| group.carrier_up()),
        }
    }
}
