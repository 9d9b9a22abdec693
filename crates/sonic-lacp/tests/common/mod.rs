//! Two groups cabled back to back.

#![allow(dead_code)]

use parking_lot::Mutex;
use sonic_lacp::{Group, GroupHandle, LacpConfig, LinkTransport, PortConfig, PortId, TransportError};
use sonic_types::{LinkSpeed, MacAddress};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Collects frames sent by one group until the wire carries them over.
#[derive(Default)]
pub struct WireEnd {
    outbox: Mutex<Vec<(PortId, Vec<u8>)>>,
    forwarding: Mutex<BTreeSet<PortId>>,
    carrier: Mutex<Vec<bool>>,
}

impl WireEnd {
    pub fn take_frames(&self) -> Vec<(PortId, Vec<u8>)> {
        std::mem::take(&mut *self.outbox.lock())
    }

    pub fn forwarding(&self) -> BTreeSet<PortId> {
        self.forwarding.lock().clone()
    }

    /// Every carrier notification, oldest first.
    pub fn carrier_changes(&self) -> Vec<bool> {
        self.carrier.lock().clone()
    }
}

impl LinkTransport for WireEnd {
    fn send_frame(&self, port: PortId, frame: Vec<u8>) -> Result<(), TransportError> {
        self.outbox.lock().push((port, frame));
        Ok(())
    }

    fn enable_port(&self, port: PortId) {
        self.forwarding.lock().insert(port);
    }

    fn disable_port(&self, port: PortId) {
        self.forwarding.lock().remove(&port);
    }

    fn carrier_changed(&self, up: bool) {
        self.carrier.lock().push(up);
    }
}

/// A cable between port `a` of the left group and port `b` of the right.
#[derive(Debug, Clone, Copy)]
pub struct Cable {
    pub a: PortId,
    pub b: PortId,
    pub cut: bool,
}

pub struct BackToBack {
    pub left: GroupHandle,
    pub right: GroupHandle,
    pub left_end: Arc<WireEnd>,
    pub right_end: Arc<WireEnd>,
    pub cables: Vec<Cable>,
}

pub const LEFT_MAC: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0x0a, 0x01]);
pub const RIGHT_MAC: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0x0b, 0x01]);

fn group(name: &str, mac: MacAddress, config: LacpConfig, end: Arc<WireEnd>) -> Group {
    Group::new(name, mac, config, end).expect("valid group")
}

impl BackToBack {
    /// Builds both groups with `links` cables at `speed`.
    pub fn new(config: LacpConfig, links: u8, speed: LinkSpeed) -> Self {
        let left_end = Arc::new(WireEnd::default());
        let right_end = Arc::new(WireEnd::default());
        let mut left = group("PortChannel0001", LEFT_MAC, config.clone(), left_end.clone());
        let mut right = group("PortChannel0002", RIGHT_MAC, config, right_end.clone());

        let mut cables = Vec::new();
        for i in 0..links {
            let a = left
                .bind_port(
                    PortConfig::new(format!("Ethernet{}", i * 4), MacAddress::new([2, 0, 0, 0xa, 1, i]))
                        .with_speed(speed),
                )
                .expect("bind left");
            let b = right
                .bind_port(
                    PortConfig::new(format!("Ethernet{}", i * 4), MacAddress::new([2, 0, 0, 0xb, 1, i]))
                        .with_speed(speed),
                )
                .expect("bind right");
            cables.push(Cable { a, b, cut: false });
        }

        Self {
            left: GroupHandle::new(left),
            right: GroupHandle::new(right),
            left_end,
            right_end,
            cables,
        }
    }

    /// Stops frames on cable `index` in both directions.
    pub fn cut(&mut self, index: usize) {
        self.cables[index].cut = true;
    }

    pub fn splice(&mut self, index: usize) {
        self.cables[index].cut = false;
    }

    /// Carries every queued frame to the far side until both ends are quiet.
    pub fn exchange(&self) {
        for _ in 0..16 {
            let from_left = self.left_end.take_frames();
            let from_right = self.right_end.take_frames();
            if from_left.is_empty() && from_right.is_empty() {
                return;
            }
            for (port, frame) in from_left {
                if let Some(cable) = self.cables.iter().find(|c| c.a == port && !c.cut) {
                    self.right.deliver(cable.b, frame);
                }
            }
            for (port, frame) in from_right {
                if let Some(cable) = self.cables.iter().find(|c| c.b == port && !c.cut) {
                    self.left.deliver(cable.a, frame);
                }
            }
        }
    }

    pub fn step(&self) {
        self.left.tick();
        self.right.tick();
        self.exchange();
    }

    pub fn run(&self, ticks: usize) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Steps until `done` holds, returning the number of ticks taken.
    pub fn run_until(&self, max: usize, done: impl Fn(&Self) -> bool) -> Option<usize> {
        for n in 1..=max {
            self.step();
            if done(self) {
                return Some(n);
            }
        }
        None
    }
}

/// True once every port of the group distributes on one active aggregator.
pub fn fully_aggregated(handle: &GroupHandle) -> bool {
    handle.with(|g| {
        let Some(active) = g.active_aggregator() else {
            return false;
        };
        g.ports().all(|port| {
            port.aggregator() == Some(active.id())
                && port.actor_state().contains(
                    sonic_lacp::PortState::COLLECTING | sonic_lacp::PortState::DISTRIBUTING,
                )
        })
    })
}
