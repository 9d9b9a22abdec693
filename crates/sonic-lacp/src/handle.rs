//! Shared access to a group from a ticker and a receive path.

use crate::group::Group;
use crate::port::PortId;
use crate::status::GroupStatus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// A received frame waiting for the group lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub port: PortId,
    pub frame: Vec<u8>,
}

/// Cloneable handle to one group.
///
/// Frames delivered while the group is busy are queued and processed, in
/// arrival order, by whoever takes the lock next.
#[derive(Debug, Clone)]
pub struct GroupHandle {
    group: Arc<Mutex<Group>>,
    inbound: Arc<Mutex<VecDeque<InboundFrame>>>,
}

impl GroupHandle {
    pub fn new(group: Group) -> Self {
        Self {
            group: Arc::new(Mutex::new(group)),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queues a frame and processes it right away if the group is idle.
    pub fn deliver(&self, port: PortId, frame: Vec<u8>) {
        self.inbound.lock().push_back(InboundFrame { port, frame });
        if let Some(mut group) = self.group.try_lock() {
            self.drain(&mut group);
        }
    }

    /// Processes pending frames, then runs one tick.
    pub fn tick(&self) {
        let mut group = self.group.lock();
        self.drain(&mut group);
        group.tick();
    }

    /// Runs `f` under the group lock, after pending frames.
    pub fn with<R>(&self, f: impl FnOnce(&mut Group) -> R) -> R {
        let mut group = self.group.lock();
        self.drain(&mut group);
        f(&mut group)
    }

    pub fn status(&self) -> GroupStatus {
        self.with(|group| group.status())
    }

    /// Frames still waiting for the lock.
    pub fn pending(&self) -> usize {
        self.inbound.lock().len()
    }

    fn drain(&self, group: &mut Group) {
        loop {
            // queue lock is released before the frame is handled
            let Some(inbound) = self.inbound.lock().pop_front() else {
                break;
            };
            if let Err(e) = group.rx_indication(inbound.port, &inbound.frame) {
                debug!(port = %inbound.port, error = %e, "dropping inbound frame");
            }
        }
    }
}
