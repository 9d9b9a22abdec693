//! Capability interface between the engine and the link layer.

use crate::port::PortId;
use thiserror::Error;

/// Transport-level failures reported by [`LinkTransport::send_frame`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("port unavailable: {0}")]
    Unavailable(String),
}

/// Frame I/O and forwarding control for the member links of one group.
///
/// Every call is made while the group lock is held, so implementations must
/// not block: hand the work off (queue, channel) and return.
pub trait LinkTransport: Send + Sync {
    /// Queues a complete Ethernet frame for transmission on `port`.
    fn send_frame(&self, port: PortId, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Lets `port` collect and distribute aggregated traffic.
    fn enable_port(&self, port: PortId);

    /// Stops aggregated traffic on `port`.
    fn disable_port(&self, port: PortId);

    /// The group's logical link went up or down.
    fn carrier_changed(&self, up: bool);
}

/// Transport that drops every frame. Useful when only the state is of
/// interest.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl LinkTransport for NullTransport {
    fn send_frame(&self, _port: PortId, _frame: Vec<u8>) -> Result<(), TransportError> {
        Ok(())
    }

    fn enable_port(&self, _port: PortId) {}

    fn disable_port(&self, _port: PortId) {}

    fn carrier_changed(&self, _up: bool) {}
}
