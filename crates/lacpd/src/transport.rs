//! `LinkTransport` backed by a tokio channel.

use sonic_lacp::{LinkTransport, PortId, TransportError};
use tokio::sync::mpsc;
use tracing::trace;

/// What a group asked the link layer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame { port: PortId, frame: Vec<u8> },
    Enable(PortId),
    Disable(PortId),
    Carrier(bool),
}

/// Forwards every request into an unbounded channel, so calls made under the
/// group lock never wait.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn notify(&self, event: TransportEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = ?e.0, "event router gone, dropping event");
        }
    }
}

impl LinkTransport for ChannelTransport {
    fn send_frame(&self, port: PortId, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(TransportEvent::Frame { port, frame })
            .map_err(|_| TransportError::Closed)
    }

    fn enable_port(&self, port: PortId) {
        self.notify(TransportEvent::Enable(port));
    }

    fn disable_port(&self, port: PortId) {
        self.notify(TransportEvent::Disable(port));
    }

    fn carrier_changed(&self, up: bool) {
        self.notify(TransportEvent::Carrier(up));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_events_arrive_in_order() {
        let (transport, mut rx) = ChannelTransport::channel();
        let port = PortId::new(1);
        transport.send_frame(port, vec![1, 2, 3]).unwrap();
        transport.enable_port(port);
        transport.carrier_changed(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Frame { port, frame: vec![1, 2, 3] }
        );
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::Enable(port));
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::Carrier(true));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_fails_frames_only() {
        let (transport, rx) = ChannelTransport::channel();
        drop(rx);
        assert_eq!(
            transport.send_frame(PortId::new(1), vec![0]),
            Err(TransportError::Closed)
        );
        // notifications are fire and forget
        transport.disable_port(PortId::new(1));
    }
}
