//! Routes transport events of one group to the far end of its cables.

use crate::transport::TransportEvent;
use sonic_lacp::{GroupHandle, PortId};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// The group on the other end of the cables, and which of its ports each
/// local port is plugged into.
#[derive(Debug, Clone)]
pub struct Peer {
    pub handle: GroupHandle,
    pub cables: BTreeMap<PortId, PortId>,
}

/// Counters reported when a router stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    pub frames_forwarded: u64,
    pub frames_dropped: u64,
    pub carrier_changes: u64,
}

/// Consumes events until cancelled or until every sender is gone.
pub async fn route_events(
    group: String,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    peer: Option<Peer>,
    cancel: CancellationToken,
) -> RouteSummary {
    let mut summary = RouteSummary::default();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            TransportEvent::Frame { port, frame } => {
                let far_end = peer
                    .as_ref()
                    .and_then(|peer| peer.cables.get(&port).map(|far| (peer, *far)));
                match far_end {
                    Some((peer, far)) => {
                        peer.handle.deliver(far, frame);
                        summary.frames_forwarded += 1;
                    }
                    None => {
                        trace!(%group, %port, len = frame.len(), "no cable, frame dropped");
                        summary.frames_dropped += 1;
                    }
                }
            }
            TransportEvent::Enable(port) => debug!(%group, %port, "port collecting and distributing"),
            TransportEvent::Disable(port) => debug!(%group, %port, "port stopped distributing"),
            TransportEvent::Carrier(up) => {
                summary.carrier_changes += 1;
                info!(%group, up, "carrier");
            }
        }
    }
    debug!(%group, ?summary, "event router stopped");
    summary
}
