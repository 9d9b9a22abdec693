//! Transmit machine and PDU emission.

use crate::group::Group;
use crate::pdu::{build_frame, marker_response, LacpInfo, Lacpdu, MarkerKind, MarkerPdu, SLOW_PDU_LEN};
use crate::port::{PortId, PortRecord};
use crate::rx::expire;
use crate::stats::Counter;
use crate::transport::TransportError;
use tracing::{debug, trace};

impl PortRecord {
    /// The LACPDU this port would send right now.
    pub fn lacpdu(&self) -> Lacpdu {
        Lacpdu {
            actor: LacpInfo {
                system_priority: self.actor_system_priority,
                system: self.actor_system,
                key: self.actor_oper_key,
                port_priority: self.actor_port_priority,
                port: self.id.number(),
                state: self.actor_oper_state,
            },
            partner: LacpInfo {
                system_priority: self.partner_oper.system_priority,
                system: self.partner_oper.system,
                key: self.partner_oper.key,
                port_priority: self.partner_oper.port_priority,
                port: self.partner_oper.port_number,
                state: self.partner_oper.state,
            },
            collector_max_delay: 0,
        }
    }
}

impl Group {
    /// Sends at most one LACPDU per tx interval, and only when `ntt` is set.
    pub(crate) fn run_tx_machine(&mut self, id: PortId) {
        let Some(port) = self.ports.get_mut(&id) else {
            return;
        };
        if !expire(&mut port.tx_timer) {
            return;
        }
        let due = port.ntt && port.vars.lacp_enabled;
        port.tx_timer = self.clock.tx_interval();

        if due && self.send_lacpdu(id).is_ok() {
            self.update_port(id, |port| port.ntt = false);
        }
    }

    /// Transmits the port's current LACPDU immediately.
    pub(crate) fn send_lacpdu(&mut self, id: PortId) -> Result<(), TransportError> {
        let Some(port) = self.ports.get_mut(&id) else {
            return Err(TransportError::Unavailable(id.to_string()));
        };
        let pdu = port.lacpdu();
        let frame = build_frame(port.mac, &pdu.encode());

        match self.transport.send_frame(id, frame) {
            Ok(()) => {
                port.stats.bump(Counter::LacpduTx);
                self.stats.bump(Counter::LacpduTx);
                trace!(port = %id, state = %pdu.actor.state, "sent LACPDU");
                Ok(())
            }
            Err(e) => {
                debug!(port = %id, error = %e, "LACPDU send failed, will retry");
                Err(e)
            }
        }
    }

    /// Sends a Marker Information PDU carrying the next transaction id.
    pub(crate) fn send_marker_info(&mut self, id: PortId) -> Result<u32, TransportError> {
        let Some(port) = self.ports.get_mut(&id) else {
            return Err(TransportError::Unavailable(id.to_string()));
        };
        port.transaction_id = port.transaction_id.wrapping_add(1);
        let marker = MarkerPdu {
            kind: MarkerKind::Information,
            requester_port: id.number(),
            requester_system: port.actor_system,
            requester_transaction_id: port.transaction_id,
        };
        let frame = build_frame(port.mac, &marker.encode());

        self.transport.send_frame(id, frame)?;
        port.stats.bump(Counter::MarkerTx);
        self.stats.bump(Counter::MarkerTx);
        Ok(marker.requester_transaction_id)
    }

    /// Echoes a received Marker Information payload back as a response.
    pub(crate) fn send_marker_response(
        &mut self,
        id: PortId,
        info: &[u8; SLOW_PDU_LEN],
    ) -> Result<(), TransportError> {
        let Some(port) = self.ports.get_mut(&id) else {
            return Err(TransportError::Unavailable(id.to_string()));
        };
        let frame = build_frame(port.mac, &marker_response(info));

        self.transport.send_frame(id, frame)?;
        port.stats.bump(Counter::MarkerRespTx);
        self.stats.bump(Counter::MarkerRespTx);
        Ok(())
    }
}
