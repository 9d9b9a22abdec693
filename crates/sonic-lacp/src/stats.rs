//! Slow-protocols counters.

use serde::{Deserialize, Serialize};

/// Increment-only protocol counters, kept per port and per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LacpStats {
    pub lacpdu_rx: u64,
    pub lacpdu_tx: u64,
    pub lacpdu_unknown_rx: u64,
    pub lacpdu_illegal_rx: u64,
    pub marker_rx: u64,
    pub marker_tx: u64,
    pub marker_resp_rx: u64,
    pub marker_resp_tx: u64,
    pub marker_unknown_rx: u64,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    LacpduRx,
    LacpduTx,
    LacpduUnknownRx,
    LacpduIllegalRx,
    MarkerRx,
    MarkerTx,
    MarkerRespRx,
    MarkerRespTx,
    MarkerUnknownRx,
}

impl LacpStats {
    pub(crate) fn bump(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::LacpduRx => &mut self.lacpdu_rx,
            Counter::LacpduTx => &mut self.lacpdu_tx,
            Counter::LacpduUnknownRx => &mut self.lacpdu_unknown_rx,
            Counter::LacpduIllegalRx => &mut self.lacpdu_illegal_rx,
            Counter::MarkerRx => &mut self.marker_rx,
            Counter::MarkerTx => &mut self.marker_tx,
            Counter::MarkerRespRx => &mut self.marker_resp_rx,
            Counter::MarkerRespTx => &mut self.marker_resp_tx,
            Counter::MarkerUnknownRx => &mut self.marker_unknown_rx,
        };
        *slot += 1;
    }
}
