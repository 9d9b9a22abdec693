//! LACP port state bitmap as carried in the Actor/Partner TLVs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// The 8-bit `*_state` octet of an Actor or Partner information TLV.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortState(u8);

impl PortState {
    pub const LACP_ACTIVITY: PortState = PortState(0x01);
    /// Set when the port asks for the short (3s) timeout.
    pub const LACP_TIMEOUT: PortState = PortState(0x02);
    pub const AGGREGATION: PortState = PortState(0x04);
    pub const SYNCHRONIZATION: PortState = PortState(0x08);
    pub const COLLECTING: PortState = PortState(0x10);
    pub const DISTRIBUTING: PortState = PortState(0x20);
    pub const DEFAULTED: PortState = PortState(0x40);
    pub const EXPIRED: PortState = PortState(0x80);

    const NAMES: [(PortState, &'static str); 8] = [
        (PortState::LACP_ACTIVITY, "ACT"),
        (PortState::LACP_TIMEOUT, "TMO"),
        (PortState::AGGREGATION, "AGG"),
        (PortState::SYNCHRONIZATION, "SYNC"),
        (PortState::COLLECTING, "COL"),
        (PortState::DISTRIBUTING, "DIST"),
        (PortState::DEFAULTED, "DEF"),
        (PortState::EXPIRED, "EXP"),
    ];

    pub const fn empty() -> Self {
        PortState(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        PortState(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub const fn contains(self, other: PortState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PortState) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PortState) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: PortState, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    /// Compares only the bits selected by `mask`.
    pub const fn agrees(self, other: PortState, mask: PortState) -> bool {
        self.0 & mask.0 == other.0 & mask.0
    }
}

impl BitOr for PortState {
    type Output = PortState;

    fn bitor(self, rhs: PortState) -> PortState {
        PortState(self.0 | rhs.0)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (bit, name) in Self::NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortState({:#04x} {})", self.0, self)
    }
}
