//! Error types for the LACP engine.

use crate::port::PortId;
use crate::transport::TransportError;
use sonic_types::MacAddress;
use thiserror::Error;

/// LACP group operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LacpError {
    /// Operation named a port that is not bound to the group
    #[error("port {0} is not bound to this group")]
    PortNotFound(PortId),

    /// A port with the same name is already bound
    #[error("port {0} is already bound to this group")]
    DuplicatePort(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame could not be decoded
    #[error("PDU error: {0}")]
    Pdu(#[from] PduError),

    /// Link layer refused a frame
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Slow-protocols frame decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PduError {
    #[error("runt frame: {0} bytes, shorter than an Ethernet header")]
    Runt(usize),

    #[error("truncated frame: {len} bytes, need {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("not a slow-protocols frame (ethertype {0:#06x})")]
    WrongEthertype(u16),

    #[error("frame addressed to {0}, not the slow-protocols group")]
    WrongDestination(MacAddress),
}

impl PduError {
    /// True when the frame was addressed to us but cut short.
    pub fn is_illegal(&self) -> bool {
        matches!(self, PduError::Truncated { .. })
    }
}

/// Result type for LACP operations
pub type Result<T> = std::result::Result<T, LacpError>;
