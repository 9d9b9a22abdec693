//! Common SONiC types for link aggregation control.
//!
//! This crate provides type-safe representations of the link-level
//! primitives shared by the LACP engine and its daemon:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses (system ids, port addresses)
//! - [`LinkSpeed`]: negotiated port speed as reported by the adapter
//! - [`Duplex`]: negotiated port duplex

mod link;
mod mac;

pub use link::{Duplex, LinkSpeed};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid link speed: {0}")]
    InvalidLinkSpeed(String),

    #[error("invalid duplex: {0} (expected full or half)")]
    InvalidDuplex(String),
}
