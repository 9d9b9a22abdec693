//! LACP daemon for SONiC.
//!
//! Runs one bonding group from a TOML file: a tick driver per group, a
//! channel-backed transport whose events are routed to an optional
//! simulated link partner, and a periodic JSON state export.

pub mod config_file;
pub mod daemon;
pub mod driver;
pub mod error;
pub mod snapshot;
pub mod transport;
pub mod wiring;

pub use config_file::{DaemonSection, GroupSection, LacpdConfig, PartnerSection, DEFAULT_CONFIG_PATH};
pub use daemon::{Daemon, RunSummary};
pub use driver::GroupTickDriver;
pub use error::{LacpdError, Result};
pub use snapshot::Snapshot;
pub use transport::{ChannelTransport, TransportEvent};
pub use wiring::{Peer, RouteSummary};
