//! IEEE 802.3ad Link Aggregation Control Protocol engine.
//!
//! A [`Group`] owns the member ports of one bonding interface together with
//! their aggregator slots. Every tick it runs, per port and in this order,
//! the receive, periodic, selection, mux, transmit and churn machines.
//! Received frames enter through [`Group::rx_indication`]; frames, forwarding
//! changes and carrier changes leave through a [`LinkTransport`].
//!
//! Ports and aggregators live in arenas inside the group and refer to each
//! other by [`PortId`] and [`AggregatorId`].
//!
//! ```
//! use sonic_lacp::{Group, LacpConfig, NullTransport, PortConfig};
//! use sonic_types::{LinkSpeed, MacAddress};
//! use std::sync::Arc;
//!
//! let mut group = Group::new(
//!     "PortChannel0001",
//!     MacAddress::new([0x02, 0, 0, 0, 0, 0x01]),
//!     LacpConfig::default(),
//!     Arc::new(NullTransport),
//! )
//! .unwrap();
//! let port = group
//!     .bind_port(
//!         PortConfig::new("Ethernet0", MacAddress::new([0x02, 0, 0, 0, 1, 0]))
//!             .with_speed(LinkSpeed::Gbps100),
//!     )
//!     .unwrap();
//! group.tick();
//! assert!(group.port(port).unwrap().vars().selected);
//! ```

mod agg_selection;
pub mod aggregator;
pub mod churn;
pub mod config;
pub mod error;
pub mod group;
pub mod handle;
pub mod mux;
pub mod pdu;
pub mod periodic;
pub mod port;
pub mod rx;
mod selection;
pub mod state;
pub mod stats;
pub mod status;
pub mod timers;
pub mod transport;
mod tx;

pub use aggregator::{Aggregator, AggregatorId};
pub use churn::{ChurnMonitor, ChurnState};
pub use config::{LacpConfig, LacpRate, PortConfig, SelectionPolicy};
pub use error::{LacpError, PduError, Result};
pub use group::{Group, RxVerdict};
pub use handle::{GroupHandle, InboundFrame};
pub use mux::MuxState;
pub use pdu::{marker_response, LacpInfo, Lacpdu, MarkerKind, MarkerPdu, SlowPdu};
pub use periodic::PeriodicState;
pub use port::{PartnerInfo, PortId, PortRecord, SmVars};
pub use rx::RxState;
pub use state::PortState;
pub use stats::LacpStats;
pub use status::{ActiveAggregatorInfo, AggregatorStatus, GroupStatus, PortStatus};
pub use timers::TickClock;
pub use transport::{LinkTransport, NullTransport, TransportError};
