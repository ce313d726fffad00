//! Duplex message transport between a producer and one viewer.
//!
//! The [`Transport`] trait hides how messages travel; [`TransportEvents`]
//! receives what the viewer sends back. Two adapters are provided:
//! - [`WebSocketTransport`]: a blocking WebSocket server that also serves the
//!   viewer's static assets on the same port
//! - [`MemoryTransport`]: records outbound messages and lets the owner inject
//!   inbound ones, for tests and network-less embedding
//!
//! [`netif`] picks the address to advertise to the user.

pub mod error;
pub mod http;
pub mod memory;
pub mod netif;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use http::StaticFiles;
pub use memory::{MemoryTransport, Outbound};
pub use netif::{
    ipv4_interfaces, pick_best, preferred_ipv4, rank_interface, viewer_url, InterfaceAddr,
    InterfaceRank,
};
pub use traits::{ConnectionState, Transport, TransportEvents};
pub use websocket::{WebSocketConfig, WebSocketTransport, DEFAULT_INDEX_PAGE, DEFAULT_PORT};
