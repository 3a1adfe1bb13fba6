//! Hub transport: the JSON hub protocol over a WebSocket with automatic
//! reconnect.
//!
//! The session client talks to the transport only through the
//! [`HubConnection`] and [`HubConnector`] traits, so tests substitute an
//! in-memory connection.

mod client;
mod connection;
mod handler;
pub mod protocol;
mod types;

pub use client::{WsHubConnection, WsHubConnector};
pub use types::{
    ConnectionState, HubConnection, HubConnector, HubOptions, InboundHandler, ReconnectPolicy,
    TransportKind,
};
