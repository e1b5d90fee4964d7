//! Messaging-gateway adapter.
//!
//! Implements the `qrelay-core` network ports over the gateway daemon's JSON
//! API (reqwest) and its WebSocket event stream (tokio-tungstenite).

pub mod client;
pub mod events;

pub use client::{GatewayConfig, GatewayConnector};
