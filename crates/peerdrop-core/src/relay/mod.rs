//! WebSocket client for the signaling relay.
//!
//! Keeps one connection open in the background, reconnecting after a fixed
//! delay whenever it drops. Relay messages surface as [`RelayEvent`]s.

mod client;
mod connection;
mod types;

pub use client::RelayClient;
pub use types::{RelayClientConfig, RelayEvent};
