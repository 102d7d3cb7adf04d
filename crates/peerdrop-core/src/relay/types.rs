//! Configuration and event/command enums for the relay client.

use std::time::Duration;

use peerdrop_common::SignalMessage;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Fixed pause between reconnect attempts.
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".into(),
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Events emitted by the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected,
    Disconnected,
    Message(SignalMessage),
    /// A connection attempt failed; another follows after the delay.
    Error(String),
}

#[derive(Debug)]
pub(crate) enum RelayCommand {
    Send(SignalMessage),
    Disconnect,
}
