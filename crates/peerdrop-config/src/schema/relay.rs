use serde::{Deserialize, Serialize};

/// Connection to the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL of the relay server.
    pub url: String,
    /// Fixed delay between reconnect attempts (valid range: 1-300).
    pub reconnect_delay_secs: u64,
    /// Give up on a single connect attempt after this long (valid range: 1-120).
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".into(),
            reconnect_delay_secs: 3,
            connect_timeout_secs: 15,
        }
    }
}
