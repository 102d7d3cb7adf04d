use serde::{Deserialize, Serialize};

/// Direct TCP transport between the two peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Interface the sending side listens on.
    pub bind_host: String,
    /// Address advertised to the receiver as a connection candidate. Empty
    /// advertises the detected outbound address plus loopback.
    pub advertise_host: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            advertise_host: String::new(),
        }
    }
}
