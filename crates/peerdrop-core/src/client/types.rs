//! Configuration and commands for the client runtime.

use std::path::PathBuf;
use std::time::Duration;

use crate::relay::RelayClientConfig;
use crate::transfer::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay: RelayClientConfig,
    pub chunk_size: usize,
    /// Attach a SHA-256 digest to outgoing metadata.
    pub verify_digest: bool,
    /// Longest time allowed in `Connecting`. `None` waits forever.
    pub negotiation_timeout: Option<Duration>,
    /// Longest time allowed without progress while `Transferring`.
    pub stall_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay: RelayClientConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_digest: false,
            negotiation_timeout: Some(Duration::from_secs(30)),
            stall_timeout: Some(Duration::from_secs(60)),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ClientCommand {
    SendFile(PathBuf),
    Join(String),
    Accept,
    Decline,
    Close,
    Shutdown,
}
