//! Transfer engine settings: chunking, integrity, timeouts, and where
//! received files land.

use serde::{Deserialize, Serialize};

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u32 = 16_384;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per chunk frame (valid range: 1024-262144).
    pub chunk_size: u32,
    /// Include a SHA-256 digest in the metadata frame and verify it on receipt.
    pub verify_digest: bool,
    /// Seconds allowed for negotiation before the session is torn down. 0 disables.
    pub negotiation_timeout_secs: u64,
    /// Seconds without progress before an active transfer is torn down. 0 disables.
    pub stall_timeout_secs: u64,
    /// Directory for received files. Empty means the platform download dir.
    pub receive_dir: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_digest: false,
            negotiation_timeout_secs: 30,
            stall_timeout_secs: 60,
            receive_dir: String::new(),
        }
    }
}
