//! Configuration schema types for peerdrop.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod relay;
mod system;
mod transfer;
mod transport;

pub use relay::*;
pub use system::*;
pub use transfer::*;
pub use transport::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PeerdropConfig {
    pub relay: RelayConfig,
    pub transfer: TransferConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = PeerdropConfig::default();
        assert_eq!(config.transfer.chunk_size, 16_384);
        assert_eq!(config.relay.reconnect_delay_secs, 3);
        assert!(!config.transfer.verify_digest);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: PeerdropConfig = toml::from_str(
            r#"
[transfer]
verify_digest = true
"#,
        )
        .unwrap();
        assert!(config.transfer.verify_digest);
        assert_eq!(config.transfer.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.transport.advertise_host.is_empty());
    }

    #[test]
    fn log_level_parses_uppercase() {
        let config: PeerdropConfig = toml::from_str("[logging]\nlevel = \"DEBUG\"\n").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.level.directive(), "peerdrop=debug");
    }
}
