//! peerdrop configuration system.
//!
//! TOML-based configuration with validation. All config sections use
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{PeerdropConfig, CONFIG_SCHEMA_VERSION};

use peerdrop_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default file if none exists.
pub fn load_config() -> Result<PeerdropConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<PeerdropConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a TOML string.
pub fn config_to_toml(config: &PeerdropConfig) -> String {
    toml::to_string_pretty(config)
        .unwrap_or_else(|e| format!("# failed to serialize config: {e}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_toml_contains_all_sections() {
        let toml = config_to_toml(&PeerdropConfig::default());
        assert!(toml.contains("[relay]"));
        assert!(toml.contains("[transfer]"));
        assert!(toml.contains("[transport]"));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nchunk_size = 3\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let toml = config_to_toml(&PeerdropConfig::default());
        let parsed: PeerdropConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.transfer.chunk_size, 16_384);
        assert_eq!(parsed.relay.url, "ws://127.0.0.1:8080/ws");
    }
}
