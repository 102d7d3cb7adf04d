//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_peerdrop_config.toml"));
    assert!(matches!(
        result,
        Err(peerdrop_common::ConfigError::FileNotFound(_))
    ));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[relay]
url = "wss://relay.example.net/ws"

[transfer]
chunk_size = 65536
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.relay.url, "wss://relay.example.net/ws");
    assert_eq!(config.transfer.chunk_size, 65536);
    // Defaults preserved
    assert_eq!(config.relay.reconnect_delay_secs, 3);
    assert_eq!(config.transport.bind_host, "0.0.0.0");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let result = load_from_path(&path);
    assert!(matches!(
        result,
        Err(peerdrop_common::ConfigError::ParseError(_))
    ));
}

#[test]
fn load_config_with_invalid_values_is_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[transfer]\nchunk_size = 3\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.transfer.chunk_size, 3);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("peerdrop").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.transfer.chunk_size, 16_384);
    assert_eq!(config.relay.url, "ws://127.0.0.1:8080/ws");
}

#[test]
fn default_config_toml_is_valid() {
    use crate::schema::PeerdropConfig;

    let config: PeerdropConfig = toml::from_str(&default_config_toml()).unwrap();
    assert_eq!(config.transfer.stall_timeout_secs, 60);
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("peerdrop"));
        assert!(path_str.ends_with("config.toml"));
    }
}
