//! Per-section validators: relay, transfer, transport.

use crate::schema::PeerdropConfig;

use super::helpers::{validate_not_empty, validate_optional_max, validate_range};

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &PeerdropConfig) {
    let url = &config.relay.url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!("relay.url = {url:?} must start with ws:// or wss://"));
    }
    validate_range(
        errors,
        "relay.reconnect_delay_secs",
        config.relay.reconnect_delay_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "relay.connect_timeout_secs",
        config.relay.connect_timeout_secs,
        1,
        120,
    );
}

pub(crate) fn validate_transfer(errors: &mut Vec<String>, config: &PeerdropConfig) {
    validate_range(
        errors,
        "transfer.chunk_size",
        u64::from(config.transfer.chunk_size),
        1024,
        262_144,
    );
    validate_optional_max(
        errors,
        "transfer.negotiation_timeout_secs",
        config.transfer.negotiation_timeout_secs,
        3600,
    );
    validate_optional_max(
        errors,
        "transfer.stall_timeout_secs",
        config.transfer.stall_timeout_secs,
        3600,
    );
}

pub(crate) fn validate_transport(errors: &mut Vec<String>, config: &PeerdropConfig) {
    validate_not_empty(errors, "transport.bind_host", &config.transport.bind_host);
    if config.transport.advertise_host.contains(char::is_whitespace) {
        errors.push(format!(
            "transport.advertise_host = {:?} must be a host name or address",
            config.transport.advertise_host
        ));
    }
}
