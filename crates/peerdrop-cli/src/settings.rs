//! Turning the loaded config and command-line overrides into runtime settings.

use std::time::Duration;

use peerdrop_config::PeerdropConfig;
use peerdrop_core::{ClientConfig, RelayClientConfig, TcpTransportConfig, TcpTransportFactory};

/// `0` disables a timeout.
fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn client_config(config: &PeerdropConfig, relay_url: Option<&str>) -> ClientConfig {
    let connect_timeout = Duration::from_secs(config.relay.connect_timeout_secs);
    ClientConfig {
        relay: RelayClientConfig {
            url: relay_url.unwrap_or(&config.relay.url).to_string(),
            reconnect_delay: Duration::from_secs(config.relay.reconnect_delay_secs),
            connect_timeout,
        },
        chunk_size: config.transfer.chunk_size as usize,
        verify_digest: config.transfer.verify_digest,
        negotiation_timeout: optional_secs(config.transfer.negotiation_timeout_secs),
        stall_timeout: optional_secs(config.transfer.stall_timeout_secs),
    }
}

pub fn transport_factory(config: &PeerdropConfig) -> TcpTransportFactory {
    TcpTransportFactory::new(TcpTransportConfig {
        bind_host: config.transport.bind_host.clone(),
        advertise_host: config.transport.advertise_host.clone(),
        connect_timeout: Duration::from_secs(config.relay.connect_timeout_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_through() {
        let client = client_config(&PeerdropConfig::default(), None);
        assert_eq!(client.relay.url, "ws://127.0.0.1:8080/ws");
        assert_eq!(client.relay.reconnect_delay, Duration::from_secs(3));
        assert_eq!(client.chunk_size, 16_384);
        assert_eq!(client.negotiation_timeout, Some(Duration::from_secs(30)));
        assert_eq!(client.stall_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn relay_flag_overrides_config() {
        let client = client_config(&PeerdropConfig::default(), Some("wss://relay.example/ws"));
        assert_eq!(client.relay.url, "wss://relay.example/ws");
    }

    #[test]
    fn zero_disables_timeouts() {
        let mut config = PeerdropConfig::default();
        config.transfer.negotiation_timeout_secs = 0;
        config.transfer.stall_timeout_secs = 0;
        let client = client_config(&config, None);
        assert_eq!(client.negotiation_timeout, None);
        assert_eq!(client.stall_timeout, None);
    }
}
