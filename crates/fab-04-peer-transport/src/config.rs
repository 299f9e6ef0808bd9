//! Transport configuration.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// UDP address the QUIC endpoint binds to.
    pub listen_addr: SocketAddr,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
    /// Upper bound for a unary RPC round trip.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "idle_timeout_ms")]
    pub idle_timeout: Duration,
    /// Keep-alive interval; `None` disables keep-alives.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "keep_alive_ms")]
    pub keep_alive_interval: Option<Duration>,
    /// Pause between dial attempts of a peer supervisor.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "reconnect_interval_ms")]
    pub reconnect_interval: Duration,
    /// Capacity of the inbound envelope queue.
    pub inbound_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 7050)),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            keep_alive_interval: Some(Duration::from_secs(5)),
            reconnect_interval: Duration::from_secs(1),
            inbound_buffer: 1000,
        }
    }
}

impl TransportConfig {
    /// Loopback on an ephemeral port with short timeouts.
    pub fn for_testing() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            keep_alive_interval: Some(Duration::from_secs(1)),
            reconnect_interval: Duration::from_millis(100),
            inbound_buffer: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.inbound_buffer, 1000);
        assert_eq!(config.listen_addr.port(), 7050);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TransportConfig = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:9000"
            reconnect_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.reconnect_interval, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.keep_alive_interval, Some(Duration::from_secs(5)));
    }
}
