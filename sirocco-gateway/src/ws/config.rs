//! Stream connection configuration.

use serde::{Deserialize, Serialize};
use sirocco_core::backoff::reconnect_delay;
use std::time::Duration;

/// Configuration for ticker stream connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Combined-stream endpoint for the spot market.
    #[serde(default = "default_spot_ws_url")]
    pub spot_ws_url: String,

    /// Combined-stream endpoint for the futures market.
    #[serde(default = "default_futures_ws_url")]
    pub futures_ws_url: String,

    /// Maximum multiplexed streams carried by one connection.
    #[serde(default = "default_max_streams_per_connection")]
    pub max_streams_per_connection: usize,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Initial reconnect delay in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnect delay in milliseconds.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

fn default_spot_ws_url() -> String {
    "wss://stream.binance.com:9443/stream".to_string()
}

fn default_futures_ws_url() -> String {
    "wss://fstream.binance.com/stream".to_string()
}

fn default_max_streams_per_connection() -> usize {
    200
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    300_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            spot_ws_url: default_spot_ws_url(),
            futures_ws_url: default_futures_ws_url(),
            max_streams_per_connection: default_max_streams_per_connection(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

impl StreamConfig {
    /// Creates a new builder for `StreamConfig`.
    #[must_use]
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }

    /// Returns the connection timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Computes the reconnect delay for the n-th consecutive failure.
    #[must_use]
    pub fn reconnect_delay_for(&self, failures: u32) -> Duration {
        reconnect_delay(
            Duration::from_millis(self.reconnect_delay_ms),
            Duration::from_millis(self.max_reconnect_delay_ms),
            failures,
        )
    }
}

/// Builder for `StreamConfig`.
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    spot_ws_url: Option<String>,
    futures_ws_url: Option<String>,
    max_streams_per_connection: Option<usize>,
    connect_timeout_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_delay_ms: Option<u64>,
}

impl StreamConfigBuilder {
    /// Sets the spot combined-stream endpoint.
    #[must_use]
    pub fn spot_ws_url(mut self, url: impl Into<String>) -> Self {
        self.spot_ws_url = Some(url.into());
        self
    }

    /// Sets the futures combined-stream endpoint.
    #[must_use]
    pub fn futures_ws_url(mut self, url: impl Into<String>) -> Self {
        self.futures_ws_url = Some(url.into());
        self
    }

    /// Sets the per-connection stream cap.
    #[must_use]
    pub fn max_streams_per_connection(mut self, cap: usize) -> Self {
        self.max_streams_per_connection = Some(cap);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Builds the `StreamConfig`.
    #[must_use]
    pub fn build(self) -> StreamConfig {
        StreamConfig {
            spot_ws_url: self.spot_ws_url.unwrap_or_else(default_spot_ws_url),
            futures_ws_url: self.futures_ws_url.unwrap_or_else(default_futures_ws_url),
            max_streams_per_connection: self
                .max_streams_per_connection
                .unwrap_or_else(default_max_streams_per_connection),
            connect_timeout_ms: self
                .connect_timeout_ms
                .unwrap_or_else(default_connect_timeout_ms),
            reconnect_delay_ms: self
                .reconnect_delay_ms
                .unwrap_or_else(default_reconnect_delay_ms),
            max_reconnect_delay_ms: self
                .max_reconnect_delay_ms
                .unwrap_or_else(default_max_reconnect_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.max_streams_per_connection, 200);
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert_eq!(config.max_reconnect_delay_ms, 300_000);
    }

    #[test]
    fn test_reconnect_delay_sequence() {
        let config = StreamConfig::default();
        let delays: Vec<u64> = (1..=8)
            .map(|n| config.reconnect_delay_for(n).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);
    }

    #[test]
    fn test_builder() {
        let config = StreamConfig::builder()
            .spot_ws_url("ws://127.0.0.1:9000/stream")
            .max_streams_per_connection(2)
            .reconnect_delay(Duration::from_millis(10))
            .build();

        assert_eq!(config.spot_ws_url, "ws://127.0.0.1:9000/stream");
        assert_eq!(config.max_streams_per_connection, 2);
        assert_eq!(config.reconnect_delay_for(1), Duration::from_millis(10));
    }
}
