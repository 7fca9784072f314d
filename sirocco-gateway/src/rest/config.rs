//! REST client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the signed REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL for the futures API.
    #[serde(default = "default_futures_api_url")]
    pub futures_api_url: String,

    /// Base URL for the spot API.
    #[serde(default = "default_spot_api_url")]
    pub spot_api_url: String,

    /// API key for signed requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API secret for signed requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// `recvWindow` value attached to signed requests, in milliseconds.
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,

    /// Cooldown applied on a rate-limit response without `Retry-After`.
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
}

fn default_futures_api_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_spot_api_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_recv_window_ms() -> u64 {
    10_000
}

fn default_retry_after_secs() -> u64 {
    5
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            futures_api_url: default_futures_api_url(),
            spot_api_url: default_spot_api_url(),
            api_key: None,
            api_secret: None,
            timeout_ms: default_timeout_ms(),
            recv_window_ms: default_recv_window_ms(),
            default_retry_after_secs: default_retry_after_secs(),
        }
    }
}

impl RestConfig {
    /// Creates a new builder for `RestConfig`.
    #[must_use]
    pub fn builder() -> RestConfigBuilder {
        RestConfigBuilder::default()
    }

    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns true if both credentials are configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

/// Builder for `RestConfig`.
#[derive(Debug, Default)]
pub struct RestConfigBuilder {
    futures_api_url: Option<String>,
    spot_api_url: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    timeout_ms: Option<u64>,
    recv_window_ms: Option<u64>,
    default_retry_after_secs: Option<u64>,
}

impl RestConfigBuilder {
    /// Sets the futures API base URL.
    #[must_use]
    pub fn futures_api_url(mut self, url: impl Into<String>) -> Self {
        self.futures_api_url = Some(url.into());
        self
    }

    /// Sets the spot API base URL.
    #[must_use]
    pub fn spot_api_url(mut self, url: impl Into<String>) -> Self {
        self.spot_api_url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API secret.
    #[must_use]
    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the `recvWindow` for signed requests.
    #[must_use]
    pub fn recv_window(mut self, window: Duration) -> Self {
        self.recv_window_ms = Some(window.as_millis() as u64);
        self
    }

    /// Sets the fallback rate-limit cooldown.
    #[must_use]
    pub fn default_retry_after(mut self, secs: u64) -> Self {
        self.default_retry_after_secs = Some(secs);
        self
    }

    /// Builds the `RestConfig`.
    #[must_use]
    pub fn build(self) -> RestConfig {
        RestConfig {
            futures_api_url: self.futures_api_url.unwrap_or_else(default_futures_api_url),
            spot_api_url: self.spot_api_url.unwrap_or_else(default_spot_api_url),
            api_key: self.api_key,
            api_secret: self.api_secret,
            timeout_ms: self.timeout_ms.unwrap_or_else(default_timeout_ms),
            recv_window_ms: self.recv_window_ms.unwrap_or_else(default_recv_window_ms),
            default_retry_after_secs: self
                .default_retry_after_secs
                .unwrap_or_else(default_retry_after_secs),
        }
    }
}
