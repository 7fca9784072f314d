//! Feed-level configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lower bound on the polling interval, in seconds.
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 10;

/// API credentials for one account.
///
/// `Debug` redacts the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Exchange API key.
    pub api_key: String,
    /// Exchange API secret.
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Configuration for the shared and per-account coordinators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Polling interval in seconds. Values below the minimum are clamped.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Whether to stream ticker updates over WebSocket between polls.
    #[serde(default = "default_use_websocket")]
    pub use_websocket: bool,
}

fn default_update_interval_secs() -> u64 {
    60
}

fn default_use_websocket() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            use_websocket: default_use_websocket(),
        }
    }
}

impl FeedConfig {
    /// Returns the polling interval, clamped to the minimum.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(MIN_UPDATE_INTERVAL_SECS))
    }
}
