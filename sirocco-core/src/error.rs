//! Error types for the Sirocco feed.
//!
//! The taxonomy mirrors how failures are handled:
//! - Per-field fetch failures inside a polling cycle are absorbed locally
//!   (logged, previous value retained).
//! - Whole-cycle failures ([`NetworkError::RateLimited`],
//!   [`NetworkError::Backoff`] and unexpected errors) surface to the owning
//!   coordinator, which marks the cycle failed while keeping the last good
//!   snapshot readable.
//! - Stream-level errors never propagate; they feed the reconnect state
//!   machine. No error here is fatal to the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation error for domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// Symbol string was empty.
    #[error("symbol must not be empty")]
    EmptySymbol,

    /// Symbol string contained invalid characters.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

/// Network and exchange-API error type.
///
/// # Examples
///
/// ```
/// use sirocco_core::error::NetworkError;
///
/// let error = NetworkError::RateLimited { retry_after_secs: 30 };
/// assert_eq!(error.retry_after_secs(), Some(30));
/// assert!(error.is_recoverable());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Connection to the remote host failed (refused, DNS, TLS).
    #[error("[network] connection failed: {reason}")]
    Connection {
        /// Reason for the failure.
        reason: String,
    },

    /// Request exceeded the configured ceiling.
    #[error("[network] timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Non-2xx HTTP response outside the rate-limit statuses.
    #[error("[network] API error: status {status_code} - {body}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body, as returned by the exchange.
        body: String,
    },

    /// HTTP 429 or 418 from the exchange.
    #[error("[network] rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before the next request.
        retry_after_secs: u64,
    },

    /// A cycle was skipped because a rate-limit cooldown is still active.
    #[error("[network] rate-limit backoff, {remaining_secs}s left")]
    Backoff {
        /// Seconds until the cooldown expires.
        remaining_secs: u64,
    },

    /// WebSocket-level failure.
    #[error("[network] websocket error: {reason}")]
    WebSocket {
        /// Reason for the failure.
        reason: String,
    },

    /// Request signing failed.
    #[error("[network] signing failed: {reason}")]
    Signing {
        /// Reason for the failure.
        reason: String,
    },

    /// Response body could not be parsed.
    #[error("[network] parse error: {reason}")]
    Parse {
        /// Reason for the failure.
        reason: String,
    },
}

impl NetworkError {
    /// Returns true if the operation can be retried.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::Backoff { .. }
            | Self::WebSocket { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            Self::Signing { .. } | Self::Parse { .. } => false,
        }
    }

    /// Returns the rate-limit wait in seconds, if this error carries one.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::Backoff { remaining_secs } => Some(*remaining_secs),
            _ => None,
        }
    }

    /// Returns true if this is a rate-limit or cooldown error.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Backoff { .. })
    }
}

/// Top-level error type for the feed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedError {
    /// Network or exchange-API error.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// Domain value validation error.
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl FeedError {
    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
        }
    }

    /// Returns true if the operation can be retried.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_recoverable(),
            Self::Validation(_) => false,
        }
    }
}

/// A specialized Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_retry_after() {
        let error = NetworkError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(error.retry_after_secs(), Some(30));
        assert!(error.is_rate_limit());
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_backoff_carries_remaining() {
        let error = NetworkError::Backoff { remaining_secs: 20 };
        assert!(error.to_string().contains("20s"));
        assert_eq!(error.retry_after_secs(), Some(20));
    }

    #[test]
    fn test_api_error_recoverability() {
        let server = NetworkError::Api {
            status_code: 503,
            body: "maintenance".to_string(),
        };
        assert!(server.is_recoverable());

        let client = NetworkError::Api {
            status_code: 401,
            body: "invalid key".to_string(),
        };
        assert!(!client.is_recoverable());
    }

    #[test]
    fn test_feed_error_category() {
        let network: FeedError = NetworkError::Timeout { timeout_ms: 30_000 }.into();
        assert_eq!(network.category(), "network");
        assert!(network.is_recoverable());

        let validation: FeedError = ValidationError::EmptySymbol.into();
        assert_eq!(validation.category(), "validation");
        assert!(!validation.is_recoverable());
    }

    #[test]
    fn test_serde_roundtrip() {
        let error = NetworkError::Api {
            status_code: 418,
            body: "teapot".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        let parsed: NetworkError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }
}
