//! Request signing utilities.
//!
//! The exchange signs the literal query string, so parameters are joined
//! in the order given by the caller and never re-sorted or re-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sirocco_core::error::NetworkError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 request signer producing hex-encoded signatures.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    secret: String,
}

impl RequestSigner {
    /// Creates a new request signer over the given secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signs a message and returns the hex-encoded signature.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Signing` if the MAC cannot be constructed.
    pub fn sign(&self, message: &str) -> Result<String, NetworkError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|e| {
            NetworkError::Signing {
                reason: format!("failed to create HMAC: {e}"),
            }
        })?;

        mac.update(message.as_bytes());
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }

    /// Signs a query string and appends the `signature` parameter.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Signing` if signing fails.
    pub fn sign_query(&self, query: &str) -> Result<String, NetworkError> {
        let signature = self.sign(query)?;
        Ok(format!("{query}&signature={signature}"))
    }
}

/// Builds a query string from parameters, preserving caller order.
#[must_use]
pub fn build_query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the current timestamp in milliseconds since the Unix epoch.
#[must_use]
pub fn timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
