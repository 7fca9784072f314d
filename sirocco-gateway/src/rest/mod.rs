//! REST client infrastructure.
//!
//! This module provides the signed request client used by the feed's
//! pollers:
//! - HMAC-SHA256 request signing in the exchange's query-string format
//! - Rate-limit detection (HTTP 429/418 with `Retry-After`)
//! - Error classification into the feed's taxonomy

mod client;
mod config;
mod signer;

pub use client::SignedRequestClient;
pub use config::{RestConfig, RestConfigBuilder};
pub use signer::{build_query_string, timestamp_ms, RequestSigner};
