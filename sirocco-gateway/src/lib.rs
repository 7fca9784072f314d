//! # Sirocco Gateway
//!
//! Binance transports for the Sirocco market-data feed.
//!
//! This crate provides:
//! - A signed REST client with rate-limit detection ([`rest`])
//! - Multiplexed ticker stream connections with automatic reconnection
//!   and a manager that chunks symbols across connections ([`ws`])
//!
//! # Example
//!
//! ```ignore
//! use sirocco_gateway::rest::{RestConfig, SignedRequestClient};
//!
//! let config = RestConfig::builder()
//!     .api_key("your_key")
//!     .api_secret("your_secret")
//!     .build();
//! let client = SignedRequestClient::new(config)?;
//! let body = client
//!     .get("https://api.binance.com/api/v3/ticker/price", &[("symbol", "BTCUSDT".into())], false)
//!     .await?;
//! ```

#![warn(missing_docs)]

/// REST client infrastructure
pub mod rest;

/// WebSocket stream infrastructure
pub mod ws;

pub use rest::{RestConfig, RestConfigBuilder, SignedRequestClient};
pub use ws::{StreamConfig, StreamConfigBuilder, StreamConnection, StreamManager, TickerSink};
