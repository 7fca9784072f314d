//! # Sirocco Core
//!
//! Domain types and errors shared across the Sirocco market-data feed.
//!
//! This crate provides:
//! - Market identifiers ([`types::Symbol`], [`types::MarketType`])
//! - Snapshot types ([`types::MarketSnapshot`], [`types::AccountSnapshot`])
//! - The error hierarchy ([`error::NetworkError`], [`error::FeedError`])
//! - Backoff bookkeeping ([`backoff::BackoffState`])
//!
//! Higher-level crates (`sirocco-gateway`, `sirocco-feed`) build the
//! transports and coordination logic on top of these types.

#![warn(missing_docs)]

/// Backoff state and reconnect delay math
pub mod backoff;

/// Error types
pub mod error;

/// Domain types
pub mod types;

pub use backoff::{reconnect_delay, BackoffState};
pub use error::{FeedError, NetworkError, ValidationError};
pub use types::{
    AccountSnapshot, MarginType, MarketSnapshot, MarketType, Position, PositionSide, Symbol,
    Ticker,
};
