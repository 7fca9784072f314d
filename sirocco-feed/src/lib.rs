//! # Sirocco Feed
//!
//! Shared subscription coordination for the Sirocco market-data feed.
//!
//! This crate provides:
//! - The per-consumer [`registry::SubscriptionRegistry`] and its merged union
//! - The [`shared::SharedCoordinator`], which polls REST snapshots and runs
//!   WebSocket streaming over the union of all subscriptions
//! - The [`account::AccountCoordinator`] for authenticated per-account data
//! - The [`reconcile`] planner that keeps downstream objects consistent when
//!   consumers with overlapping subscriptions come and go
//! - Trait seams over the exchange API ([`api::MarketApi`],
//!   [`api::AccountApi`]) with Binance-backed implementations

#![warn(missing_docs)]

/// Per-account polling
pub mod account;

/// Exchange API traits and Binance implementations
pub mod api;

/// Feed configuration
pub mod config;

/// Downstream object reconciliation
pub mod reconcile;

/// Subscription registry
pub mod registry;

/// Shared coordinator and snapshot store
pub mod shared;

pub use account::AccountCoordinator;
pub use api::{AccountApi, BinanceAccountApi, BinanceMarketApi, MarketApi};
pub use config::{Credentials, FeedConfig};
pub use reconcile::{reconcile, ReconcilePlan, TrackedEntity};
pub use registry::{PairSet, SubscriptionRegistry};
pub use shared::{PollHandle, SharedCoordinator, SnapshotStore};
