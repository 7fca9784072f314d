//! WebSocket stream infrastructure.
//!
//! One [`StreamConnection`] carries a multiplexed combined-stream session
//! for up to `max_streams_per_connection` symbols and reconnects on its
//! own with exponential backoff. The [`StreamManager`] owns the full set
//! of connections for the current subscription union; restarting the
//! manager is the only way to change the subscribed set.

mod config;
mod connection;
mod manager;
mod stream;

pub use config::{StreamConfig, StreamConfigBuilder};
pub use connection::{ConnectionState, StreamConnection, TickerSink};
pub use manager::StreamManager;
pub use stream::{build_stream_urls, parse_combined_ticker};
