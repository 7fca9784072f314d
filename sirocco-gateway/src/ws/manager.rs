//! Manages the set of stream connections covering all subscribed symbols.

use std::sync::Arc;
use tracing::{debug, info};

use sirocco_core::{MarketType, Symbol};

use super::config::StreamConfig;
use super::connection::{StreamConnection, TickerSink};
use super::stream::build_stream_urls;

/// Owns every active stream connection and restarts the set when the
/// subscribed symbols change.
///
/// Symbols are split across connections so no single connection exceeds the
/// configured stream cap. `start` replaces any running set wholesale, which
/// keeps the mapping from symbols to connections simple at the cost of a
/// brief gap covered by REST polling.
pub struct StreamManager {
    config: StreamConfig,
    sink: Arc<dyn TickerSink>,
    connections: Vec<StreamConnection>,
}

impl StreamManager {
    /// Creates a manager with no active connections.
    #[must_use]
    pub fn new(config: StreamConfig, sink: Arc<dyn TickerSink>) -> Self {
        Self {
            config,
            sink,
            connections: Vec::new(),
        }
    }

    /// Starts connections covering the given symbols, stopping any running
    /// set first.
    ///
    /// Passing two empty lists stops all streaming.
    pub async fn start(&mut self, futures_symbols: &[Symbol], spot_symbols: &[Symbol]) {
        self.stop().await;

        let futures_urls = build_stream_urls(
            &self.config.futures_ws_url,
            futures_symbols,
            self.config.max_streams_per_connection,
        );
        let spot_urls = build_stream_urls(
            &self.config.spot_ws_url,
            spot_symbols,
            self.config.max_streams_per_connection,
        );

        for url in futures_urls {
            self.connections.push(StreamConnection::open(
                url,
                MarketType::Futures,
                Arc::clone(&self.sink),
                self.config.clone(),
            ));
        }
        for url in spot_urls {
            self.connections.push(StreamConnection::open(
                url,
                MarketType::Spot,
                Arc::clone(&self.sink),
                self.config.clone(),
            ));
        }

        info!(
            futures_symbols = futures_symbols.len(),
            spot_symbols = spot_symbols.len(),
            connections = self.connections.len(),
            "stream connections started"
        );
    }

    /// Stops all connections and waits for their tasks to finish.
    ///
    /// A no-op when nothing is running.
    pub async fn stop(&mut self) {
        if self.connections.is_empty() {
            return;
        }

        let count = self.connections.len();
        for conn in self.connections.drain(..) {
            conn.stop().await;
        }
        debug!(connections = count, "stream connections stopped");
    }

    /// Returns whether any connection is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
