//! Single combined-stream connection with automatic reconnection.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use sirocco_core::{MarketType, Symbol, Ticker};

use super::config::StreamConfig;
use super::stream::parse_combined_ticker;

/// Lifecycle state of a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting the initial or a fresh connection.
    Connecting,
    /// Connected and receiving frames.
    Open,
    /// Connection lost, waiting out the backoff delay.
    Reconnecting,
    /// Shut down, no further reconnect attempts.
    Stopped,
}

/// Receiver for ticker updates pushed by stream connections.
#[async_trait]
pub trait TickerSink: Send + Sync {
    /// Applies a single ticker update for the given market.
    async fn apply_ticker(&self, market: MarketType, symbol: Symbol, ticker: Ticker);
}

/// A single WebSocket connection carrying multiplexed ticker streams.
///
/// The connection runs on a spawned task and reconnects with exponential
/// backoff whenever the link drops. It stays up until [`stop`](Self::stop)
/// is called.
pub struct StreamConnection {
    state: Arc<RwLock<ConnectionState>>,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamConnection {
    /// Opens a connection to the given combined-stream URL.
    ///
    /// Parsed ticker events are forwarded to `sink`. Connection setup happens
    /// on the spawned task, so this returns immediately.
    #[must_use]
    pub fn open(
        url: String,
        market: MarketType,
        sink: Arc<dyn TickerSink>,
        config: StreamConfig,
    ) -> Self {
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(Self::run(
            url,
            market,
            sink,
            config,
            Arc::clone(&state),
            shutdown_rx,
        ));

        Self {
            state,
            shutdown_tx,
            handle,
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Stops the connection and waits for its task to finish.
    ///
    /// Takes effect promptly even while the task is sleeping out a
    /// reconnect delay.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }

    async fn run(
        url: String,
        market: MarketType,
        sink: Arc<dyn TickerSink>,
        config: StreamConfig,
        state: Arc<RwLock<ConnectionState>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut consecutive_failures = 0u32;

        loop {
            *state.write() = if consecutive_failures == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };

            let connect = timeout(config.connect_timeout(), connect_async(&url));
            let ws_stream = tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(market = %market, "shutdown during connect");
                    break;
                }
                result = connect => match result {
                    Ok(Ok((stream, _))) => stream,
                    Ok(Err(e)) => {
                        warn!(market = %market, error = %e, "stream connect failed");
                        consecutive_failures += 1;
                        if Self::backoff(&config, consecutive_failures, &mut shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                    Err(_) => {
                        warn!(
                            market = %market,
                            timeout_ms = config.connect_timeout_ms,
                            "stream connect timed out"
                        );
                        consecutive_failures += 1;
                        if Self::backoff(&config, consecutive_failures, &mut shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            info!(market = %market, url = %url, "stream connected");
            *state.write() = ConnectionState::Open;
            consecutive_failures = 0;

            let (mut sink_half, mut stream_half) = ws_stream.split();
            let mut shutting_down = false;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        let _ = sink_half.close().await;
                        shutting_down = true;
                        break;
                    }

                    next = stream_half.next() => match next {
                        Some(Ok(Message::Text(text))) => {
                            if let Some((symbol, ticker)) = parse_combined_ticker(&text) {
                                sink.apply_ticker(market, symbol, ticker).await;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = sink_half.send(Message::Pong(data)).await {
                                warn!(market = %market, error = %e, "failed to send pong");
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!(market = %market, "server closed stream");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(market = %market, error = %e, "stream error");
                            break;
                        }
                        None => {
                            info!(market = %market, "stream ended");
                            break;
                        }
                    },
                }
            }

            if shutting_down {
                break;
            }

            consecutive_failures += 1;
            if Self::backoff(&config, consecutive_failures, &mut shutdown_rx).await {
                break;
            }
        }

        *state.write() = ConnectionState::Stopped;
        debug!(market = %market, "stream connection stopped");
    }

    /// Waits out the backoff delay. Returns `true` if shutdown was requested
    /// during the wait.
    async fn backoff(
        config: &StreamConfig,
        failures: u32,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> bool {
        let delay = config.reconnect_delay_for(failures);
        warn!(
            attempt = failures,
            delay_ms = delay.as_millis(),
            "reconnecting after delay"
        );

        tokio::select! {
            _ = shutdown_rx.recv() => true,
            () = sleep(delay) => false,
        }
    }
}
