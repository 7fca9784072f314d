//! Shared market-data coordination: snapshot store, poller and streaming.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use sirocco_core::error::{FeedError, NetworkError};
use sirocco_core::{BackoffState, MarketSnapshot, MarketType, Symbol, Ticker};
use sirocco_gateway::ws::{StreamConfig, StreamManager, TickerSink};

use crate::api::MarketApi;
use crate::config::FeedConfig;
use crate::registry::{PairSet, SubscriptionRegistry};

/// Thread-safe holder of the shared market snapshot.
///
/// The coordinator replaces whole cycles; stream connections overwrite
/// individual tickers. Both paths bump a generation counter that readers
/// can watch for changes. Push updates for symbols absent from the tracked
/// maps are discarded, so streams can never grow the snapshot beyond what
/// the poller seeded.
pub struct SnapshotStore {
    snapshot: RwLock<MarketSnapshot>,
    generation: watch::Sender<u64>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(MarketSnapshot::default()),
            generation: watch::Sender::new(0),
        }
    }

    /// Returns a clone of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot.read().clone()
    }

    /// Looks up one tracked ticker.
    #[must_use]
    pub fn ticker(&self, market: MarketType, symbol: &Symbol) -> Option<Ticker> {
        self.snapshot.read().ticker(market, symbol).copied()
    }

    /// Returns the reference price, if fetched at least once.
    #[must_use]
    pub fn reference_price(&self) -> Option<f64> {
        self.snapshot.read().reference_price
    }

    /// Returns true if any ticker data has been stored.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.snapshot.read().is_empty()
    }

    /// Returns a receiver that observes the generation counter.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Applies one polling cycle atomically.
    ///
    /// `None` for a ticker map means the fetch was skipped or failed; the
    /// previous map is kept for that market.
    pub(crate) fn apply_cycle(
        &self,
        futures: Option<HashMap<Symbol, Ticker>>,
        spot: Option<HashMap<Symbol, Ticker>>,
        reference_price: Option<f64>,
    ) {
        {
            let mut snapshot = self.snapshot.write();
            if let Some(map) = futures {
                snapshot.futures = map;
            }
            if let Some(map) = spot {
                snapshot.spot = map;
            }
            if let Some(price) = reference_price {
                snapshot.reference_price = Some(price);
            }
        }
        self.notify();
    }

    /// Drops tracked tickers outside the given union.
    pub(crate) fn retain(&self, union: &PairSet) {
        let changed = {
            let mut snapshot = self.snapshot.write();
            let before = snapshot.futures.len() + snapshot.spot.len();
            snapshot.futures.retain(|s, _| union.futures.contains(s));
            snapshot.spot.retain(|s, _| union.spot.contains(s));
            before != snapshot.futures.len() + snapshot.spot.len()
        };
        if changed {
            self.notify();
        }
    }

    /// Clears all data.
    pub(crate) fn clear(&self) {
        *self.snapshot.write() = MarketSnapshot::default();
        self.notify();
    }

    fn notify(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickerSink for SnapshotStore {
    async fn apply_ticker(&self, market: MarketType, symbol: Symbol, ticker: Ticker) {
        let applied = {
            let mut snapshot = self.snapshot.write();
            let map = snapshot.market_mut(market);
            if let Some(entry) = map.get_mut(&symbol) {
                *entry = ticker;
                true
            } else {
                false
            }
        };

        if applied {
            self.notify();
        } else {
            debug!(market = %market, symbol = %symbol, "dropped update for untracked symbol");
        }
    }
}

/// Owns the shared layer: subscription registry, snapshot poller and the
/// stream manager.
///
/// Registration changes recompute the union and restart streaming; the last
/// consumer out tears the whole layer down. Polling cycles keep the snapshot
/// fresh and bridge coverage gaps while streams restart.
pub struct SharedCoordinator {
    api: Arc<dyn MarketApi>,
    config: FeedConfig,
    store: Arc<SnapshotStore>,
    registry: Mutex<SubscriptionRegistry>,
    backoff: Mutex<BackoffState>,
    streams: tokio::sync::Mutex<StreamManager>,
    streamed: Mutex<PairSet>,
    last_cycle_ok: AtomicBool,
}

impl SharedCoordinator {
    /// Creates a coordinator with no subscriptions.
    #[must_use]
    pub fn new(api: Arc<dyn MarketApi>, config: FeedConfig, stream_config: StreamConfig) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let sink: Arc<dyn TickerSink> = Arc::clone(&store) as Arc<dyn TickerSink>;

        Self {
            api,
            config,
            store,
            registry: Mutex::new(SubscriptionRegistry::new()),
            backoff: Mutex::new(BackoffState::new()),
            streams: tokio::sync::Mutex::new(StreamManager::new(stream_config, sink)),
            streamed: Mutex::new(PairSet::default()),
            last_cycle_ok: AtomicBool::new(true),
        }
    }

    /// Returns the snapshot store.
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Returns a clone of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MarketSnapshot {
        self.store.snapshot()
    }

    /// Returns a receiver that observes snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    /// Returns whether the most recent polling cycle succeeded.
    #[must_use]
    pub fn last_cycle_ok(&self) -> bool {
        self.last_cycle_ok.load(Ordering::SeqCst)
    }

    /// Returns whether stream connections are active.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        !self.streamed.lock().is_empty()
    }

    /// Computes the union of all consumer subscriptions.
    #[must_use]
    pub fn merged_subscriptions(&self) -> PairSet {
        self.registry.lock().merged()
    }

    /// Registers (or replaces) a consumer's subscriptions.
    ///
    /// Runs a full polling cycle so newly subscribed symbols become tracked,
    /// then restarts streaming to cover the new union. A failed bootstrap
    /// poll is absorbed; the periodic poller retries and streaming starts
    /// once data lands.
    pub async fn register(&self, consumer: impl Into<String>, pairs: PairSet) {
        let consumer = consumer.into();
        let union = {
            let mut registry = self.registry.lock();
            registry.register(consumer.clone(), pairs);
            registry.merged()
        };
        info!(
            consumer = %consumer,
            futures = union.futures.len(),
            spot = union.spot.len(),
            "consumer registered"
        );

        if let Err(e) = self.poll(true).await {
            warn!(consumer = %consumer, error = %e, "bootstrap poll failed");
        }
        self.sync_streams(&union).await;
    }

    /// Removes a consumer's subscriptions.
    ///
    /// The last consumer out tears down streams, snapshot and backoff state.
    pub async fn unregister(&self, consumer: &str) {
        let (removed, union, empty) = {
            let mut registry = self.registry.lock();
            let removed = registry.unregister(consumer);
            (removed, registry.merged(), registry.is_empty())
        };
        if !removed {
            return;
        }
        info!(consumer = %consumer, remaining = !empty, "consumer unregistered");

        if empty {
            self.teardown().await;
        } else {
            self.sync_streams(&union).await;
        }
    }

    /// Runs one polling cycle.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Backoff` without any network I/O while a
    /// rate-limit cooldown is active, and `NetworkError::RateLimited` when
    /// the exchange throttles this cycle, both wrapped in [`FeedError`].
    /// Other per-fetch failures are absorbed by falling back to the
    /// previous cycle's value.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        Ok(self.poll(false).await?)
    }

    async fn poll(&self, force_full: bool) -> Result<(), NetworkError> {
        if let Some(remaining) = self.backoff.lock().remaining(Instant::now()) {
            let remaining_secs = remaining.as_secs().max(1);
            debug!(remaining_secs, "cycle skipped, cooldown active");
            self.last_cycle_ok.store(false, Ordering::SeqCst);
            return Err(NetworkError::Backoff { remaining_secs });
        }

        let union = self.registry.lock().merged();
        // Full-list fetches are skipped while streams carry the updates,
        // except when new symbols must be seeded.
        let need_full = force_full || !self.is_streaming() || !self.store.has_data();

        let (futures_res, spot_res, price_res) = tokio::join!(
            async {
                if need_full {
                    Some(self.api.futures_tickers().await)
                } else {
                    None
                }
            },
            async {
                if need_full {
                    Some(self.api.spot_tickers().await)
                } else {
                    None
                }
            },
            self.api.reference_price(),
        );

        let mut rate_limit = None;
        let futures = absorb(futures_res, "futures_tickers", &mut rate_limit);
        let spot = absorb(spot_res, "spot_tickers", &mut rate_limit);
        let reference = absorb(Some(price_res), "reference_price", &mut rate_limit);

        if let Some(retry_after_secs) = rate_limit {
            self.backoff
                .lock()
                .start_cooldown(Instant::now(), Duration::from_secs(retry_after_secs));
            self.last_cycle_ok.store(false, Ordering::SeqCst);
            warn!(retry_after_secs, "cycle rate limited, cooldown started");
            return Err(NetworkError::RateLimited { retry_after_secs });
        }

        let futures = futures.map(|mut map| {
            map.retain(|symbol, _| union.futures.contains(symbol));
            map
        });
        let spot = spot.map(|mut map| {
            map.retain(|symbol, _| union.spot.contains(symbol));
            map
        });

        self.store.apply_cycle(futures, spot, reference);
        self.backoff.lock().reset();
        self.last_cycle_ok.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Brings streaming in line with the union.
    ///
    /// Streams only start after the first full poll has seeded the snapshot.
    async fn sync_streams(&self, union: &PairSet) {
        self.store.retain(union);

        let desired = self.config.use_websocket && !union.is_empty();
        if !desired {
            let mut streams = self.streams.lock().await;
            if streams.is_running() {
                streams.stop().await;
                *self.streamed.lock() = PairSet::default();
            }
            return;
        }

        if !self.store.has_data() {
            return;
        }
        if *self.streamed.lock() == *union {
            return;
        }

        let futures = union.sorted(MarketType::Futures);
        let spot = union.sorted(MarketType::Spot);
        self.streams.lock().await.start(&futures, &spot).await;
        *self.streamed.lock() = union.clone();
    }

    async fn teardown(&self) {
        self.streams.lock().await.stop().await;
        *self.streamed.lock() = PairSet::default();
        self.store.clear();
        self.backoff.lock().reset();
        self.last_cycle_ok.store(true, Ordering::SeqCst);
        info!("shared layer torn down");
    }

    /// Spawns the periodic polling loop.
    ///
    /// Each tick runs a cycle and re-syncs streaming, which also starts
    /// streams deferred by a failed bootstrap poll.
    #[must_use]
    pub fn spawn_polling(self: &Arc<Self>) -> PollHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let coordinator = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(coordinator.config.update_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = coordinator.refresh().await {
                            warn!(error = %e, "polling cycle failed");
                        }
                        let union = coordinator.registry.lock().merged();
                        coordinator.sync_streams(&union).await;
                    }
                }
            }
            debug!("polling loop stopped");
        });

        PollHandle {
            shutdown_tx,
            handle,
        }
    }
}

/// Handle to a spawned polling loop.
pub struct PollHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PollHandle {
    /// Stops the loop and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}

fn absorb<T>(
    result: Option<Result<T, NetworkError>>,
    fetch: &str,
    rate_limit: &mut Option<u64>,
) -> Option<T> {
    match result {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            if let NetworkError::RateLimited { retry_after_secs } = &e {
                *rate_limit = Some(*retry_after_secs);
            }
            warn!(fetch, error = %e, "fetch failed, keeping previous value");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn symbol(name: &str) -> Symbol {
        Symbol::new(name).unwrap()
    }

    fn ticker(price: f64) -> Ticker {
        Ticker {
            last_price: price,
            ..Ticker::default()
        }
    }

    struct MockMarketApi {
        futures: HashMap<Symbol, Ticker>,
        spot: HashMap<Symbol, Ticker>,
        price: f64,
        rate_limit_next: AtomicBool,
        calls: AtomicUsize,
        futures_calls: AtomicUsize,
        spot_calls: AtomicUsize,
        price_calls: AtomicUsize,
    }

    impl MockMarketApi {
        fn new() -> Self {
            let mut futures = HashMap::new();
            futures.insert(symbol("BTCUSDT"), ticker(67_000.0));
            futures.insert(symbol("ETHUSDT"), ticker(3_200.0));
            let mut spot = HashMap::new();
            spot.insert(symbol("BTCUSDT"), ticker(67_050.0));

            Self {
                futures,
                spot,
                price: 67_050.0,
                rate_limit_next: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                futures_calls: AtomicUsize::new(0),
                spot_calls: AtomicUsize::new(0),
                price_calls: AtomicUsize::new(0),
            }
        }

        fn check_rate_limit(&self) -> Result<(), NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limit_next.load(Ordering::SeqCst) {
                return Err(NetworkError::RateLimited {
                    retry_after_secs: 20,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MarketApi for MockMarketApi {
        async fn futures_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError> {
            self.futures_calls.fetch_add(1, Ordering::SeqCst);
            self.check_rate_limit()?;
            Ok(self.futures.clone())
        }

        async fn spot_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError> {
            self.spot_calls.fetch_add(1, Ordering::SeqCst);
            self.check_rate_limit()?;
            Ok(self.spot.clone())
        }

        async fn reference_price(&self) -> Result<f64, NetworkError> {
            self.price_calls.fetch_add(1, Ordering::SeqCst);
            self.check_rate_limit()?;
            Ok(self.price)
        }

        async fn available_symbols(
            &self,
            _market: MarketType,
        ) -> Result<Vec<Symbol>, NetworkError> {
            Ok(vec![])
        }
    }

    fn polling_only_config() -> FeedConfig {
        FeedConfig {
            use_websocket: false,
            ..FeedConfig::default()
        }
    }

    fn local_stream_config() -> StreamConfig {
        StreamConfig::builder()
            .spot_ws_url("ws://127.0.0.1:1/stream")
            .futures_ws_url("ws://127.0.0.1:1/stream")
            .connect_timeout(Duration::from_millis(100))
            .reconnect_delay(Duration::from_secs(60))
            .max_reconnect_delay(Duration::from_secs(60))
            .build()
    }

    #[tokio::test]
    async fn test_snapshot_filtered_to_union() {
        let api = Arc::new(MockMarketApi::new());
        let coordinator =
            SharedCoordinator::new(api, polling_only_config(), local_stream_config());

        coordinator
            .register("a", PairSet::new(vec![symbol("BTCUSDT")], vec![]))
            .await;

        let snapshot = coordinator.snapshot();
        assert!(snapshot.futures.contains_key(&symbol("BTCUSDT")));
        assert!(!snapshot.futures.contains_key(&symbol("ETHUSDT")));
        assert!(snapshot.spot.is_empty());
        assert_eq!(snapshot.reference_price, Some(67_050.0));
        assert!(coordinator.last_cycle_ok());
    }

    #[tokio::test]
    async fn test_cooldown_skips_cycle_without_network() {
        let api = Arc::new(MockMarketApi::new());
        let coordinator = SharedCoordinator::new(
            Arc::clone(&api) as Arc<dyn MarketApi>,
            polling_only_config(),
            local_stream_config(),
        );
        coordinator
            .register("a", PairSet::new(vec![symbol("BTCUSDT")], vec![]))
            .await;

        api.rate_limit_next.store(true, Ordering::SeqCst);
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Network(NetworkError::RateLimited { .. })
        ));
        assert!(!coordinator.last_cycle_ok());

        // Previous data must survive the failed cycle.
        assert!(coordinator.store().has_data());

        let calls_before = api.calls.load(Ordering::SeqCst);
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Network(NetworkError::Backoff { .. })
        ));
        assert_eq!(api.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn test_last_consumer_teardown() {
        let api = Arc::new(MockMarketApi::new());
        let coordinator =
            SharedCoordinator::new(api, polling_only_config(), local_stream_config());

        coordinator
            .register("a", PairSet::new(vec![symbol("BTCUSDT")], vec![]))
            .await;
        coordinator
            .register("b", PairSet::new(vec![symbol("ETHUSDT")], vec![]))
            .await;
        assert!(coordinator.store().has_data());

        coordinator.unregister("a").await;
        assert!(coordinator.store().has_data());
        assert!(coordinator
            .snapshot()
            .futures
            .contains_key(&symbol("ETHUSDT")));
        // The departed consumer's exclusive symbol stops being tracked.
        assert!(!coordinator
            .snapshot()
            .futures
            .contains_key(&symbol("BTCUSDT")));

        coordinator.unregister("b").await;
        assert!(!coordinator.store().has_data());
        assert!(coordinator.merged_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_survives_shared_symbol_departure() {
        let api = Arc::new(MockMarketApi::new());
        let coordinator = Arc::new(SharedCoordinator::new(
            api,
            FeedConfig::default(),
            local_stream_config(),
        ));

        coordinator
            .register("a", PairSet::new(vec![symbol("BTCUSDT")], vec![]))
            .await;
        coordinator
            .register(
                "b",
                PairSet::new(vec![symbol("BTCUSDT"), symbol("ETHUSDT")], vec![]),
            )
            .await;
        assert!(coordinator.is_streaming());

        coordinator.unregister("a").await;
        assert!(coordinator.is_streaming());
        assert!(coordinator
            .snapshot()
            .futures
            .contains_key(&symbol("BTCUSDT")));

        coordinator.unregister("b").await;
        assert!(!coordinator.is_streaming());
    }

    #[tokio::test]
    async fn test_full_fetches_skipped_while_streaming() {
        let api = Arc::new(MockMarketApi::new());
        let coordinator = SharedCoordinator::new(
            Arc::clone(&api) as Arc<dyn MarketApi>,
            FeedConfig::default(),
            local_stream_config(),
        );

        coordinator
            .register("a", PairSet::new(vec![symbol("BTCUSDT")], vec![]))
            .await;
        assert!(coordinator.is_streaming());

        let futures_before = api.futures_calls.load(Ordering::SeqCst);
        let spot_before = api.spot_calls.load(Ordering::SeqCst);
        let price_before = api.price_calls.load(Ordering::SeqCst);

        coordinator.refresh().await.unwrap();

        // Streams carry ticker updates; only the reference price is polled.
        assert_eq!(api.futures_calls.load(Ordering::SeqCst), futures_before);
        assert_eq!(api.spot_calls.load(Ordering::SeqCst), spot_before);
        assert_eq!(api.price_calls.load(Ordering::SeqCst), price_before + 1);

        // The previous ticker maps survive the skipped fetches.
        assert!(coordinator
            .snapshot()
            .futures
            .contains_key(&symbol("BTCUSDT")));
    }

    #[tokio::test]
    async fn test_untracked_push_update_dropped() {
        let store = SnapshotStore::new();
        store.apply_cycle(
            Some(HashMap::from([(symbol("BTCUSDT"), ticker(67_000.0))])),
            None,
            None,
        );

        store
            .apply_ticker(MarketType::Futures, symbol("DOGEUSDT"), ticker(0.1))
            .await;
        assert!(store.ticker(MarketType::Futures, &symbol("DOGEUSDT")).is_none());

        store
            .apply_ticker(MarketType::Futures, symbol("BTCUSDT"), ticker(68_000.0))
            .await;
        assert_eq!(
            store
                .ticker(MarketType::Futures, &symbol("BTCUSDT"))
                .unwrap()
                .last_price,
            68_000.0
        );
    }

    #[tokio::test]
    async fn test_generation_advances_on_writes() {
        let store = SnapshotStore::new();
        let rx = store.subscribe();
        let start = *rx.borrow();

        store.apply_cycle(
            Some(HashMap::from([(symbol("BTCUSDT"), ticker(1.0))])),
            None,
            Some(1.0),
        );
        assert!(*rx.borrow() > start);
    }
}
