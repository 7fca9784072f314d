//! Per-account polling of balances and positions.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use sirocco_core::error::{FeedError, NetworkError};
use sirocco_core::{AccountSnapshot, BackoffState};

use crate::api::AccountApi;

/// Polls authenticated account data for one credential set.
///
/// Each coordinator has its own cycle and rate-limit cooldown, independent
/// of the shared market-data layer and of other accounts. Per-fetch
/// failures fall back to the previous value; a rate limit fails the whole
/// cycle and starts a cooldown.
pub struct AccountCoordinator {
    api: Arc<dyn AccountApi>,
    snapshot: RwLock<AccountSnapshot>,
    backoff: Mutex<BackoffState>,
    last_cycle_ok: AtomicBool,
}

impl AccountCoordinator {
    /// Creates a coordinator over the given account API.
    #[must_use]
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self {
            api,
            snapshot: RwLock::new(AccountSnapshot::default()),
            backoff: Mutex::new(BackoffState::new()),
            last_cycle_ok: AtomicBool::new(true),
        }
    }

    /// Returns a clone of the current account snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AccountSnapshot {
        self.snapshot.read().clone()
    }

    /// Returns whether the most recent cycle succeeded.
    #[must_use]
    pub fn last_cycle_ok(&self) -> bool {
        self.last_cycle_ok.load(Ordering::SeqCst)
    }

    /// Runs one polling cycle.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Backoff` without network I/O while a cooldown
    /// is active, and `NetworkError::RateLimited` when this cycle was
    /// throttled, both wrapped in [`FeedError`]. Other per-fetch failures
    /// are absorbed.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        Ok(self.poll().await?)
    }

    async fn poll(&self) -> Result<(), NetworkError> {
        if let Some(remaining) = self.backoff.lock().remaining(Instant::now()) {
            let remaining_secs = remaining.as_secs().max(1);
            debug!(remaining_secs, "account cycle skipped, cooldown active");
            self.last_cycle_ok.store(false, Ordering::SeqCst);
            return Err(NetworkError::Backoff { remaining_secs });
        }

        let (wallets_res, positions_res) =
            tokio::join!(self.api.wallet_balances(), self.api.open_positions());

        let mut rate_limit = None;
        let wallets = match wallets_res {
            Ok(wallets) => Some(wallets),
            Err(e) => {
                if let NetworkError::RateLimited { retry_after_secs } = &e {
                    rate_limit = Some(*retry_after_secs);
                }
                warn!(error = %e, "wallet fetch failed, keeping previous balances");
                None
            }
        };
        let positions = match positions_res {
            Ok(positions) => Some(positions),
            Err(e) => {
                if let NetworkError::RateLimited { retry_after_secs } = &e {
                    rate_limit = Some(*retry_after_secs);
                }
                warn!(error = %e, "position fetch failed, keeping previous positions");
                None
            }
        };

        if let Some(retry_after_secs) = rate_limit {
            self.backoff
                .lock()
                .start_cooldown(Instant::now(), Duration::from_secs(retry_after_secs));
            self.last_cycle_ok.store(false, Ordering::SeqCst);
            warn!(retry_after_secs, "account cycle rate limited, cooldown started");
            return Err(NetworkError::RateLimited { retry_after_secs });
        }

        {
            let mut snapshot = self.snapshot.write();
            if let Some(wallets) = wallets {
                snapshot.wallets = wallets;
            }
            if let Some(positions) = positions {
                snapshot.positions = positions;
            }
        }
        self.backoff.lock().reset();
        self.last_cycle_ok.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sirocco_core::{MarginType, Position, PositionSide, Symbol};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct MockAccountApi {
        wallets_fail: AtomicBool,
        rate_limit_next: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockAccountApi {
        fn new() -> Self {
            Self {
                wallets_fail: AtomicBool::new(false),
                rate_limit_next: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn position() -> Position {
            Position {
                symbol: Symbol::new_unchecked("ETHUSDT"),
                position_amt: -0.5,
                entry_price: 3_200.0,
                mark_price: 3_100.0,
                unrealized_profit: 50.0,
                liquidation_price: 4_500.0,
                leverage: 10,
                margin_type: MarginType::Isolated,
                position_side: PositionSide::Short,
            }
        }
    }

    #[async_trait]
    impl AccountApi for MockAccountApi {
        async fn wallet_balances(&self) -> Result<HashMap<String, f64>, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limit_next.load(Ordering::SeqCst) {
                return Err(NetworkError::RateLimited {
                    retry_after_secs: 30,
                });
            }
            if self.wallets_fail.load(Ordering::SeqCst) {
                return Err(NetworkError::Timeout { timeout_ms: 30_000 });
            }
            Ok(HashMap::from([("Spot".to_string(), 0.25)]))
        }

        async fn open_positions(&self) -> Result<Vec<Position>, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limit_next.load(Ordering::SeqCst) {
                return Err(NetworkError::RateLimited {
                    retry_after_secs: 30,
                });
            }
            Ok(vec![Self::position()])
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_snapshot() {
        let api = Arc::new(MockAccountApi::new());
        let coordinator = AccountCoordinator::new(api);

        coordinator.refresh().await.unwrap();
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.wallets["Spot"], 0.25);
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions[0].position_amt, -0.5);
        assert!(coordinator.last_cycle_ok());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_previous_field() {
        let api = Arc::new(MockAccountApi::new());
        let coordinator = AccountCoordinator::new(Arc::clone(&api) as Arc<dyn AccountApi>);

        coordinator.refresh().await.unwrap();
        api.wallets_fail.store(true, Ordering::SeqCst);
        coordinator.refresh().await.unwrap();

        // Balances fall back, positions still update.
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.wallets["Spot"], 0.25);
        assert_eq!(snapshot.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_starts_cooldown() {
        let api = Arc::new(MockAccountApi::new());
        let coordinator = AccountCoordinator::new(Arc::clone(&api) as Arc<dyn AccountApi>);

        api.rate_limit_next.store(true, Ordering::SeqCst);
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Network(NetworkError::RateLimited { .. })
        ));
        assert!(!coordinator.last_cycle_ok());

        let calls_before = api.calls.load(Ordering::SeqCst);
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Network(NetworkError::Backoff { .. })
        ));
        assert_eq!(api.calls.load(Ordering::SeqCst), calls_before);
    }
}
