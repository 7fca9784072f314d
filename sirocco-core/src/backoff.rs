//! Backoff bookkeeping for rate limits and reconnects.
//!
//! Two owners use this state: each coordinator keeps one for rate-limit
//! cooldowns, and each stream connection keeps a failure counter for
//! reconnect delays. The owner is the only mutator; any successful
//! cycle or connect resets the state.

use std::time::{Duration, Instant};

/// Cooldown and consecutive-failure tracking.
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
}

impl BackoffState {
    /// Creates a fresh state with no cooldown and zero failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remaining cooldown, or `None` when none is active.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let until = self.cooldown_until?;
        if until > now {
            Some(until - now)
        } else {
            None
        }
    }

    /// Starts (or extends) a cooldown and records the failure.
    pub fn start_cooldown(&mut self, now: Instant, duration: Duration) {
        self.cooldown_until = Some(now + duration);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Records a failure without a cooldown, returning the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Clears cooldown and failure count after a successful cycle.
    pub fn reset(&mut self) {
        self.cooldown_until = None;
        self.consecutive_failures = 0;
    }

    /// Returns the consecutive-failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Computes the reconnect delay for the n-th consecutive failure.
///
/// The sequence is `base * 2^(failures - 1)` capped at `max`; a zero
/// failure count yields the base delay.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sirocco_core::backoff::reconnect_delay;
///
/// let base = Duration::from_secs(5);
/// let max = Duration::from_secs(300);
/// assert_eq!(reconnect_delay(base, max, 1), Duration::from_secs(5));
/// assert_eq!(reconnect_delay(base, max, 4), Duration::from_secs(40));
/// assert_eq!(reconnect_delay(base, max, 10), Duration::from_secs(300));
/// ```
#[must_use]
pub fn reconnect_delay(base: Duration, max: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(32);
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
    Duration::from_millis(delay_ms)
}
