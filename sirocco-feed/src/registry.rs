//! Per-consumer symbol registrations and their merged union.

use std::collections::{BTreeSet, HashMap};

use sirocco_core::{MarketType, Symbol};

/// Symbols a consumer wants per market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairSet {
    /// Futures symbols.
    pub futures: BTreeSet<Symbol>,
    /// Spot symbols.
    pub spot: BTreeSet<Symbol>,
}

impl PairSet {
    /// Builds a pair set from symbol lists.
    #[must_use]
    pub fn new(
        futures: impl IntoIterator<Item = Symbol>,
        spot: impl IntoIterator<Item = Symbol>,
    ) -> Self {
        Self {
            futures: futures.into_iter().collect(),
            spot: spot.into_iter().collect(),
        }
    }

    /// Returns the set for a market.
    #[must_use]
    pub fn market(&self, market: MarketType) -> &BTreeSet<Symbol> {
        match market {
            MarketType::Futures => &self.futures,
            MarketType::Spot => &self.spot,
        }
    }

    /// Returns a market's symbols as a sorted list.
    #[must_use]
    pub fn sorted(&self, market: MarketType) -> Vec<Symbol> {
        self.market(market).iter().cloned().collect()
    }

    /// Returns true if both sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty() && self.spot.is_empty()
    }
}

/// Tracks which consumer subscribed to which symbols.
///
/// The union across consumers is derived on demand and never stored, so it
/// cannot go stale against the per-consumer entries.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, PairSet>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a consumer's subscriptions.
    pub fn register(&mut self, consumer: impl Into<String>, pairs: PairSet) {
        self.entries.insert(consumer.into(), pairs);
    }

    /// Removes a consumer. Returns true if it was registered.
    pub fn unregister(&mut self, consumer: &str) -> bool {
        self.entries.remove(consumer).is_some()
    }

    /// Returns a consumer's subscriptions.
    #[must_use]
    pub fn get(&self, consumer: &str) -> Option<&PairSet> {
        self.entries.get(consumer)
    }

    /// Returns true if no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.entries.len()
    }

    /// Computes the union of all subscriptions across consumers.
    #[must_use]
    pub fn merged(&self) -> PairSet {
        let mut union = PairSet::default();
        for pairs in self.entries.values() {
            union.futures.extend(pairs.futures.iter().cloned());
            union.spot.extend(pairs.spot.iter().cloned());
        }
        union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| Symbol::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_merged_union_overlap() {
        let mut registry = SubscriptionRegistry::new();
        registry.register(
            "account_a",
            PairSet::new(symbols(&["BTCUSDT", "ETHUSDT"]), symbols(&["BTCUSDT"])),
        );
        registry.register(
            "account_b",
            PairSet::new(symbols(&["BTCUSDT", "SOLUSDT"]), vec![]),
        );

        let union = registry.merged();
        assert_eq!(
            union.sorted(MarketType::Futures),
            symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])
        );
        assert_eq!(union.sorted(MarketType::Spot), symbols(&["BTCUSDT"]));
    }

    #[test]
    fn test_register_replaces_previous_entry() {
        let mut registry = SubscriptionRegistry::new();
        registry.register("a", PairSet::new(symbols(&["BTCUSDT"]), vec![]));
        registry.register("a", PairSet::new(symbols(&["ETHUSDT"]), vec![]));

        assert_eq!(registry.consumer_count(), 1);
        assert_eq!(
            registry.merged().sorted(MarketType::Futures),
            symbols(&["ETHUSDT"])
        );
    }

    #[test]
    fn test_unregister_shrinks_union() {
        let mut registry = SubscriptionRegistry::new();
        registry.register("a", PairSet::new(symbols(&["BTCUSDT"]), vec![]));
        registry.register("b", PairSet::new(symbols(&["ETHUSDT"]), vec![]));

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(
            registry.merged().sorted(MarketType::Futures),
            symbols(&["ETHUSDT"])
        );

        registry.unregister("b");
        assert!(registry.is_empty());
        assert!(registry.merged().is_empty());
    }
}
