//! Domain types for market data and account state.
//!
//! Numeric values are `f64` throughout: the exchange transmits decimal
//! strings and these snapshots feed displays, not accounting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Market type a symbol belongs to.
///
/// Symbol uniqueness is per market: `BTCUSDT` on futures and `BTCUSDT`
/// on spot are distinct instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    /// USD-margined futures market.
    Futures,
    /// Spot market.
    Spot,
}

impl MarketType {
    /// Returns the market type as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Futures => "futures",
            Self::Spot => "spot",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trading pair identifier, e.g. `BTCUSDT`.
///
/// Wraps a `String` with validation: non-empty, alphanumeric plus `-`/`_`.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::Symbol;
///
/// let symbol = Symbol::new("BTCUSDT").unwrap();
/// assert_eq!(symbol.as_str(), "BTCUSDT");
/// assert!(Symbol::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new `Symbol` from a string.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptySymbol` if the string is empty and
    /// `ValidationError::InvalidSymbol` if it contains characters outside
    /// alphanumerics, `-` and `_`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidSymbol(s));
        }
        Ok(Self(s))
    }

    /// Creates a new `Symbol` without validation.
    ///
    /// The caller must ensure the value is a valid symbol format.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercased form used in stream names.
    #[must_use]
    pub fn to_stream_name(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 24-hour ticker statistics for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticker {
    /// Last traded price.
    pub last_price: f64,
    /// Price change over the window, in percent.
    pub price_change_percent: f64,
    /// Highest price in the window.
    pub high_price: f64,
    /// Lowest price in the window.
    pub low_price: f64,
    /// Traded base-asset volume.
    pub volume: f64,
    /// Traded quote-asset volume.
    pub quote_volume: f64,
}

/// Shared market snapshot: tracked tickers per market plus the reference
/// price used for currency conversion.
///
/// Only symbols subscribed by some consumer are tracked; updates for
/// anything else are discarded at the write path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Futures tickers, keyed by symbol.
    pub futures: HashMap<Symbol, Ticker>,
    /// Spot tickers, keyed by symbol.
    pub spot: HashMap<Symbol, Ticker>,
    /// BTCUSDT spot price, if fetched at least once.
    pub reference_price: Option<f64>,
}

impl MarketSnapshot {
    /// Returns the ticker map for a market.
    #[must_use]
    pub fn market(&self, market: MarketType) -> &HashMap<Symbol, Ticker> {
        match market {
            MarketType::Futures => &self.futures,
            MarketType::Spot => &self.spot,
        }
    }

    /// Returns the ticker map for a market, mutably.
    pub fn market_mut(&mut self, market: MarketType) -> &mut HashMap<Symbol, Ticker> {
        match market {
            MarketType::Futures => &mut self.futures,
            MarketType::Spot => &mut self.spot,
        }
    }

    /// Looks up one tracked ticker.
    #[must_use]
    pub fn ticker(&self, market: MarketType, symbol: &Symbol) -> Option<&Ticker> {
        self.market(market).get(symbol)
    }

    /// Returns true if no ticker data has been stored for either market.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty() && self.spot.is_empty()
    }
}

/// Margin mode of a futures position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginType {
    /// Cross margin (shared collateral).
    #[default]
    Cross,
    /// Isolated margin.
    Isolated,
}

impl MarginType {
    /// Parses the exchange's margin-type string, defaulting to cross.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        if value.eq_ignore_ascii_case("isolated") {
            Self::Isolated
        } else {
            Self::Cross
        }
    }
}

/// Position side in hedge-mode accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    /// One-way mode (the default).
    #[default]
    Both,
    /// Hedge-mode long leg.
    Long,
    /// Hedge-mode short leg.
    Short,
}

impl PositionSide {
    /// Parses the exchange's position-side string, defaulting to `BOTH`.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "LONG" => Self::Long,
            "SHORT" => Self::Short,
            _ => Self::Both,
        }
    }
}

/// One open futures position.
///
/// `position_amt` keeps its sign: negative means short. Positions with a
/// zero amount are filtered out at ingestion and never constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument the position is in.
    pub symbol: Symbol,
    /// Signed position size (negative = short).
    pub position_amt: f64,
    /// Average entry price.
    pub entry_price: f64,
    /// Current mark price.
    pub mark_price: f64,
    /// Unrealized profit and loss.
    pub unrealized_profit: f64,
    /// Liquidation price (0 when not applicable).
    pub liquidation_price: f64,
    /// Leverage multiplier, at least 1.
    pub leverage: u32,
    /// Margin mode.
    pub margin_type: MarginType,
    /// Position side.
    pub position_side: PositionSide,
}

/// Per-account snapshot of authenticated data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Wallet balances keyed by wallet name (values in BTC).
    pub wallets: HashMap<String, f64>,
    /// Open positions, zero-amount entries excluded.
    pub positions: Vec<Position>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_validation() {
        assert!(Symbol::new("BTCUSDT").is_ok());
        assert!(Symbol::new("1000PEPE_USDT").is_ok());
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("BTC USDT").is_err());
    }

    #[test]
    fn test_symbol_stream_name() {
        let symbol = Symbol::new("ETHUSDT").unwrap();
        assert_eq!(symbol.to_stream_name(), "ethusdt");
    }

    #[test]
    fn test_symbol_ordering() {
        let mut symbols = vec![
            Symbol::new_unchecked("ETHUSDT"),
            Symbol::new_unchecked("BTCUSDT"),
        ];
        symbols.sort();
        assert_eq!(symbols[0].as_str(), "BTCUSDT");
    }

    #[test]
    fn test_market_type_display() {
        assert_eq!(MarketType::Futures.to_string(), "futures");
        assert_eq!(MarketType::Spot.to_string(), "spot");
    }

    #[test]
    fn test_snapshot_market_lookup() {
        let mut snapshot = MarketSnapshot::default();
        assert!(snapshot.is_empty());

        let symbol = Symbol::new_unchecked("BTCUSDT");
        snapshot.market_mut(MarketType::Futures).insert(
            symbol.clone(),
            Ticker {
                last_price: 50_000.0,
                ..Ticker::default()
            },
        );

        assert!(!snapshot.is_empty());
        assert!(snapshot.ticker(MarketType::Futures, &symbol).is_some());
        assert!(snapshot.ticker(MarketType::Spot, &symbol).is_none());
    }

    #[test]
    fn test_margin_type_parsing() {
        assert_eq!(MarginType::parse_or_default("ISOLATED"), MarginType::Isolated);
        assert_eq!(MarginType::parse_or_default("cross"), MarginType::Cross);
        assert_eq!(MarginType::parse_or_default("unknown"), MarginType::Cross);
    }

    #[test]
    fn test_position_side_parsing() {
        assert_eq!(PositionSide::parse_or_default("LONG"), PositionSide::Long);
        assert_eq!(PositionSide::parse_or_default("SHORT"), PositionSide::Short);
        assert_eq!(PositionSide::parse_or_default(""), PositionSide::Both);
    }

    #[test]
    fn test_symbol_serde_transparent() {
        let symbol = Symbol::new_unchecked("BTCUSDT");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"BTCUSDT\"");
        let parsed: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, symbol);
    }
}
