//! Exchange API trait seams and their gateway-backed implementations.
//!
//! Coordinators depend on [`MarketApi`] and [`AccountApi`] rather than the
//! REST client directly, so polling logic is testable against mock
//! transports.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use sirocco_core::error::NetworkError;
use sirocco_core::{MarginType, MarketType, Position, PositionSide, Symbol, Ticker};
use sirocco_gateway::{RestConfig, SignedRequestClient};

use crate::config::Credentials;

/// Public market-data operations.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Fetches 24hr tickers for every futures symbol.
    async fn futures_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError>;

    /// Fetches 24hr tickers for every spot symbol.
    async fn spot_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError>;

    /// Fetches the BTCUSDT spot price used for currency conversion.
    async fn reference_price(&self) -> Result<f64, NetworkError>;

    /// Lists tradable symbols for a market, sorted.
    async fn available_symbols(&self, market: MarketType) -> Result<Vec<Symbol>, NetworkError>;
}

/// Authenticated per-account operations.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Fetches wallet balances keyed by wallet name.
    async fn wallet_balances(&self) -> Result<HashMap<String, f64>, NetworkError>;

    /// Fetches open futures positions, zero-amount entries excluded.
    async fn open_positions(&self) -> Result<Vec<Position>, NetworkError>;
}

/// [`MarketApi`] backed by the Binance REST endpoints.
pub struct BinanceMarketApi {
    client: Arc<SignedRequestClient>,
}

impl BinanceMarketApi {
    /// Creates a market API over the given client.
    #[must_use]
    pub fn new(client: Arc<SignedRequestClient>) -> Self {
        Self { client }
    }

    fn futures_url(&self, path: &str) -> String {
        format!("{}{path}", self.client.config().futures_api_url)
    }

    fn spot_url(&self, path: &str) -> String {
        format!("{}{path}", self.client.config().spot_api_url)
    }
}

#[async_trait]
impl MarketApi for BinanceMarketApi {
    async fn futures_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError> {
        let body = self
            .client
            .get(&self.futures_url("/fapi/v1/ticker/24hr"), &[], false)
            .await?;
        parse_ticker_list(&body)
    }

    async fn spot_tickers(&self) -> Result<HashMap<Symbol, Ticker>, NetworkError> {
        let body = self
            .client
            .get(&self.spot_url("/api/v3/ticker/24hr"), &[], false)
            .await?;
        parse_ticker_list(&body)
    }

    async fn reference_price(&self) -> Result<f64, NetworkError> {
        let body = self
            .client
            .get(
                &self.spot_url("/api/v3/ticker/price"),
                &[("symbol", "BTCUSDT".to_string())],
                false,
            )
            .await?;
        f64_field(&body, "price")
    }

    async fn available_symbols(&self, market: MarketType) -> Result<Vec<Symbol>, NetworkError> {
        let mut symbols = match market {
            MarketType::Futures => {
                let body = self
                    .client
                    .get(&self.futures_url("/fapi/v2/ticker/price"), &[], false)
                    .await?;
                array_items(&body)?
                    .iter()
                    .filter_map(parse_symbol_field)
                    .collect::<Vec<_>>()
            }
            MarketType::Spot => {
                let body = self
                    .client
                    .get(&self.spot_url("/api/v3/ticker/24hr"), &[], false)
                    .await?;
                // Tickers with no weighted average price are delisted or
                // untradable pairs.
                array_items(&body)?
                    .iter()
                    .filter(|item| {
                        f64_field(item, "weightedAvgPrice")
                            .map(|p| p > 0.0)
                            .unwrap_or(false)
                    })
                    .filter_map(parse_symbol_field)
                    .collect::<Vec<_>>()
            }
        };

        symbols.sort();
        debug!(market = %market, count = symbols.len(), "listed available symbols");
        Ok(symbols)
    }
}

/// [`AccountApi`] backed by the Binance signed endpoints.
pub struct BinanceAccountApi {
    client: Arc<SignedRequestClient>,
}

impl BinanceAccountApi {
    /// Creates an account API over the given client.
    ///
    /// The client must carry credentials; both operations are signed.
    #[must_use]
    pub fn new(client: Arc<SignedRequestClient>) -> Self {
        Self { client }
    }

    /// Creates an account API from one account's credentials, using the
    /// default endpoints.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Connection` if the HTTP client cannot be
    /// built.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, NetworkError> {
        let config = RestConfig::builder()
            .api_key(credentials.api_key.clone())
            .api_secret(credentials.api_secret.clone())
            .build();
        Ok(Self::new(Arc::new(SignedRequestClient::new(config)?)))
    }
}

#[async_trait]
impl AccountApi for BinanceAccountApi {
    async fn wallet_balances(&self) -> Result<HashMap<String, f64>, NetworkError> {
        let url = format!(
            "{}/sapi/v1/asset/wallet/balance",
            self.client.config().spot_api_url
        );
        let body = self.client.get(&url, &[], true).await?;
        parse_wallet_balances(&body)
    }

    async fn open_positions(&self) -> Result<Vec<Position>, NetworkError> {
        let url = format!(
            "{}/fapi/v2/positionRisk",
            self.client.config().futures_api_url
        );
        let body = self.client.get(&url, &[], true).await?;
        parse_positions(&body)
    }
}

fn array_items(value: &Value) -> Result<&Vec<Value>, NetworkError> {
    value.as_array().ok_or_else(|| NetworkError::Parse {
        reason: "expected a JSON array".to_string(),
    })
}

/// Reads a numeric field the exchange sends as either a string or a number.
fn f64_field(value: &Value, name: &str) -> Result<f64, NetworkError> {
    let field = value.get(name).ok_or_else(|| NetworkError::Parse {
        reason: format!("missing field `{name}`"),
    })?;
    match field {
        Value::String(s) => s.parse().map_err(|_| NetworkError::Parse {
            reason: format!("field `{name}` is not numeric: {s}"),
        }),
        Value::Number(n) => n.as_f64().ok_or_else(|| NetworkError::Parse {
            reason: format!("field `{name}` out of range"),
        }),
        _ => Err(NetworkError::Parse {
            reason: format!("field `{name}` has unexpected type"),
        }),
    }
}

fn parse_symbol_field(item: &Value) -> Option<Symbol> {
    item.get("symbol")
        .and_then(Value::as_str)
        .and_then(|s| Symbol::new(s).ok())
}

/// Parses a 24hr ticker array into a symbol-keyed map.
///
/// Entries with missing or malformed fields are skipped rather than failing
/// the whole list.
pub(crate) fn parse_ticker_list(body: &Value) -> Result<HashMap<Symbol, Ticker>, NetworkError> {
    let items = array_items(body)?;
    let mut tickers = HashMap::with_capacity(items.len());

    for item in items {
        let Some(symbol) = item
            .get("symbol")
            .and_then(Value::as_str)
            .and_then(|s| Symbol::new(s).ok())
        else {
            continue;
        };
        let Ok(ticker) = ticker_from_rest(item) else {
            continue;
        };
        tickers.insert(symbol, ticker);
    }

    Ok(tickers)
}

fn ticker_from_rest(item: &Value) -> Result<Ticker, NetworkError> {
    Ok(Ticker {
        last_price: f64_field(item, "lastPrice")?,
        price_change_percent: f64_field(item, "priceChangePercent")?,
        high_price: f64_field(item, "highPrice")?,
        low_price: f64_field(item, "lowPrice")?,
        volume: f64_field(item, "volume")?,
        quote_volume: f64_field(item, "quoteVolume")?,
    })
}

pub(crate) fn parse_wallet_balances(body: &Value) -> Result<HashMap<String, f64>, NetworkError> {
    let items = array_items(body)?;
    let mut wallets = HashMap::with_capacity(items.len());

    for item in items {
        let Some(name) = item.get("walletName").and_then(Value::as_str) else {
            continue;
        };
        let Ok(balance) = f64_field(item, "balance") else {
            continue;
        };
        wallets.insert(name.to_string(), balance);
    }

    Ok(wallets)
}

/// Parses the positionRisk response, dropping flat positions and applying
/// the exchange's defaults for optional fields.
pub(crate) fn parse_positions(body: &Value) -> Result<Vec<Position>, NetworkError> {
    let items = array_items(body)?;
    let mut positions = Vec::new();

    for item in items {
        let Some(symbol) = item
            .get("symbol")
            .and_then(Value::as_str)
            .and_then(|s| Symbol::new(s).ok())
        else {
            continue;
        };
        let Ok(position_amt) = f64_field(item, "positionAmt") else {
            continue;
        };
        if position_amt == 0.0 {
            continue;
        }

        positions.push(Position {
            symbol,
            position_amt,
            entry_price: f64_field(item, "entryPrice").unwrap_or(0.0),
            mark_price: f64_field(item, "markPrice").unwrap_or(0.0),
            unrealized_profit: f64_field(item, "unRealizedProfit").unwrap_or(0.0),
            liquidation_price: f64_field(item, "liquidationPrice").unwrap_or(0.0),
            leverage: f64_field(item, "leverage").map(|l| l as u32).unwrap_or(1).max(1),
            margin_type: item
                .get("marginType")
                .and_then(Value::as_str)
                .map(MarginType::parse_or_default)
                .unwrap_or_default(),
            position_side: item
                .get("positionSide")
                .and_then(Value::as_str)
                .map(PositionSide::parse_or_default)
                .unwrap_or_default(),
        });
    }

    Ok(positions)
}
