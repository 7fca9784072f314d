//! Combined-stream URL construction and payload parsing.

use serde::Deserialize;
use sirocco_core::{Symbol, Ticker};
use tracing::debug;

/// Builds combined-stream URLs for the given symbols, chunked so that no
/// single connection carries more than `max_per_connection` streams.
///
/// Returns one URL per chunk, in the order the symbols were given. An empty
/// symbol list yields no URLs.
#[must_use]
pub fn build_stream_urls(base_url: &str, symbols: &[Symbol], max_per_connection: usize) -> Vec<String> {
    if symbols.is_empty() || max_per_connection == 0 {
        return Vec::new();
    }

    symbols
        .chunks(max_per_connection)
        .map(|chunk| {
            let streams: Vec<String> = chunk
                .iter()
                .map(|s| format!("{}@ticker", s.to_stream_name()))
                .collect();
            format!("{}?streams={}", base_url, streams.join("/"))
        })
        .collect()
}

/// Envelope carried by combined-stream messages.
#[derive(Debug, Deserialize)]
struct CombinedStreamMessage {
    #[serde(default)]
    data: Option<TickerEvent>,
}

/// 24hr ticker event payload.
#[derive(Debug, Deserialize)]
struct TickerEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    last_price: String,
    #[serde(rename = "P")]
    price_change_percent: String,
    #[serde(rename = "h")]
    high_price: String,
    #[serde(rename = "l")]
    low_price: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "q")]
    quote_volume: String,
}

/// Parses a combined-stream text frame into a symbol and ticker.
///
/// Returns `None` for frames that are not ticker events or that fail to
/// parse; such frames are dropped without affecting the connection.
#[must_use]
pub fn parse_combined_ticker(text: &str) -> Option<(Symbol, Ticker)> {
    let message: CombinedStreamMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "dropping unparseable stream frame");
            return None;
        }
    };
    let event = message.data?;

    let symbol = Symbol::new(&event.symbol).ok()?;
    let ticker = Ticker {
        last_price: event.last_price.parse().ok()?,
        price_change_percent: event.price_change_percent.parse().ok()?,
        high_price: event.high_price.parse().ok()?,
        low_price: event.low_price.parse().ok()?,
        volume: event.volume.parse().ok()?,
        quote_volume: event.quote_volume.parse().ok()?,
    };

    Some((symbol, ticker))
}
