//! Kraken public API client
//!
//! Kraken names bitcoin `XBT`, so canonical symbols starting with `BTC` are
//! rewritten before the request. Errors are reported inside a 200 body via
//! the `error` array as well as through HTTP statuses.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::exchange::Exchange;
use super::price_provider::{PriceProvider, PriceQuote, parse_price, request_error};
use crate::errors::PriceError;

/// Default Kraken public API base URL
pub const DEFAULT_KRAKEN_API_BASE: &str = "https://api.kraken.com/0/public";

/// Response from /Ticker
#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerInfo>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// Ask: [price, whole lot volume, lot volume]
    #[serde(rename = "a", default)]
    ask: Vec<String>,
}

pub struct KrakenClient {
    http_client: Client,
    base_url: String,
}

impl KrakenClient {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_KRAKEN_API_BASE.to_string(),
        }
    }

    /// Creates a client against a custom base URL, used by tests with a mock server
    pub fn with_base_url(http_client: Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait]
impl PriceProvider for KrakenClient {
    fn exchange(&self) -> Exchange {
        Exchange::Kraken
    }

    fn translate_symbol(&self, symbol: &str) -> String {
        match symbol.strip_prefix("BTC") {
            Some(rest) => format!("XBT{}", rest),
            None => symbol.to_string(),
        }
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let exchange = self.exchange();
        let pair = self.translate_symbol(symbol);
        let url = format!("{}/Ticker", self.base_url);

        log::debug!("Fetching price from Kraken: {} as {} ({})", symbol, pair, url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("pair", pair.as_str())])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| request_error(exchange, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(exchange, e))?;

        if !status.is_success() {
            log::warn!("Kraken API error for {}: {} - {}", pair, status, body);
            return Err(PriceError::Upstream {
                exchange,
                status: Some(status.as_u16()),
                message: status.to_string(),
            });
        }

        let data: TickerResponse = serde_json::from_str(&body).map_err(|e| PriceError::Parse {
            exchange,
            message: e.to_string(),
        })?;

        if let Some(first) = data.error.first() {
            log::warn!("Kraken reported an error for {}: {}", pair, first);
            return Err(PriceError::Upstream {
                exchange,
                status: None,
                message: first.clone(),
            });
        }

        let info = data.result.get(&pair).or_else(|| {
            legacy_pair_name(&pair).and_then(|legacy| data.result.get(&legacy))
        });

        let raw_price = info
            .and_then(|info| info.ask.first())
            .ok_or_else(|| PriceError::Parse {
                exchange,
                message: format!("missing ask price for {}", pair),
            })?;
        let price = parse_price(exchange, raw_price)?;

        log::debug!("Kraken: {} = {}", symbol, price);

        Ok(PriceQuote::new(exchange, symbol, price))
    }
}

/// Kraken keys older pairs by their legacy asset codes, e.g. `XXBTZUSD` for
/// `XBTUSD` and `XETHZEUR` for `ETHEUR`
fn legacy_pair_name(pair: &str) -> Option<String> {
    if pair.len() != 6 || !pair.is_ascii() {
        return None;
    }
    let (base, quote) = pair.split_at(3);
    Some(format!("X{}Z{}", base, quote))
}
