//! Binance spot API client
//!
//! Uses the public `/ticker/price` endpoint, which needs no authentication
//! and takes the canonical symbol as-is.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::exchange::Exchange;
use super::price_provider::{PriceProvider, PriceQuote, parse_price, request_error};
use crate::errors::PriceError;

/// Default Binance API base URL
pub const DEFAULT_BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";

/// Response from /ticker/price
#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    price: Option<String>,
}

/// Error body Binance returns with non-2xx statuses
#[derive(Debug, Deserialize)]
struct BinanceErrorResponse {
    code: i64,
    msg: String,
}

pub struct BinanceClient {
    http_client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_BINANCE_API_BASE.to_string(),
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
impl PriceProvider for BinanceClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let exchange = self.exchange();
        let url = format!("{}/ticker/price", self.base_url);

        log::debug!("Fetching price from Binance: {} ({})", symbol, url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("symbol", self.translate_symbol(symbol))])
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
            let message = match serde_json::from_str::<BinanceErrorResponse>(&body) {
                Ok(err) => format!("{} (code {})", err.msg, err.code),
                Err(_) => format!("{} - {}", status, body),
            };
            log::warn!("Binance API error for {}: {}", symbol, message);
            return Err(PriceError::Upstream {
                exchange,
                status: Some(status.as_u16()),
                message,
            });
        }

        let data: TickerPriceResponse =
            serde_json::from_str(&body).map_err(|e| PriceError::Parse {
                exchange,
                message: e.to_string(),
            })?;

        let raw_price = data.price.ok_or_else(|| PriceError::Parse {
            exchange,
            message: format!("missing price for {}", symbol),
        })?;
        let price = parse_price(exchange, &raw_price)?;

        log::debug!("Binance: {} = {}", symbol, price);

        Ok(PriceQuote::new(exchange, symbol, price))
    }
}
