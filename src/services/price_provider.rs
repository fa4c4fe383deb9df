//! Price provider trait for fetching current prices
//!
//! This module defines the interface every exchange adapter implements,
//! along with the canonical [`PriceQuote`] they all produce.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::exchange::Exchange;
use crate::errors::PriceError;

/// A current price observed on an exchange
///
/// `observed_at` is stamped with our own clock when the response is parsed;
/// the exchanges do not return a timestamp we can rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub price: BigDecimal,
    pub exchange: Exchange,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(exchange: Exchange, symbol: impl Into<String>, price: BigDecimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            exchange,
            observed_at: Utc::now(),
        }
    }
}

/// Trait for exchange price adapters
///
/// One upstream call per `fetch_price` invocation. Adapters never retry and
/// never consult the rate limiter; both are the caller's business.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// The exchange this adapter talks to
    fn exchange(&self) -> Exchange;

    /// Translates a canonical symbol (e.g. "BTCUSDT") into the exchange's own syntax
    fn translate_symbol(&self, symbol: &str) -> String {
        symbol.to_string()
    }

    /// Fetches the current price for a canonical symbol
    ///
    /// # Returns
    /// * `Ok(quote)` - The parsed quote, carrying the canonical symbol
    /// * `Err(PriceError::Upstream)` - Non-2xx status or an error embedded in the body
    /// * `Err(PriceError::Parse)` - The body did not contain a usable price
    /// * `Err(PriceError::Timeout)` - The request exceeded the client timeout
    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, PriceError>;
}

/// Maps a transport-level reqwest failure onto the error taxonomy
pub(crate) fn request_error(exchange: Exchange, e: reqwest::Error) -> PriceError {
    if e.is_timeout() {
        return PriceError::Timeout { exchange };
    }

    PriceError::Upstream {
        exchange,
        status: e.status().map(|s| s.as_u16()),
        message: format!("Failed to fetch price from {}: {}", exchange.display_name(), e),
    }
}

/// Parses a decimal price string, rejecting negative values
pub(crate) fn parse_price(exchange: Exchange, raw: &str) -> Result<BigDecimal, PriceError> {
    let price = BigDecimal::from_str(raw.trim()).map_err(|e| PriceError::Parse {
        exchange,
        message: format!("invalid price '{}': {}", raw, e),
    })?;

    if price < BigDecimal::from(0) {
        return Err(PriceError::Parse {
            exchange,
            message: format!("negative price '{}'", raw),
        });
    }

    Ok(price)
}
