//! Supported exchanges

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::PriceError;

/// An exchange the service can quote prices from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Kraken,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::Binance, Exchange::Kraken];

    /// Lowercase identifier used in URLs, storage keys and configuration
    pub fn id(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Kraken => "kraken",
        }
    }

    /// Human readable name returned to API clients
    pub fn display_name(&self) -> &'static str {
        match self {
            Exchange::Binance => "Binance",
            Exchange::Kraken => "Kraken",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Exchange {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "kraken" => Ok(Exchange::Kraken),
            _ => Err(PriceError::UnsupportedExchange(s.to_string())),
        }
    }
}

/// Checks that a symbol is 2-8 uppercase ASCII letters (e.g. `BTCUSDT`)
pub fn validate_symbol(symbol: &str) -> Result<(), PriceError> {
    let valid = (2..=8).contains(&symbol.len()) && symbol.bytes().all(|b| b.is_ascii_uppercase());

    if valid {
        Ok(())
    } else {
        Err(PriceError::InvalidSymbol(symbol.to_string()))
    }
}
