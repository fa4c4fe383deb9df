//! Error taxonomy for price lookups and daily averages
//!
//! Every failure in the core is a [`PriceError`]. Callers that need to react
//! differently (HTTP status, retry-later, log-and-skip) match on
//! [`PriceError::kind`] instead of individual variants.

use thiserror::Error;

use crate::services::exchange::Exchange;

/// Coarse classification of a [`PriceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown exchange or malformed symbol. Not retryable.
    InvalidInput,
    /// No rate-limit token was available. Retryable later.
    RateLimited,
    /// The exchange failed, timed out, or answered with something unusable.
    Upstream,
    /// Store, serialization, or configuration failure.
    Internal,
}

impl ErrorKind {
    /// Stable error code exposed to API clients
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::RateLimited => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Upstream => "EXCHANGE_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Errors produced by the price gateway, the adapters and the daily-average store
///
/// The type is `Clone` so a single failed upstream fetch can be handed to
/// every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceError {
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),

    #[error("Symbol '{0}' must be 2-8 uppercase letters")]
    InvalidSymbol(String),

    #[error("Rate limit exceeded for exchange: {exchange}")]
    RateLimited { exchange: Exchange },

    #[error("{} API error: {message}", .exchange.display_name())]
    Upstream {
        exchange: Exchange,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid response format from {}: {message}", .exchange.display_name())]
    Parse { exchange: Exchange, message: String },

    #[error("Request to {} timed out", .exchange.display_name())]
    Timeout { exchange: Exchange },

    #[error("No rate limit configured for exchange: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PriceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PriceError::UnsupportedExchange(_) | PriceError::InvalidSymbol(_) => {
                ErrorKind::InvalidInput
            }
            PriceError::RateLimited { .. } => ErrorKind::RateLimited,
            PriceError::Upstream { .. } | PriceError::Parse { .. } | PriceError::Timeout { .. } => {
                ErrorKind::Upstream
            }
            PriceError::Configuration(_) | PriceError::Store(_) | PriceError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status returned by the exchange, if the failure carried one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PriceError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<sqlx::Error> for PriceError {
    fn from(e: sqlx::Error) -> Self {
        PriceError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for PriceError {
    fn from(e: serde_json::Error) -> Self {
        PriceError::Internal(format!("serialization failed: {}", e))
    }
}
