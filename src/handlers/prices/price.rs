use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use super::error::ApiError;
use crate::{
    AppState,
    errors::PriceError,
    services::PriceQuote,
};

/// Price as returned to API clients
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub symbol: String,
    /// Decimal string, never a float
    pub price: String,
    /// Display name, e.g. "Binance"
    pub exchange: &'static str,
    pub timestamp: String,
}

impl From<PriceQuote> for PriceResponse {
    fn from(quote: PriceQuote) -> Self {
        Self {
            symbol: quote.symbol,
            price: quote.price.to_string(),
            exchange: quote.exchange.display_name(),
            timestamp: quote.observed_at.to_rfc3339(),
        }
    }
}

/// Converts a lookup failure, attaching `Retry-After` to rate-limit rejections
fn to_api_error(state: &AppState, error: PriceError) -> ApiError {
    let retry_after = match &error {
        PriceError::RateLimited { exchange } => state.rate_limiter.retry_after(*exchange).ok(),
        _ => None,
    };

    let api_error = ApiError::from(error);
    match retry_after {
        Some(wait) => api_error.with_retry_after(wait),
        None => api_error,
    }
}

/// GET /api/prices/blocking/{exchange}/{symbol}
///
/// Runs the synchronous gateway call on tokio's blocking pool.
pub async fn get_price_blocking(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
) -> Result<Json<PriceResponse>, ApiError> {
    let gateway = state.gateway.clone();

    let result = tokio::task::spawn_blocking(move || gateway.get_price_blocking(&exchange, &symbol))
        .await
        .map_err(|e| PriceError::Internal(format!("blocking price lookup failed: {}", e)))
        .and_then(|result| result);

    result
        .map(|quote| Json(quote.into()))
        .map_err(|e| to_api_error(&state, e))
}

/// GET /api/prices/reactive/{exchange}/{symbol}
pub async fn get_price_reactive(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
) -> Result<Json<PriceResponse>, ApiError> {
    state
        .gateway
        .get_price(&exchange, &symbol)
        .await
        .map(|quote| Json(quote.into()))
        .map_err(|e| to_api_error(&state, e))
}
