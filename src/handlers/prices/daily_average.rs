use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::error::ApiError;
use crate::{AppState, services::DailyAverageRecord};

#[derive(Debug, Deserialize)]
pub struct DailyAverageQuery {
    /// YYYY-MM-DD, defaults to today (UTC)
    pub date: Option<String>,
}

/// GET /api/prices/{exchange}/{symbol}/daily-average?date=YYYY-MM-DD
pub async fn get_daily_average(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(query): Query<DailyAverageQuery>,
) -> Result<Json<DailyAverageRecord>, ApiError> {
    let date = query
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ApiError::bad_request(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
            })
        })
        .transpose()?;

    let record = state
        .aggregator
        .get_daily_average(&exchange, &symbol, date)
        .await?;

    record.map(Json).ok_or_else(|| {
        ApiError::not_found(format!(
            "No daily average for {} on {}",
            symbol,
            exchange.to_lowercase()
        ))
    })
}
