use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ExchangesResponse {
    pub blocking: Vec<&'static str>,
    pub reactive: Vec<&'static str>,
}

/// GET /api/prices/exchanges
///
/// Both calling conventions are served by the same adapters, so the lists match.
pub async fn get_exchanges(State(state): State<Arc<AppState>>) -> Json<ExchangesResponse> {
    let ids: Vec<&'static str> = state.gateway.exchanges().iter().map(|e| e.id()).collect();

    Json(ExchangesResponse {
        blocking: ids.clone(),
        reactive: ids,
    })
}
