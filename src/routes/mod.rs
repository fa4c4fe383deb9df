use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::{AppState, handlers};

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let store = state.aggregator.store().backend();

    let mut exchanges = Map::new();
    for exchange in state.gateway.exchanges() {
        exchanges.insert(
            exchange.id().to_string(),
            json!({
                "remaining_tokens": state.rate_limiter.remaining_tokens(exchange).ok(),
            }),
        );
    }

    if let Err(e) = store.health_check().await {
        log::error!("Health check failed for {} store: {}", store.backend_name(), e);
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "store": {
                    "backend": store.backend_name(),
                    "connected": false,
                    "error": "Store connection failed"
                },
                "exchanges": exchanges
            })),
        ));
    }

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "store": {
            "backend": store.backend_name(),
            "connected": true,
            "pool_size": state.db_pool.as_ref().map(|pool| pool.size()),
            "idle_connections": state.db_pool.as_ref().map(|pool| pool.num_idle())
        },
        "exchanges": exchanges
    })))
}

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // Current prices, one route per calling convention
        .route(
            "/api/prices/blocking/{exchange}/{symbol}",
            get(handlers::prices::price::get_price_blocking),
        )
        .route(
            "/api/prices/reactive/{exchange}/{symbol}",
            get(handlers::prices::price::get_price_reactive),
        )
        .route(
            "/api/prices/exchanges",
            get(handlers::prices::exchanges::get_exchanges),
        )
        // Daily averages
        .route(
            "/api/prices/{exchange}/{symbol}/daily-average",
            get(handlers::prices::daily_average::get_daily_average),
        )
        .with_state(state)
}
