#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use exchange_data::AppState;
use exchange_data::utils::env::EnvVars;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// App wired against mock exchanges with an in-memory store
pub struct TestApp {
    pub state: Arc<AppState>,
    pub binance: MockServer,
    pub kraken: MockServer,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts the app after letting the caller adjust the configuration
    pub async fn start_with(configure: impl FnOnce(&mut EnvVars)) -> Self {
        let binance = MockServer::start().await;
        let kraken = MockServer::start().await;

        let mut env_vars = test_env_vars(&binance, &kraken);
        configure(&mut env_vars);

        let state = AppState::from_env(env_vars)
            .await
            .expect("Failed to initialize app state");

        Self {
            state: Arc::new(state),
            binance,
            kraken,
        }
    }

    pub fn router(&self) -> Router {
        exchange_data::routes::create_routes(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

pub fn test_env_vars(binance: &MockServer, kraken: &MockServer) -> EnvVars {
    EnvVars {
        port: 0,
        database_url: None,
        binance_api_base_url: binance.uri(),
        kraken_api_base_url: kraken.uri(),
        binance_rate_limit_capacity: 20,
        binance_rate_limit_period_seconds: 60,
        kraken_rate_limit_capacity: 1,
        kraken_rate_limit_period_seconds: 1,
        price_cache_ttl_seconds: 10,
        upstream_timeout_seconds: 5,
        daily_average_interval_seconds: 0,
        daily_average_exchanges: vec!["binance".to_string(), "kraken".to_string()],
        daily_average_symbols: vec!["BTCUSDT".to_string()],
        cors_allowed_origins: vec![],
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Mounts a Binance ticker response for one symbol
pub async fn mock_binance_price(server: &MockServer, symbol: &str, price: &str) {
    Mock::given(method("GET"))
        .and(path("/ticker/price"))
        .and(query_param("symbol", symbol))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "symbol": symbol,
            "price": price
        })))
        .mount(server)
        .await;
}

/// Mounts a Kraken ticker response for one pair
pub async fn mock_kraken_price(server: &MockServer, pair: &str, ask: &str) {
    Mock::given(method("GET"))
        .and(path("/Ticker"))
        .and(query_param("pair", pair))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": [],
            "result": {
                pair: { "a": [ask, "1", "1.000"], "b": [ask, "1", "1.000"] }
            }
        })))
        .mount(server)
        .await;
}
