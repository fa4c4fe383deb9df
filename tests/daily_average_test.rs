mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{TestApp, body_json, mock_binance_price};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_daily_average_after_updates() {
    // Zero TTL so each update takes a fresh observation
    let app = TestApp::start_with(|env| {
        env.price_cache_ttl_seconds = 0;
        env.daily_average_exchanges = vec!["binance".to_string()];
    })
    .await;
    mock_binance_price(&app.binance, "BTCUSDT", "45000.00").await;

    assert_eq!(app.state.aggregator.update_all().await, 1);
    assert_eq!(app.state.aggregator.update_all().await, 1);

    let response = app.get("/api/prices/binance/BTCUSDT/daily-average").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["symbol"], "BTCUSDT");
    assert_eq!(json["provider"], "binance");
    assert_eq!(json["sampleCount"], 2);
    assert_eq!(json["averagePrice"], "45000.00000000");
    assert_eq!(json["date"], Utc::now().date_naive().to_string());
}

#[tokio::test]
async fn test_daily_average_with_explicit_date() {
    let app = TestApp::start().await;
    mock_binance_price(&app.binance, "ETHUSDT", "2500.00").await;

    assert!(
        app.state
            .aggregator
            .update_daily_average("binance", "ETHUSDT")
            .await
    );

    let today = Utc::now().date_naive();
    let response = app
        .get(&format!(
            "/api/prices/binance/ETHUSDT/daily-average?date={}",
            today.format("%Y-%m-%d")
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["sampleCount"], 1);

    let response = app
        .get("/api/prices/binance/ETHUSDT/daily-average?date=2020-01-01")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["errorCode"], "NOT_FOUND");
}

#[tokio::test]
async fn test_daily_average_rejects_bad_input() {
    let app = TestApp::start().await;

    let response = app
        .get("/api/prices/binance/BTCUSDT/daily-average?date=15-01-2024")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/api/prices/dogecoinex/BTCUSDT/daily-average").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorCode"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_failed_update_is_swallowed() {
    let app = TestApp::start_with(|env| {
        env.daily_average_exchanges = vec!["binance".to_string()];
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/ticker/price"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.binance)
        .await;

    assert_eq!(app.state.aggregator.update_all().await, 0);

    let response = app.get("/api/prices/binance/BTCUSDT/daily-average").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_average_reads_do_not_touch_exchange() {
    let app = TestApp::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.binance)
        .await;

    let response = app.get("/api/prices/binance/BTCUSDT/daily-average").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
