use axum::Router;
use axum::http::HeaderValue;
use exchange_data::AppState;
use exchange_data::services::run_daily_average_service;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let state = Arc::new(AppState::new().await?);

    let interval_secs = state.env_vars.daily_average_interval_seconds;
    if interval_secs > 0 {
        tokio::spawn(run_daily_average_service(
            state.aggregator.clone(),
            Duration::from_secs(interval_secs),
        ));
    } else {
        log::info!("Daily average service disabled (DAILY_AVERAGE_INTERVAL_SECONDS=0)");
    }

    let origins: Vec<HeaderValue> = state
        .env_vars
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr = format!("0.0.0.0:{}", state.env_vars.port);

    let app = Router::new()
        .merge(exchange_data::routes::create_routes(state))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Server running on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
