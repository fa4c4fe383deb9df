use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

use crate::{
    services::{
        AverageAggregator, BinanceClient, DailyAverageStore, Exchange, InMemoryKeyValueStore,
        KeyValueStore, KrakenClient, PgKeyValueStore, PriceCache, PriceGateway, PriceProvider,
        RateLimiter, exchange::validate_symbol,
    },
    utils::env::EnvVars,
};

pub struct AppState {
    pub http_client: reqwest::Client,
    pub env_vars: EnvVars,
    pub db_pool: Option<PgPool>,
    pub rate_limiter: Arc<RateLimiter>,
    pub gateway: Arc<PriceGateway>,
    pub aggregator: Arc<AverageAggregator>,
}

impl AppState {
    /// Initialize the application state from environment variables
    pub async fn new() -> Result<AppState, Box<dyn std::error::Error>> {
        Self::from_env(EnvVars::default()).await
    }

    /// Initialize the application state from an explicit configuration
    ///
    /// Everything shared (HTTP client, rate limiter, price cache, store) is
    /// built exactly once here and handed to its dependents.
    pub async fn from_env(env_vars: EnvVars) -> Result<AppState, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(env_vars.upstream_timeout_seconds))
            .build()?;

        let (db_pool, kv): (Option<PgPool>, Arc<dyn KeyValueStore>) = match &env_vars.database_url
        {
            Some(database_url) => {
                log::info!("Connecting to database...");
                let db_pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;

                log::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;

                log::info!("Database connection established successfully");
                (
                    Some(db_pool.clone()),
                    Arc::new(PgKeyValueStore::new(db_pool)),
                )
            }
            None => {
                log::warn!("No DATABASE_URL set, daily averages are kept in memory and lost on restart");
                (None, Arc::new(InMemoryKeyValueStore::new()))
            }
        };

        let rate_limiter = Arc::new(RateLimiter::new(
            Exchange::ALL
                .iter()
                .map(|&exchange| (exchange, env_vars.rate_limit(exchange))),
        ));

        let providers: Vec<Arc<dyn PriceProvider>> = vec![
            Arc::new(BinanceClient::with_base_url(
                http_client.clone(),
                env_vars.binance_api_base_url.clone(),
            )),
            Arc::new(KrakenClient::with_base_url(
                http_client.clone(),
                env_vars.kraken_api_base_url.clone(),
            )),
        ];

        let cache = PriceCache::new(Duration::from_secs(env_vars.price_cache_ttl_seconds));
        let gateway = Arc::new(PriceGateway::new(providers, rate_limiter.clone(), cache)?);

        let pairs = daily_average_pairs(&env_vars)?;
        log::info!("Daily averages tracked for {} pairs", pairs.len());

        let aggregator = Arc::new(AverageAggregator::new(
            gateway.clone(),
            DailyAverageStore::new(kv),
            pairs,
        ));

        Ok(AppState {
            http_client,
            env_vars,
            db_pool,
            rate_limiter,
            gateway,
            aggregator,
        })
    }
}

/// Every configured exchange crossed with every configured symbol
fn daily_average_pairs(
    env_vars: &EnvVars,
) -> Result<Vec<(Exchange, String)>, Box<dyn std::error::Error>> {
    let mut pairs = Vec::new();

    for name in &env_vars.daily_average_exchanges {
        let exchange: Exchange = name.parse()?;
        for symbol in &env_vars.daily_average_symbols {
            validate_symbol(symbol)?;
            pairs.push((exchange, symbol.clone()));
        }
    }

    Ok(pairs)
}
