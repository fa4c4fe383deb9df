//! Services module for exchange integrations and price aggregation

pub mod average_aggregator;
pub mod average_sync;
pub mod binance;
pub mod daily_average;
pub mod exchange;
pub mod kraken;
pub mod kv_store;
pub mod price_cache;
pub mod price_gateway;
pub mod price_provider;
pub mod rate_limiter;

pub use average_aggregator::AverageAggregator;
pub use average_sync::run_daily_average_service;
pub use binance::BinanceClient;
pub use daily_average::{DailyAverageRecord, DailyAverageStore};
pub use exchange::Exchange;
pub use kraken::KrakenClient;
pub use kv_store::{InMemoryKeyValueStore, KeyValueStore, PgKeyValueStore};
pub use price_cache::{CallMode, PriceCache};
pub use price_gateway::PriceGateway;
pub use price_provider::{PriceProvider, PriceQuote};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
