use std::time::Duration;

use crate::services::average_sync::DEFAULT_UPDATE_INTERVAL;
use crate::services::binance::DEFAULT_BINANCE_API_BASE;
use crate::services::exchange::Exchange;
use crate::services::kraken::DEFAULT_KRAKEN_API_BASE;
use crate::services::price_cache::DEFAULT_PRICE_TTL;
use crate::services::rate_limiter::RateLimitConfig;

#[derive(Clone, Debug)]
pub struct EnvVars {
    pub port: u16,
    // Optional: without it daily averages live in memory only
    pub database_url: Option<String>,
    pub binance_api_base_url: String, // Override for testing
    pub kraken_api_base_url: String,  // Override for testing
    // Token buckets
    pub binance_rate_limit_capacity: u32,
    pub binance_rate_limit_period_seconds: u64,
    pub kraken_rate_limit_capacity: u32,
    pub kraken_rate_limit_period_seconds: u64,
    pub price_cache_ttl_seconds: u64,
    pub upstream_timeout_seconds: u64,
    // Daily average service; an interval of 0 disables it
    pub daily_average_interval_seconds: u64,
    pub daily_average_exchanges: Vec<String>,
    pub daily_average_symbols: Vec<String>,
    // CORS configuration; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn list_or(name: &str, default: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for EnvVars {
    fn default() -> Self {
        let binance = RateLimitConfig::default_for(Exchange::Binance);
        let kraken = RateLimitConfig::default_for(Exchange::Kraken);

        Self {
            port: parse_or("PORT", 3002),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            binance_api_base_url: std::env::var("BINANCE_API_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BINANCE_API_BASE.to_string()),
            kraken_api_base_url: std::env::var("KRAKEN_API_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_KRAKEN_API_BASE.to_string()),
            binance_rate_limit_capacity: parse_or("BINANCE_RATE_LIMIT_CAPACITY", binance.capacity),
            binance_rate_limit_period_seconds: parse_or(
                "BINANCE_RATE_LIMIT_PERIOD_SECONDS",
                binance.period.as_secs(),
            ),
            kraken_rate_limit_capacity: parse_or("KRAKEN_RATE_LIMIT_CAPACITY", kraken.capacity),
            kraken_rate_limit_period_seconds: parse_or(
                "KRAKEN_RATE_LIMIT_PERIOD_SECONDS",
                kraken.period.as_secs(),
            ),
            price_cache_ttl_seconds: parse_or(
                "PRICE_CACHE_TTL_SECONDS",
                DEFAULT_PRICE_TTL.as_secs(),
            ),
            upstream_timeout_seconds: parse_or("UPSTREAM_TIMEOUT_SECONDS", 10),
            daily_average_interval_seconds: parse_or(
                "DAILY_AVERAGE_INTERVAL_SECONDS",
                DEFAULT_UPDATE_INTERVAL.as_secs(),
            ),
            daily_average_exchanges: list_or("DAILY_AVERAGE_EXCHANGES", "binance,kraken"),
            daily_average_symbols: list_or("DAILY_AVERAGE_SYMBOLS", "BTCUSDT,ETHUSDT"),
            cors_allowed_origins: list_or("CORS_ALLOWED_ORIGINS", ""),
        }
    }
}

impl EnvVars {
    pub fn rate_limit(&self, exchange: Exchange) -> RateLimitConfig {
        match exchange {
            Exchange::Binance => RateLimitConfig::new(
                self.binance_rate_limit_capacity,
                Duration::from_secs(self.binance_rate_limit_period_seconds),
            ),
            Exchange::Kraken => RateLimitConfig::new(
                self.kraken_rate_limit_capacity,
                Duration::from_secs(self.kraken_rate_limit_period_seconds),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "PORT",
        "BINANCE_RATE_LIMIT_CAPACITY",
        "KRAKEN_RATE_LIMIT_CAPACITY",
        "KRAKEN_RATE_LIMIT_PERIOD_SECONDS",
        "PRICE_CACHE_TTL_SECONDS",
        "DAILY_AVERAGE_INTERVAL_SECONDS",
        "DAILY_AVERAGE_SYMBOLS",
        "DATABASE_URL",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let env = EnvVars::default();

        assert_eq!(env.port, 3002);
        assert_eq!(env.database_url, None);
        assert_eq!(env.rate_limit(Exchange::Binance), RateLimitConfig::per_minute(20));
        assert_eq!(env.rate_limit(Exchange::Kraken), RateLimitConfig::per_second(1));
        assert_eq!(env.price_cache_ttl_seconds, 10);
        assert_eq!(env.daily_average_interval_seconds, 300);
        assert_eq!(env.daily_average_symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        unsafe {
            std::env::set_var("PORT", "8080");
            std::env::set_var("BINANCE_RATE_LIMIT_CAPACITY", "not-a-number");
            std::env::set_var("DAILY_AVERAGE_SYMBOLS", " SOLUSDT , ,ETHUSDT");
            std::env::set_var("DATABASE_URL", "");
        }

        let env = EnvVars::default();
        clear();

        assert_eq!(env.port, 8080);
        assert_eq!(env.binance_rate_limit_capacity, 20);
        assert_eq!(env.daily_average_symbols, vec!["SOLUSDT", "ETHUSDT"]);
        assert_eq!(env.database_url, None);
    }
}
