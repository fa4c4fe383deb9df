//! Token bucket rate limiter for exchange APIs
//!
//! Each exchange gets one bucket sized to its documented request ceiling.
//! Refill is lazy: tokens are recomputed from elapsed time whenever a caller
//! tries to consume one, so there is no background timer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::exchange::Exchange;
use crate::errors::PriceError;

/// Static bucket configuration for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket holds (and the burst size)
    pub capacity: u32,
    /// Time it takes to refill an empty bucket completely
    pub period: Duration,
}

impl RateLimitConfig {
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self { capacity, period }
    }

    pub fn per_second(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(1))
    }

    pub fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    /// Published ceilings: Binance 20 requests/minute, Kraken 1 request/second
    pub fn default_for(exchange: Exchange) -> Self {
        match exchange {
            Exchange::Binance => Self::per_minute(20),
            Exchange::Kraken => Self::per_second(1),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    period: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            tokens: config.capacity as f64,
            capacity: config.capacity as f64,
            period: config.period,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let period = self.period.as_secs_f64();

        if period <= 0.0 {
            self.tokens = self.capacity;
        } else {
            self.tokens = (self.tokens + elapsed * self.capacity / period).min(self.capacity);
        }
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-exchange token buckets
///
/// The set of exchanges is fixed at construction. Each bucket sits behind its
/// own mutex, so consumption for one exchange never waits on another.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: HashMap<Exchange, Mutex<TokenBucket>>,
}

impl RateLimiter {
    pub fn new(configs: impl IntoIterator<Item = (Exchange, RateLimitConfig)>) -> Self {
        let buckets = configs
            .into_iter()
            .map(|(exchange, config)| {
                debug!(
                    "Rate limiter for {}: {} tokens per {:?}",
                    exchange, config.capacity, config.period
                );
                (exchange, Mutex::new(TokenBucket::new(config)))
            })
            .collect();

        Self { buckets }
    }

    pub fn is_configured(&self, exchange: Exchange) -> bool {
        self.buckets.contains_key(&exchange)
    }

    /// Tries to take one token for the exchange without waiting
    ///
    /// # Returns
    /// * `Ok(true)` - A token was taken; the caller may hit the exchange
    /// * `Ok(false)` - The bucket is empty
    /// * `Err(PriceError::Configuration)` - No bucket exists for the exchange
    pub fn try_consume(&self, exchange: Exchange) -> Result<bool, PriceError> {
        let mut bucket = self.lock_bucket(exchange)?;
        let consumed = bucket.try_consume();

        if !consumed {
            warn!("Rate limit exceeded for exchange: {}", exchange);
        }

        Ok(consumed)
    }

    /// Whole tokens currently available, after applying any pending refill
    pub fn remaining_tokens(&self, exchange: Exchange) -> Result<u32, PriceError> {
        let mut bucket = self.lock_bucket(exchange)?;
        bucket.refill();
        Ok(bucket.tokens.floor() as u32)
    }

    /// Time until the next token becomes available; zero if one is available now
    pub fn retry_after(&self, exchange: Exchange) -> Result<Duration, PriceError> {
        let mut bucket = self.lock_bucket(exchange)?;
        bucket.refill();

        if bucket.tokens >= 1.0 || bucket.capacity <= 0.0 {
            return Ok(Duration::ZERO);
        }

        let seconds_per_token = bucket.period.as_secs_f64() / bucket.capacity;
        Ok(Duration::from_secs_f64((1.0 - bucket.tokens) * seconds_per_token))
    }

    /// Poisoning only means a panic happened mid-update; the bucket fields are
    /// still valid numbers, so keep going with them.
    fn lock_bucket(&self, exchange: Exchange) -> Result<MutexGuard<'_, TokenBucket>, PriceError> {
        let bucket = self
            .buckets
            .get(&exchange)
            .ok_or_else(|| PriceError::Configuration(exchange.to_string()))?;

        Ok(bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter bucket for {} was poisoned, recovering", exchange);
            poisoned.into_inner()
        }))
    }
}
