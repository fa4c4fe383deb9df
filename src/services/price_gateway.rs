//! Price gateway: validation, caching and rate limiting around the adapters
//!
//! Every lookup goes cache first. Only the caller that wins a cache miss
//! consumes a rate-limit token and calls the exchange; everyone else shares
//! its outcome, rate-limit rejections included.

use std::collections::HashMap;
use std::sync::Arc;

use super::exchange::{Exchange, validate_symbol};
use super::price_cache::{CallMode, PriceCache, PriceCacheKey};
use super::price_provider::{PriceProvider, PriceQuote};
use super::rate_limiter::RateLimiter;
use crate::errors::PriceError;

pub struct PriceGateway {
    providers: HashMap<Exchange, Arc<dyn PriceProvider>>,
    rate_limiter: Arc<RateLimiter>,
    cache: PriceCache,
}

impl PriceGateway {
    /// Creates a gateway over the given adapters
    ///
    /// Fails with a configuration error if an adapter's exchange has no
    /// rate-limit bucket, so a misconfiguration shows up at start-up rather
    /// than on the first request.
    pub fn new(
        providers: Vec<Arc<dyn PriceProvider>>,
        rate_limiter: Arc<RateLimiter>,
        cache: PriceCache,
    ) -> Result<Self, PriceError> {
        let mut by_exchange = HashMap::new();

        for provider in providers {
            let exchange = provider.exchange();
            if !rate_limiter.is_configured(exchange) {
                return Err(PriceError::Configuration(exchange.to_string()));
            }
            by_exchange.insert(exchange, provider);
        }

        Ok(Self {
            providers: by_exchange,
            rate_limiter,
            cache,
        })
    }

    /// Exchanges this gateway can quote, in a stable order
    pub fn exchanges(&self) -> Vec<Exchange> {
        let mut exchanges: Vec<Exchange> = self.providers.keys().copied().collect();
        exchanges.sort();
        exchanges
    }

    /// Non-blocking lookup
    pub async fn get_price(&self, exchange: &str, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.get_price_as(exchange, symbol, CallMode::Reactive).await
    }

    /// Blocking lookup for synchronous callers
    ///
    /// Drives the lookup on the current tokio runtime and parks the calling
    /// thread until it completes. Must run on a thread where blocking is
    /// allowed, e.g. inside `tokio::task::spawn_blocking`; calling it from an
    /// async task panics inside tokio.
    pub fn get_price_blocking(&self, exchange: &str, symbol: &str) -> Result<PriceQuote, PriceError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| PriceError::Internal(format!("no tokio runtime for blocking lookup: {}", e)))?;

        handle.block_on(self.get_price_as(exchange, symbol, CallMode::Blocking))
    }

    /// Looks up a price through the cache slot of the given calling convention
    ///
    /// Input is checked before any cache, rate limiter or network interaction:
    /// unknown exchanges fail with `UnsupportedExchange` and malformed symbols
    /// with `InvalidSymbol`.
    pub async fn get_price_as(
        &self,
        exchange: &str,
        symbol: &str,
        mode: CallMode,
    ) -> Result<PriceQuote, PriceError> {
        let exchange: Exchange = exchange.parse()?;
        let provider = self
            .providers
            .get(&exchange)
            .cloned()
            .ok_or_else(|| PriceError::UnsupportedExchange(exchange.to_string()))?;
        validate_symbol(symbol)?;

        let key = PriceCacheKey::new(exchange, symbol, mode);
        let rate_limiter = self.rate_limiter.clone();
        let symbol = symbol.to_string();

        self.cache
            .get_or_fetch(key, move || async move {
                if !rate_limiter.try_consume(exchange)? {
                    return Err(PriceError::RateLimited { exchange });
                }

                log::info!("Fetching price from {} for {} (cache miss)", exchange.display_name(), symbol);
                provider.fetch_price(&symbol).await
            })
            .await
    }
}
