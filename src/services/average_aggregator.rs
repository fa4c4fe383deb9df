//! Incremental daily average aggregation
//!
//! Each update reads today's record, takes one fresh observation through the
//! price gateway and writes the folded mean back. The read-modify-write is
//! not atomic against the store: only one writer per (exchange, symbol) is
//! supported. Inside one process that is enforced with a per-pair lock, so
//! overlapping triggers queue up instead of losing samples. Separate
//! processes writing the same store are not supported.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

use super::daily_average::{DailyAverageRecord, DailyAverageStore};
use super::exchange::{Exchange, validate_symbol};
use super::price_cache::CallMode;
use super::price_gateway::PriceGateway;
use crate::errors::PriceError;

type PairLock = Arc<tokio::sync::Mutex<()>>;

pub struct AverageAggregator {
    gateway: Arc<PriceGateway>,
    store: DailyAverageStore,
    pairs: Vec<(Exchange, String)>,
    pair_locks: Mutex<HashMap<(Exchange, String), PairLock>>,
}

impl AverageAggregator {
    /// Creates an aggregator that updates the given pairs on every `update_all`
    pub fn new(
        gateway: Arc<PriceGateway>,
        store: DailyAverageStore,
        pairs: Vec<(Exchange, String)>,
    ) -> Self {
        Self {
            gateway,
            store,
            pairs,
            pair_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pairs(&self) -> &[(Exchange, String)] {
        &self.pairs
    }

    pub fn store(&self) -> &DailyAverageStore {
        &self.store
    }

    /// Updates every configured pair once, sequentially
    ///
    /// Returns how many updates succeeded. Failures are logged per pair and
    /// never stop the remaining pairs.
    pub async fn update_all(&self) -> usize {
        let mut updated = 0;

        for (exchange, symbol) in &self.pairs {
            if self.update_daily_average(exchange.id(), symbol).await {
                updated += 1;
            }
        }

        log::info!(
            "Daily average run finished: {}/{} pairs updated",
            updated,
            self.pairs.len()
        );
        updated
    }

    /// Folds one fresh observation into today's average
    ///
    /// Every failure is logged and swallowed; the return value only says
    /// whether the record was written.
    pub async fn update_daily_average(&self, exchange: &str, symbol: &str) -> bool {
        match self.try_update_daily_average(exchange, symbol).await {
            Ok(record) => {
                log::info!(
                    "Updated daily average for {} on {}: {} ({} samples)",
                    record.symbol,
                    record.provider.display_name(),
                    record.average_price,
                    record.sample_count
                );
                true
            }
            Err(e) => {
                log::error!(
                    "Error updating daily average for {} on {}: {}",
                    symbol,
                    exchange,
                    e
                );
                false
            }
        }
    }

    /// Same as [`Self::update_daily_average`] but hands the outcome back
    pub async fn try_update_daily_average(
        &self,
        exchange: &str,
        symbol: &str,
    ) -> Result<DailyAverageRecord, PriceError> {
        let exchange: Exchange = exchange.parse()?;
        validate_symbol(symbol)?;

        self.update_on(exchange, symbol, Utc::now().date_naive()).await
    }

    async fn update_on(
        &self,
        exchange: Exchange,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<DailyAverageRecord, PriceError> {
        let lock = self.pair_lock(exchange, symbol);
        let _guard = lock.lock().await;

        let current = self.store.read(exchange, symbol, date).await?;

        let quote = self
            .gateway
            .get_price_as(exchange.id(), symbol, CallMode::Blocking)
            .await?;

        let record = match current {
            Some(record) => record.with_observation(&quote.price),
            None => DailyAverageRecord::first(exchange, symbol, date, &quote.price),
        };

        self.store.write(&record).await?;
        Ok(record)
    }

    /// Reads the stored average; `date` defaults to today (UTC)
    ///
    /// Never touches the gateway or the rate limiter.
    pub async fn get_daily_average(
        &self,
        exchange: &str,
        symbol: &str,
        date: Option<NaiveDate>,
    ) -> Result<Option<DailyAverageRecord>, PriceError> {
        let exchange: Exchange = exchange.parse()?;
        validate_symbol(symbol)?;
        let date = date.unwrap_or_else(|| Utc::now().date_naive());

        self.store.read(exchange, symbol, date).await
    }

    fn pair_lock(&self, exchange: Exchange, symbol: &str) -> PairLock {
        let mut locks = self
            .pair_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        locks
            .entry((exchange, symbol.to_string()))
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::kv_store::InMemoryKeyValueStore;
    use crate::services::price_cache::PriceCache;
    use crate::services::price_provider::PriceProvider;
    use crate::services::rate_limiter::{RateLimitConfig, RateLimiter};
    use crate::utils::test_utils::ScriptedProvider;
    use bigdecimal::BigDecimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Zero TTL so every update observes a fresh price
    fn aggregator_with(provider: ScriptedProvider) -> (AverageAggregator, Arc<AtomicUsize>) {
        let exchange = provider.exchange();
        let calls = provider.call_counter();
        let limiter = Arc::new(RateLimiter::new([(exchange, RateLimitConfig::per_second(100))]));
        let gateway = PriceGateway::new(
            vec![Arc::new(provider)],
            limiter,
            PriceCache::new(Duration::ZERO),
        )
        .unwrap();
        let store = DailyAverageStore::new(Arc::new(InMemoryKeyValueStore::new()));

        let aggregator = AverageAggregator::new(
            Arc::new(gateway),
            store,
            vec![(exchange, "BTCUSDT".to_string())],
        );
        (aggregator, calls)
    }

    #[tokio::test]
    async fn test_three_updates_average_to_102() {
        let (aggregator, calls) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[100, 102, 104]));

        for _ in 0..3 {
            assert!(aggregator.update_daily_average("binance", "BTCUSDT").await);
        }

        let record = aggregator
            .get_daily_average("binance", "BTCUSDT", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.average_price, BigDecimal::from(102));
        assert_eq!(record.sample_count, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_written_record_reads_back() {
        let (aggregator, _) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Kraken, &[2_500]));

        let written = aggregator
            .try_update_daily_average("kraken", "BTCUSDT")
            .await
            .unwrap();
        let read = aggregator
            .get_daily_average("kraken", "BTCUSDT", Some(Utc::now().date_naive()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(read.provider, written.provider);
        assert_eq!(read.symbol, written.symbol);
        assert_eq!(read.date, written.date);
        assert_eq!(read.sample_count, written.sample_count);
    }

    #[tokio::test]
    async fn test_new_date_starts_new_record() {
        let (aggregator, _) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[100, 200, 300]));
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();

        aggregator.update_on(Exchange::Binance, "BTCUSDT", monday).await.unwrap();
        aggregator.update_on(Exchange::Binance, "BTCUSDT", monday).await.unwrap();
        let fresh = aggregator.update_on(Exchange::Binance, "BTCUSDT", tuesday).await.unwrap();

        assert_eq!(fresh.sample_count, 1);
        assert_eq!(fresh.average_price, BigDecimal::from(300));

        let previous = aggregator
            .get_daily_average("binance", "BTCUSDT", Some(monday))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.average_price, BigDecimal::from(150));
        assert_eq!(previous.sample_count, 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_swallowed_and_nothing_written() {
        let provider = ScriptedProvider::new(
            Exchange::Binance,
            vec![Err(PriceError::Upstream {
                exchange: Exchange::Binance,
                status: Some(500),
                message: "boom".to_string(),
            })],
        );
        let (aggregator, _) = aggregator_with(provider);

        assert!(!aggregator.update_daily_average("binance", "BTCUSDT").await);
        assert_eq!(
            aggregator.get_daily_average("binance", "BTCUSDT", None).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_invalid_input_is_swallowed() {
        let (aggregator, calls) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[1]));

        assert!(!aggregator.update_daily_average("dogecoinex", "BTCUSDT").await);
        assert!(!aggregator.update_daily_average("binance", "btc").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_average_is_none() {
        let (aggregator, calls) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[1]));

        let result = aggregator
            .get_daily_average("binance", "ETHUSDT", None)
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_all_counts_successes() {
        let (aggregator, _) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[10]));

        assert_eq!(aggregator.update_all().await, 1);
        assert_eq!(aggregator.pairs().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_updates_do_not_lose_samples() {
        let (aggregator, _) =
            aggregator_with(ScriptedProvider::with_prices(Exchange::Binance, &[50]));
        let aggregator = Arc::new(aggregator);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move {
                    aggregator.try_update_daily_average("binance", "BTCUSDT").await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = aggregator
            .get_daily_average("binance", "BTCUSDT", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sample_count, 10);
    }
}
