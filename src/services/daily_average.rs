//! Daily average records and their storage
//!
//! One record per (exchange, symbol, UTC date) holding the running mean and
//! the number of observations behind it. Records are stored as JSON under
//! `daily:avg:{exchange}:{symbol}:{date}` and expire two days after their
//! last write.

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::exchange::Exchange;
use super::kv_store::KeyValueStore;
use crate::errors::PriceError;
use crate::utils::cache::CacheKey;

/// How long a record survives after its last write
pub const RETENTION: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Decimal places kept in the running mean
pub const AVERAGE_SCALE: i64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAverageRecord {
    pub symbol: String,
    pub provider: Exchange,
    pub average_price: BigDecimal,
    pub date: NaiveDate,
    pub sample_count: u32,
}

impl DailyAverageRecord {
    /// Record for the first observation of the day
    pub fn first(provider: Exchange, symbol: impl Into<String>, date: NaiveDate, price: &BigDecimal) -> Self {
        Self {
            symbol: symbol.into(),
            provider,
            average_price: price.with_scale_round(AVERAGE_SCALE, RoundingMode::HalfUp),
            date,
            sample_count: 1,
        }
    }

    /// Folds one more observation into the mean without the earlier samples:
    /// `(avg * n + price) / (n + 1)`, rounded half-up
    pub fn with_observation(&self, price: &BigDecimal) -> Self {
        let count = BigDecimal::from(self.sample_count);
        let total = &self.average_price * &count + price;
        let average = total / (count + BigDecimal::from(1));

        Self {
            symbol: self.symbol.clone(),
            provider: self.provider,
            average_price: average.with_scale_round(AVERAGE_SCALE, RoundingMode::HalfUp),
            date: self.date,
            sample_count: self.sample_count + 1,
        }
    }

    pub fn storage_key(&self) -> String {
        storage_key(self.provider, &self.symbol, self.date)
    }
}

pub fn storage_key(provider: Exchange, symbol: &str, date: NaiveDate) -> String {
    CacheKey::new("daily:avg")
        .with(provider)
        .with(symbol)
        .with(date.format("%Y-%m-%d"))
        .build()
}

/// Typed access to daily average records on top of a key-value backend
#[derive(Clone)]
pub struct DailyAverageStore {
    kv: Arc<dyn KeyValueStore>,
}

impl DailyAverageStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    pub async fn read(
        &self,
        provider: Exchange,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAverageRecord>, PriceError> {
        let key = storage_key(provider, symbol, date);

        match self.kv.get(&key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Writes the record and restarts its retention window
    pub async fn write(&self, record: &DailyAverageRecord) -> Result<(), PriceError> {
        let raw = serde_json::to_string(record)?;
        self.kv
            .set_with_expiry(&record.storage_key(), raw, RETENTION)
            .await
    }
}
