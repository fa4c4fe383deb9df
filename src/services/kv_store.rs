//! Expiring key-value storage behind the daily averages
//!
//! Two backends: PostgreSQL for durable storage and a moka cache for runs
//! without a database. Both treat an expired value exactly like a missing one.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::Expiry;
use moka::future::Cache;
use sqlx::PgPool;

use crate::errors::PriceError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name reported by the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Returns the stored value, or `None` if the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, PriceError>;

    /// Stores the value, replacing any previous one and resetting its expiry
    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), PriceError>;

    /// Reclaims expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64, PriceError> {
        Ok(0)
    }

    /// Checks that the backend is reachable
    async fn health_check(&self) -> Result<(), PriceError> {
        Ok(())
    }
}

/// PostgreSQL backed store using the `kv_store` table
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PriceError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value
            FROM kv_store
            WHERE key = $1 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), PriceError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PriceError::Internal(format!("invalid expiry {:?}: {}", ttl, e)))?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, PriceError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), PriceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct StoredValue {
    value: String,
    ttl: Duration,
}

/// Gives every entry its own time-to-live, restarted on each write
struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store; contents are lost on restart
///
/// Unbounded: entries leave only when they expire, never to make room.
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    cache: Cache<String, StoredValue>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        let cache = Cache::builder()
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache }
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PriceError> {
        Ok(self.cache.get(key).await.map(|stored| stored.value))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), PriceError> {
        self.cache
            .insert(key.to_string(), StoredValue { value, ttl })
            .await;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, PriceError> {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks().await;
        Ok(before.saturating_sub(self.cache.entry_count()))
    }
}
