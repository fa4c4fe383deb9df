//! Fetch-through price cache with single-flight coalescing
//!
//! A slot is either a fresh quote with an expiry instant or an in-flight
//! fetch that every concurrent caller awaits. The fetch itself runs in its own
//! task, so a caller that gives up waiting never cancels it for the others.
//! Failed fetches are handed to every waiter and then forgotten; only
//! successful quotes are cached.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, warn};
use tokio::time::Instant;

use super::exchange::Exchange;
use super::price_provider::PriceQuote;
use crate::errors::PriceError;
use crate::utils::cache::CacheKey;

/// Default freshness window for cached quotes
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(10);

/// Expiry used when `now + ttl` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Calling convention a quote was requested through
///
/// The two conventions never share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    Blocking,
    Reactive,
}

impl CallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMode::Blocking => "blocking",
            CallMode::Reactive => "reactive",
        }
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceCacheKey {
    pub exchange: Exchange,
    pub symbol: String,
    pub mode: CallMode,
}

impl PriceCacheKey {
    pub fn new(exchange: Exchange, symbol: impl Into<String>, mode: CallMode) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            mode,
        }
    }
}

impl fmt::Display for PriceCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = CacheKey::new(format!("{}-{}", self.exchange, self.mode))
            .with(&self.symbol)
            .build();
        f.write_str(&key)
    }
}

type FetchResult = Result<PriceQuote, PriceError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

enum Slot {
    Fresh {
        quote: PriceQuote,
        expires_at: Instant,
    },
    InFlight {
        generation: u64,
        fetch: SharedFetch,
    },
}

struct Inner {
    ttl: Duration,
    slots: Mutex<HashMap<PriceCacheKey, Slot>>,
    next_generation: AtomicU64,
}

impl Inner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<PriceCacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Price cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replaces the in-flight marker with the fetch outcome
    ///
    /// Only the fetch that owns the slot may publish into it.
    fn publish(&self, key: &PriceCacheKey, generation: u64, result: &FetchResult) {
        let mut slots = self.lock_slots();

        let owns_slot = matches!(
            slots.get(key),
            Some(Slot::InFlight { generation: current, .. }) if *current == generation
        );
        if !owns_slot {
            return;
        }

        match result {
            Ok(quote) => {
                debug!("Caching {} for {:?}", key, self.ttl);
                slots.insert(
                    key.clone(),
                    Slot::Fresh {
                        quote: quote.clone(),
                        expires_at: self.expiry_from_now(),
                    },
                );
            }
            Err(e) => {
                debug!("Fetch for {} failed, not caching: {}", key, e);
                slots.remove(key);
            }
        }
    }

    /// Drops the in-flight marker of a fetch task that died before publishing
    fn discard(&self, key: &PriceCacheKey, generation: u64) {
        let mut slots = self.lock_slots();

        if matches!(
            slots.get(key),
            Some(Slot::InFlight { generation: current, .. }) if *current == generation
        ) {
            slots.remove(key);
        }
    }

    fn expiry_from_now(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.ttl).unwrap_or_else(|| now + FAR_FUTURE)
    }
}

/// Shared handle to the price cache
#[derive(Clone)]
pub struct PriceCache {
    inner: Arc<Inner>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cached quote for `key`, or runs `fetch_fn` exactly once
    /// for all concurrent callers of the same key
    ///
    /// `fetch_fn` is only invoked by the caller that installs the in-flight
    /// marker. Everyone else, including callers arriving while the fetch is
    /// running, awaits the same outcome. No lock is held while awaiting.
    pub async fn get_or_fetch<F, Fut>(&self, key: PriceCacheKey, fetch_fn: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let fetch = {
            let mut slots = self.inner.lock_slots();

            match slots.get(&key) {
                Some(Slot::Fresh { quote, expires_at }) if *expires_at > Instant::now() => {
                    debug!("Cache hit for {}", key);
                    return Ok(quote.clone());
                }
                Some(Slot::InFlight { fetch, .. }) => {
                    debug!("Joining in-flight fetch for {}", key);
                    fetch.clone()
                }
                _ => {
                    debug!("Cache miss for {}", key);
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.spawn_fetch(key.clone(), generation, fetch_fn());
                    slots.insert(
                        key,
                        Slot::InFlight {
                            generation,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await
    }

    fn spawn_fetch<Fut>(&self, key: PriceCacheKey, generation: u64, fut: Fut) -> SharedFetch
    where
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let key = task_key;
            let result = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(PriceError::Internal(format!("price fetch for {} panicked", key)))
                });
            inner.publish(&key, generation, &result);
            result
        });

        let inner = self.inner.clone();
        async move {
            handle.await.unwrap_or_else(|e| {
                inner.discard(&key, generation);
                Err(PriceError::Internal(format!("price fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_TTL)
    }
}
