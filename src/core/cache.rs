use crate::core::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at) < self.ttl
    }
}

/// In-memory key/value store where every entry carries its own TTL.
///
/// Expired entries read as a miss and are overwritten by the next `put`.
pub struct Cache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.clock.now()) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
            ttl,
        };
        let mut entries = self.entries.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        entries.insert(key, entry);
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// successful result for `ttl`.
    ///
    /// Concurrent misses on the same key wait for the first fetch instead of
    /// issuing their own. Errors are returned as-is and never cached.
    pub async fn get_or_try_fetch<F, Fut, E>(
        &self,
        key: K,
        ttl: Duration,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        let _guard = gate.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = fetch().await?;
        self.put(key, value.clone(), ttl).await;
        Ok(value)
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
