use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::store::Store;
use crate::utils::{duration_ms, now_ms};

/// Configuration for HashMapStore.
#[derive(Debug, Clone, Default)]
pub struct HashMapStoreConfig {
    /// Upper bound on the number of entries.
    ///
    /// When a `set` pushes the map above this bound, expired entries are purged first,
    /// then the entries with a TTL closest to expiry. Entries without a TTL (logical
    /// envelopes), entries written by `set_if_absent` (locks) and the entry being
    /// written are never evicted, so the bound is soft. `None` disables the bound.
    pub max_items: Option<usize>,
}

/// Internal stored value with optional expiration time.
#[derive(Clone)]
struct StoredValue {
    value: String,
    /// Unix milli timestamp, `None` for entries that never expire.
    expires: Option<i64>,
    /// Written by `set_if_absent`; only expiry or `delete` may remove it.
    pinned: bool,
}

impl StoredValue {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        StoredValue {
            value,
            expires: ttl.map(|ttl| now_ms().saturating_add(duration_ms(ttl))),
            pinned: false,
        }
    }

    fn pinned(value: String, ttl: Duration) -> Self {
        StoredValue {
            pinned: true,
            ..Self::new(value, Some(ttl))
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }
}

/// Thread-safe in-memory store using HashMap with RwLock.
///
/// This is a simple store suitable for:
/// - Tests and local development
/// - Single-process deployments where the "shared" store only needs to be shared
///   between tasks
///
/// For high-concurrency scenarios, consider using `MokaStore` instead.
pub struct HashMapStore {
    state: RwLock<HashMap<String, StoredValue>>,
    max_items: Option<usize>,
}

impl HashMapStore {
    /// Create a new HashMapStore with the given configuration.
    pub fn new(config: HashMapStoreConfig) -> Self {
        HashMapStore {
            state: RwLock::new(HashMap::new()),
            max_items: config.max_items,
        }
    }

    /// Number of live entries (expired entries not yet purged are excluded).
    pub async fn len(&self) -> usize {
        let now = now_ms();
        let state = self.state.read().await;
        state.values().filter(|v| !v.is_expired(now)).count()
    }

    /// Returns `true` if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining TTL of a key, `None` if the key is missing or never expires.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = now_ms();
        let state = self.state.read().await;
        let stored = state.get(key).filter(|v| !v.is_expired(now))?;
        stored
            .expires
            .map(|expires| Duration::from_millis((expires - now).max(0) as u64))
    }

    /// Enforce `max_items`, sparing `written`, pinned entries and entries without a TTL.
    /// Must be called with the write lock held.
    fn evict(&self, state: &mut HashMap<String, StoredValue>, written: &str) {
        let Some(max_items) = self.max_items else {
            return;
        };

        if state.len() <= max_items {
            return;
        }

        let now = now_ms();
        // First delete all expired entries
        state.retain(|_, v| !v.is_expired(now));

        // If still over max_items, remove the evictable entries closest to expiry
        if state.len() > max_items {
            let mut entries: Vec<_> = state
                .iter()
                .filter(|(k, v)| k.as_str() != written && !v.pinned)
                .filter_map(|(k, v)| v.expires.map(|expires| (k.clone(), expires)))
                .collect();
            entries.sort_by_key(|(_, expires)| *expires);

            let to_remove = state.len() - max_items;
            for (key, _) in entries.into_iter().take(to_remove) {
                state.remove(&key);
            }
        }
    }
}

impl Default for HashMapStore {
    fn default() -> Self {
        Self::new(HashMapStoreConfig::default())
    }
}

#[async_trait]
impl Store for HashMapStore {
    fn name(&self) -> &'static str {
        "hashmap"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let state = self.state.read().await;

        let Some(stored) = state.get(key) else {
            return Ok(None);
        };

        if stored.is_expired(now_ms()) {
            // Entry is expired, remove it
            drop(state);
            let mut state = self.state.write().await;
            if state.get(key).is_some_and(|v| v.is_expired(now_ms())) {
                state.remove(key);
            }
            return Ok(None);
        }

        Ok(Some(stored.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.insert(key.to_string(), StoredValue::new(value, ttl));
        self.evict(&mut state, key);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut state = self.state.write().await;

        if state.get(key).is_some_and(|v| !v.is_expired(now_ms())) {
            return Ok(false);
        }

        // Pinned: eviction must never hand a held lock out twice
        state.insert(key.to_string(), StoredValue::pinned(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.remove(key);
        Ok(())
    }
}
