use futures::FutureExt;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::builder::CacheClientBuilder;
use crate::config::CacheConfig;
use crate::entry::{LogicalEntry, NULL_SENTINEL, PlainEntry, encode_value};
use crate::error::{CacheError, LoaderError};
use crate::keys::KeySpace;
use crate::lock::{DistributedLock, LockGuard};
use crate::scheduler::RebuildScheduler;
use crate::store::Store;
use crate::utils::{build_key, duration_ms, now_ms};

/// Result of a logical-expiration read.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalRead<V> {
    /// No envelope under the key. The cache is expected to be warmed beforehand.
    Miss,
    /// The envelope has not expired yet.
    Fresh(Option<V>),
    /// The envelope has expired. The stale payload is returned as-is.
    Stale {
        value: Option<V>,
        /// `true` if this read won the lock and queued the rebuild.
        rebuild_scheduled: bool,
    },
}

impl<V> LogicalRead<V> {
    /// The payload, stale or not.
    pub fn into_value(self) -> Option<V> {
        match self {
            LogicalRead::Miss => None,
            LogicalRead::Fresh(value) => value,
            LogicalRead::Stale { value, .. } => value,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LogicalRead::Stale { .. })
    }
}

/// Read-through cache client in front of a slow source of record.
///
/// All three read strategies take a caller-supplied loader that performs a point
/// lookup in the source of record:
///
/// - [`query_with_pass_through`](Self::query_with_pass_through) caches misses as an
///   empty sentinel so lookups of nonexistent ids stop reaching the source.
/// - [`query_with_mutex`](Self::query_with_mutex) lets one caller per key rebuild a
///   missing entry while the others wait and re-read.
/// - [`query_with_logical_expire`](Self::query_with_logical_expire) never blocks:
///   expired entries are served stale while a background worker rebuilds them.
///
/// `CacheClient` is cheap to clone; clones share the store, lock and scheduler.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn Store>,
    lock: DistributedLock,
    scheduler: Arc<RebuildScheduler>,
    config: CacheConfig,
}

impl CacheClient {
    pub(crate) fn from_parts(
        store: Arc<dyn Store>,
        scheduler: Arc<RebuildScheduler>,
        config: CacheConfig,
    ) -> Self {
        let lock = DistributedLock::new(store.clone(), config.lock_ttl);
        CacheClient {
            store,
            lock,
            scheduler,
            config,
        }
    }

    /// Start building a client on top of `store`.
    pub fn builder(store: Arc<dyn Store>) -> CacheClientBuilder {
        CacheClientBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<RebuildScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Serialize `value` and store it with a store-level TTL.
    pub async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), CacheError>
    where
        V: Serialize + ?Sized,
    {
        let raw = encode_value(value)?;
        self.store.set(key, raw, Some(ttl)).await
    }

    /// Wrap `value` in an envelope expiring logically at `now + ttl` and store it
    /// without a store-level TTL.
    pub async fn set_with_logical_expire<V>(
        &self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        let raw = LogicalEntry::new(Some(value), expire_at(ttl)).encode()?;
        self.store.set(key, raw, None).await
    }

    /// Remove a key. Used to invalidate an entry after its record changed.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.delete(key).await
    }

    /// Cache-aside read that also caches "does not exist".
    ///
    /// - A cached value is returned without calling `loader`.
    /// - A cached empty sentinel returns `Ok(None)` without calling `loader`.
    /// - Otherwise `loader(id)` runs; its value is cached for `ttl`, or the sentinel is
    ///   cached for `CacheConfig::null_ttl` if it returned `None`.
    ///
    /// No lock is taken: concurrent misses on the same key may all call `loader`.
    ///
    /// # Example
    /// ```ignore
    /// let shop: Option<Shop> = client
    ///     .query_with_pass_through("cache:shop:", 1, |id| async move { db.shop(id).await }, ttl)
    ///     .await?;
    /// ```
    pub async fn query_with_pass_through<V, I, F, Fut>(
        &self,
        prefix: &str,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<V>, CacheError>
    where
        V: Serialize + DeserializeOwned,
        I: Display,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<Option<V>, LoaderError>>,
    {
        let key = build_key(prefix, &id);

        if let Some(cached) = self.read_plain(&key).await? {
            return Ok(cached);
        }

        let loaded = load(&key, id, loader).await?;
        self.write_plain(&key, loaded.as_ref(), ttl).await?;
        Ok(loaded)
    }

    /// Cache-aside read where only the lock holder rebuilds a missing entry.
    ///
    /// Callers that find the lock taken sleep for `CacheConfig::lock_retry_interval`
    /// and start over, until the entry appears, they win the lock, or
    /// `CacheConfig::lock_wait_timeout` has passed (`CacheError::LockTimeout`).
    ///
    /// The lock is released on every exit path once acquired, including loader
    /// errors, panics and the returned future being dropped mid-rebuild. Loader
    /// failures are returned as `CacheError::Loader`.
    pub async fn query_with_mutex<V, I, F, Fut>(
        &self,
        keys: &KeySpace,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<V>, CacheError>
    where
        V: Serialize + DeserializeOwned,
        I: Display,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<Option<V>, LoaderError>>,
    {
        let key = keys.data_key(&id);
        let lock_key = keys.lock_key(&id);
        let started = Instant::now();

        let guard = loop {
            if let Some(cached) = self.read_plain(&key).await? {
                return Ok(cached);
            }

            if let Some(guard) = self.lock.try_lock(&lock_key).await? {
                break guard;
            }

            let waited = started.elapsed();
            if waited >= self.config.lock_wait_timeout {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    key = %key,
                    lock = %lock_key,
                    waited_ms,
                    "gave up waiting for cache rebuild"
                );
                return Err(CacheError::LockTimeout {
                    key: lock_key,
                    waited_ms,
                });
            }

            tokio::time::sleep(self.config.lock_retry_interval).await;
        };

        // A cancelled caller drops `guard`, which releases the lock
        let result = self.rebuild_plain(&key, id, loader, ttl).await;
        let released = guard.release().await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::warn!(lock = %lock_key, error = %release_err, "failed to release lock");
                Err(e)
            }
        }
    }

    /// Stale-while-revalidate read over logical-expiration envelopes.
    ///
    /// Never calls `loader` on the caller's task and never waits for a rebuild.
    /// Returns `None` if the key was never warmed.
    pub async fn query_with_logical_expire<V, I, F, Fut>(
        &self,
        keys: &KeySpace,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<V>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        I: Display + Send + 'static,
        F: FnOnce(I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>, LoaderError>> + Send + 'static,
    {
        self.read_with_logical_expire(keys, id, loader, ttl)
            .await
            .map(LogicalRead::into_value)
    }

    /// Like [`query_with_logical_expire`](Self::query_with_logical_expire) but reports
    /// whether the entry was stale and whether this read queued the rebuild.
    ///
    /// On an expired entry the caller that wins the lock submits a rebuild to the
    /// [`RebuildScheduler`]; the rebuild calls `loader(id)`, writes a new envelope
    /// expiring at `now + ttl` and releases the lock. A failed rebuild leaves the old
    /// envelope untouched so the next stale read retries it.
    pub async fn read_with_logical_expire<V, I, F, Fut>(
        &self,
        keys: &KeySpace,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<LogicalRead<V>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        I: Display + Send + 'static,
        F: FnOnce(I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>, LoaderError>> + Send + 'static,
    {
        let key = keys.data_key(&id);

        let raw = match self.store.get(&key).await? {
            Some(raw) if raw != NULL_SENTINEL => raw,
            _ => return Ok(LogicalRead::Miss),
        };

        let entry: LogicalEntry<V> = LogicalEntry::decode(&raw)?;
        if !entry.is_expired(now_ms()) {
            return Ok(LogicalRead::Fresh(entry.data));
        }

        let lock_key = keys.lock_key(&id);
        let Some(guard) = self.lock.try_lock(&lock_key).await? else {
            // Someone else is rebuilding
            return Ok(LogicalRead::Stale {
                value: entry.data,
                rebuild_scheduled: false,
            });
        };

        // The guard is handed over only once the rebuild is queued
        let (handover, guard_rx) = oneshot::channel();
        let rebuild = rebuild_logical(self.store.clone(), key.clone(), guard_rx, id, loader, ttl);

        let rebuild_scheduled = match self.scheduler.submit(key.clone(), rebuild).await {
            Ok(()) => {
                tracing::debug!(key = %key, "cache rebuild queued");
                // A failed handover drops the guard, which releases the lock
                let _ = handover.send(guard);
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "could not queue cache rebuild");
                guard.release().await?;
                false
            }
        };

        Ok(LogicalRead::Stale {
            value: entry.data,
            rebuild_scheduled,
        })
    }

    /// Load `id` and write a logical-expiration envelope for it, on the caller's task.
    ///
    /// Used to warm keys before they are served with
    /// [`query_with_logical_expire`](Self::query_with_logical_expire).
    pub async fn warm_logical<V, I, F, Fut>(
        &self,
        prefix: &str,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<V>, CacheError>
    where
        V: Serialize,
        I: Display,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<Option<V>, LoaderError>>,
    {
        let key = build_key(prefix, &id);
        let loaded = load(&key, id, loader).await?;

        let raw = LogicalEntry::new(loaded.as_ref(), expire_at(ttl)).encode()?;
        self.store.set(&key, raw, None).await?;
        tracing::debug!(key = %key, found = loaded.is_some(), "logical entry warmed");

        Ok(loaded)
    }

    /// Run `update` against the source of record, then invalidate `{prefix}{id}`.
    ///
    /// Returns `CacheError::MissingId` without calling `update` or touching the cache
    /// if `id` is `None`. If `update` fails the cache entry is left alone.
    pub async fn update_then_invalidate<I, T, F, Fut>(
        &self,
        prefix: &str,
        id: Option<I>,
        update: F,
    ) -> Result<T, CacheError>
    where
        I: Display,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<T, LoaderError>>,
    {
        let Some(id) = id else {
            return Err(CacheError::MissingId);
        };

        let key = build_key(prefix, &id);
        let committed = update(id).await.map_err(|e| CacheError::Update {
            key: key.clone(),
            message: e.to_string(),
        })?;

        self.store.delete(&key).await?;
        tracing::debug!(key = %key, "cache entry invalidated after update");

        Ok(committed)
    }

    /// Stop the rebuild scheduler, waiting for queued rebuilds to finish.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// Read a plain entry. `Some(None)` is a cached sentinel, `None` a miss.
    async fn read_plain<V>(&self, key: &str) -> Result<Option<Option<V>>, CacheError>
    where
        V: DeserializeOwned,
    {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        let entry = PlainEntry::decode(&raw)?;
        if matches!(entry, PlainEntry::Null) {
            tracing::trace!(key = %key, "null sentinel hit");
        }
        Ok(Some(entry.into_option()))
    }

    /// Write a loaded value, or the sentinel if there was none.
    async fn write_plain<V>(
        &self,
        key: &str,
        value: Option<&V>,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        match value {
            Some(value) => self.set(key, value, ttl).await,
            None => {
                tracing::debug!(key = %key, "caching null sentinel");
                self.store
                    .set(key, NULL_SENTINEL.to_string(), Some(self.config.null_ttl))
                    .await
            }
        }
    }

    /// Rebuild a plain entry while holding its lock.
    async fn rebuild_plain<V, I, F, Fut>(
        &self,
        key: &str,
        id: I,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<V>, CacheError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<Option<V>, LoaderError>>,
    {
        // The previous holder may have filled the entry between our miss and our lock
        if let Some(cached) = self.read_plain(key).await? {
            return Ok(cached);
        }

        let loaded = load(key, id, loader).await?;
        self.write_plain(key, loaded.as_ref(), ttl).await?;
        Ok(loaded)
    }
}

/// Logical expiration timestamp for an entry written now.
fn expire_at(ttl: Duration) -> i64 {
    now_ms().saturating_add(duration_ms(ttl))
}

/// Call the loader, turning errors and panics into `CacheError::Loader`.
async fn load<V, I, F, Fut>(key: &str, id: I, loader: F) -> Result<Option<V>, CacheError>
where
    F: FnOnce(I) -> Fut,
    Fut: Future<Output = Result<Option<V>, LoaderError>>,
{
    match AssertUnwindSafe(async move { loader(id).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CacheError::loader(key, e.to_string())),
        Err(panic) => Err(CacheError::loader(key, panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("loader panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("loader panicked: {}", message)
    } else {
        "loader panicked".to_string()
    }
}

/// Background rebuild of a logical-expiration entry. Always releases the lock it is handed.
async fn rebuild_logical<V, I, F, Fut>(
    store: Arc<dyn Store>,
    key: String,
    guard: oneshot::Receiver<LockGuard>,
    id: I,
    loader: F,
    ttl: Duration,
) -> Result<(), CacheError>
where
    V: Serialize,
    F: FnOnce(I) -> Fut,
    Fut: Future<Output = Result<Option<V>, LoaderError>>,
{
    let Ok(guard) = guard.await else {
        tracing::debug!(key = %key, "rebuild skipped, lock was not handed over");
        return Ok(());
    };

    // A panic below drops `guard`, which releases the lock
    let rebuilt = async {
        let loaded = load(&key, id, loader).await?;
        let raw = LogicalEntry::new(loaded, expire_at(ttl)).encode()?;
        store.set(&key, raw, None).await
    }
    .await;

    let lock_key = guard.key().to_string();
    let released = guard.release().await;
    if let Err(e) = &released {
        tracing::warn!(lock = %lock_key, error = %e, "failed to release rebuild lock");
    }

    rebuilt?;
    released
}
