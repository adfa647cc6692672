use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::store::Store;

/// Marker value written under a lock key. Its content carries no meaning.
const LOCK_MARKER: &str = "1";

/// A best-effort, TTL-bounded lock on top of a shared [`Store`].
///
/// Acquisition is a single atomic "set if absent"; release is an unconditional delete.
/// There is no ownership token, reentrancy or queueing. If a holder dies, the lock
/// expires after `ttl` and the next caller can acquire it. A caller that acquires after
/// expiry while the previous holder is still working will run concurrently with it;
/// exclusion is advisory between cooperating clients only.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl DistributedLock {
    /// Create a lock backed by `store` whose entries expire after `ttl`.
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        DistributedLock { store, ttl }
    }

    /// The safety-net TTL applied to lock entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock. Never blocks.
    ///
    /// Returns `true` iff this call created the lock entry.
    pub async fn try_acquire(&self, key: &str) -> Result<bool, CacheError> {
        let acquired = self
            .store
            .set_if_absent(key, LOCK_MARKER.to_string(), self.ttl)
            .await?;

        if acquired {
            let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(lock = key, ttl_ms, "lock acquired");
        } else {
            tracing::trace!(lock = key, "lock busy");
        }

        Ok(acquired)
    }

    /// Try to take the lock, returning a guard that releases it.
    pub async fn try_lock(&self, key: &str) -> Result<Option<LockGuard>, CacheError> {
        if !self.try_acquire(key).await? {
            return Ok(None);
        }

        Ok(Some(LockGuard {
            lock: self.clone(),
            key: key.to_string(),
            armed: true,
        }))
    }

    /// Release the lock, whoever holds it.
    pub async fn release(&self, key: &str) -> Result<(), CacheError> {
        self.store.delete(key).await?;
        tracing::debug!(lock = key, "lock released");
        Ok(())
    }
}

/// A held lock.
///
/// Call [`release`](Self::release) on the normal path. A guard dropped without it
/// (cancelled caller, panic) spawns the release on the current tokio runtime; outside
/// a runtime the entry is left to expire after its TTL.
pub struct LockGuard {
    lock: DistributedLock,
    key: String,
    armed: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock now.
    pub async fn release(mut self) -> Result<(), CacheError> {
        let released = self.lock.release(&self.key).await;
        self.armed = false;
        released
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let lock = self.lock.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(lock = %key, "releasing abandoned lock");
                handle.spawn(async move {
                    if let Err(e) = lock.release(&key).await {
                        tracing::warn!(lock = %key, error = %e, "failed to release abandoned lock");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(lock = %key, "abandoned lock left to expire, no runtime");
            }
        }
    }
}
