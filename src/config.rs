use std::time::Duration;

/// Timing configuration for [`CacheClient`](crate::CacheClient).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL of the empty "confirmed absent" sentinel written on a loader miss.
    ///
    /// Keep this much shorter than value TTLs so newly created records become
    /// visible quickly.
    pub null_ttl: Duration,

    /// Safety-net TTL of lock entries. A crashed holder's lock disappears after this.
    pub lock_ttl: Duration,

    /// Pause between attempts when the mutex strategy finds the lock taken.
    pub lock_retry_interval: Duration,

    /// Total time the mutex strategy waits for a busy lock before giving up
    /// with `CacheError::LockTimeout`.
    pub lock_wait_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            null_ttl: Duration::from_secs(2 * 60),
            lock_ttl: Duration::from_secs(10),
            lock_retry_interval: Duration::from_millis(50),
            lock_wait_timeout: Duration::from_secs(10),
        }
    }
}
