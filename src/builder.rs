//! Builder API for creating cache clients.

use std::sync::Arc;
use std::time::Duration;

use crate::client::CacheClient;
use crate::config::CacheConfig;
use crate::scheduler::{RebuildScheduler, RebuildSchedulerConfig};
use crate::store::Store;

/// Builder for [`CacheClient`].
///
/// The rebuild scheduler is either injected (so several clients can share one pool)
/// or started by [`build`](Self::build) from a [`RebuildSchedulerConfig`].
///
/// # Example
///
/// ```ignore
/// use cache_shield::{CacheClient, HashMapStore, RebuildSchedulerConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(HashMapStore::default());
/// let client = CacheClient::builder(store)
///     .null_ttl(Duration::from_secs(60))
///     .scheduler_config(RebuildSchedulerConfig { workers: 4, queue_capacity: 256 })
///     .build();
/// ```
pub struct CacheClientBuilder {
    store: Arc<dyn Store>,
    config: CacheConfig,
    scheduler: Option<Arc<RebuildScheduler>>,
    scheduler_config: RebuildSchedulerConfig,
}

impl CacheClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new(store: Arc<dyn Store>) -> Self {
        CacheClientBuilder {
            store,
            config: CacheConfig::default(),
            scheduler: None,
            scheduler_config: RebuildSchedulerConfig::default(),
        }
    }

    /// Replace the whole timing configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn null_ttl(mut self, ttl: Duration) -> Self {
        self.config.null_ttl = ttl;
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.config.lock_ttl = ttl;
        self
    }

    pub fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.config.lock_retry_interval = interval;
        self
    }

    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_wait_timeout = timeout;
        self
    }

    /// Use an already running scheduler. Takes precedence over `scheduler_config`.
    pub fn scheduler(mut self, scheduler: Arc<RebuildScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Configuration for the scheduler started by `build` when none was injected.
    pub fn scheduler_config(mut self, config: RebuildSchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Build the client.
    ///
    /// # Panics
    /// Panics if no scheduler was injected and this is called outside a tokio runtime.
    pub fn build(self) -> CacheClient {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(RebuildScheduler::start(self.scheduler_config)));

        CacheClient::from_parts(self.store, scheduler, self.config)
    }
}
