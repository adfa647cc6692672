//! Metrics middleware for cache stores.
//!
//! This module provides a `MetricsStore` wrapper that emits metrics for all
//! store operations (reads, writes, lock acquisitions, deletes) to a user-provided sink.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cache_shield::{CacheClient, MokaStore, MokaStoreConfig, Store};
//! use cache_shield::{CacheMetric, MetricsSink, MetricsStore};
//!
//! let sink = Arc::new(MyMetricsSink::new());
//!
//! let moka = Arc::new(MokaStore::new(MokaStoreConfig::default()));
//! let store: Arc<dyn Store> = Arc::new(MetricsStore::new(moka, sink.clone()));
//!
//! let client = CacheClient::builder(store).build();
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::entry::NULL_SENTINEL;
use crate::error::CacheError;
use crate::store::Store;

/// What a read found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The key was missing or expired.
    Miss,
    /// The key held a value.
    Hit,
    /// The key held the empty "confirmed absent" sentinel.
    NullHit,
}

/// Metrics emitted by the MetricsStore wrapper.
#[derive(Debug, Clone)]
pub enum CacheMetric {
    /// Emitted on every read (get) operation.
    Read {
        /// The key that was read.
        key: String,
        /// What the read found. Failed reads report `Miss`.
        outcome: ReadOutcome,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every write (set) operation.
    Write {
        /// The key that was written.
        key: String,
        /// Store-level TTL, `None` for entries that never expire.
        ttl: Option<Duration>,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every conditional write (set_if_absent) operation.
    Acquire {
        /// The key that was conditionally written.
        key: String,
        /// Whether this call created the entry.
        acquired: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every delete operation.
    Delete {
        /// The key that was deleted.
        key: String,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
}

/// Trait for receiving cache metrics.
///
/// Implement this trait to collect metrics from `MetricsStore`.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    ///
    /// This is called synchronously in the hot path of store operations.
    /// Implementations should be fast (e.g., buffer metrics in memory).
    fn emit(&self, metric: CacheMetric);

    /// Flush any buffered metrics.
    ///
    /// This is typically called at shutdown or at periodic intervals.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A store wrapper that emits metrics for all operations.
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

impl MetricsStore {
    /// Create a new MetricsStore wrapping the given store.
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        let tier_name = inner.name().to_string();
        MetricsStore {
            inner,
            sink,
            tier_name,
        }
    }

    /// Get a reference to the metrics sink.
    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }
}

#[async_trait]
impl Store for MetricsStore {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let latency_ms = Self::elapsed_ms(start);

        let outcome = match &result {
            Ok(Some(value)) if value == NULL_SENTINEL => ReadOutcome::NullHit,
            Ok(Some(_)) => ReadOutcome::Hit,
            Ok(None) | Err(_) => ReadOutcome::Miss,
        };

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            outcome,
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.set(key, value, ttl).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Write {
            key: key.to_string(),
            ttl,
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let start = Instant::now();
        let result = self.inner.set_if_absent(key, value, ttl).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Acquire {
            key: key.to_string(),
            acquired: matches!(result, Ok(true)),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.delete(key).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Delete {
            key: key.to_string(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }
}
