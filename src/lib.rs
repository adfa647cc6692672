//! cache-shield - A read-through cache client for Rust
//!
//! This library sits in front of a slow source of record and a shared key-value store
//! (Redis, Moka or an in-process map) and provides:
//! - Pass-through reads that cache "not found" to stop cache penetration
//! - Mutex-gated rebuilds so a hot key expiring does not stampede the source
//! - Logical expiration with background rebuilds (stale-while-revalidate)
//! - A TTL-bounded distributed lock and a bounded rebuild worker pool
//!
//! # Example
//!
//! ```ignore
//! use cache_shield::{CacheClient, HashMapStore, KeySpace};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cache_shield::CacheError> {
//!     let client = CacheClient::builder(Arc::new(HashMapStore::default())).build();
//!     let shops = KeySpace::new("cache:shop:", "lock:shop:");
//!
//!     // Penetration-safe read
//!     let shop: Option<String> = client
//!         .query_with_pass_through("cache:shop:", 1, |id| async move {
//!             Ok(Some(format!("shop {}", id)))
//!         }, Duration::from_secs(30 * 60))
//!         .await?;
//!
//!     // Warm, then serve stale-while-revalidate
//!     client.set_with_logical_expire("cache:shop:2", &"Tea House", Duration::from_secs(10)).await?;
//!     let shop: Option<String> = client
//!         .query_with_logical_expire(&shops, 2, |id| async move {
//!             Ok(Some(format!("shop {}", id)))
//!         }, Duration::from_secs(10))
//!         .await?;
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

mod builder;
mod client;
mod config;
mod entry;
mod error;
mod keys;
mod lock;
mod scheduler;
mod store;
pub mod stores;
mod utils;

// Re-export public API
pub use builder::CacheClientBuilder;
pub use client::{CacheClient, LogicalRead};
pub use config::CacheConfig;
pub use entry::{LogicalEntry, NULL_SENTINEL, PlainEntry};
pub use error::{CacheError, LoaderError};
pub use keys::KeySpace;
pub use lock::{DistributedLock, LockGuard};
pub use scheduler::{RebuildScheduler, RebuildSchedulerConfig, RebuildStats};
pub use store::Store;
pub use stores::memory::{HashMapStore, HashMapStoreConfig};
pub use stores::metrics::{CacheMetric, MetricsSink, MetricsStore, ReadOutcome};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use stores::redis::{RedisStore, RedisStoreConfig};
