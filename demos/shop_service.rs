//! Shop lookup service backed by a slow fake database.
//!
//! Shows the three read strategies side by side, cache warm-up, and
//! update-then-invalidate. Run with:
//!
//! ```text
//! RUST_LOG=cache_shield=debug cargo run --example shop_service
//! ```

use cache_shield::{CacheClient, CacheError, HashMapStore, KeySpace, LoaderError, LogicalRead};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

const SHOP_PREFIX: &str = "cache:shop:";
const SHOP_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
    area: String,
}

/// Source of record with a noticeable query latency.
#[derive(Clone, Default)]
struct ShopDatabase {
    rows: Arc<RwLock<HashMap<u64, Shop>>>,
}

impl ShopDatabase {
    async fn seed(&self) {
        let mut rows = self.rows.write().await;
        for (id, name, area) in [
            (1, "103 Tea House", "Daguan"),
            (2, "Lucky Noodles", "Riverside"),
            (3, "Night Market Grill", "Old Town"),
        ] {
            rows.insert(
                id,
                Shop {
                    id,
                    name: name.into(),
                    area: area.into(),
                },
            );
        }
    }

    async fn find(&self, id: u64) -> Result<Option<Shop>, LoaderError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn rename(&self, id: u64, name: String) -> Result<(), LoaderError> {
        let mut rows = self.rows.write().await;
        let shop = rows.get_mut(&id).ok_or_else(|| format!("shop {} not found", id))?;
        shop.name = name;
        Ok(())
    }
}

struct ShopService {
    db: ShopDatabase,
    cache: CacheClient,
    keys: KeySpace,
}

impl ShopService {
    fn new(db: ShopDatabase, cache: CacheClient) -> Self {
        ShopService {
            db,
            cache,
            keys: KeySpace::new(SHOP_PREFIX, "lock:shop:"),
        }
    }

    /// Penetration-safe lookup.
    async fn shop(&self, id: u64) -> Result<Option<Shop>, CacheError> {
        let db = self.db.clone();
        self.cache
            .query_with_pass_through(SHOP_PREFIX, id, move |id| async move { db.find(id).await }, SHOP_TTL)
            .await
    }

    /// Lookup for hot shops where a stampede on expiry must be avoided.
    async fn hot_shop(&self, id: u64) -> Result<Option<Shop>, CacheError> {
        let db = self.db.clone();
        self.cache
            .query_with_mutex(&self.keys, id, move |id| async move { db.find(id).await }, SHOP_TTL)
            .await
    }

    /// Lookup for warmed shops that must never block on the database.
    async fn featured_shop(&self, id: u64, ttl: Duration) -> Result<LogicalRead<Shop>, CacheError> {
        let db = self.db.clone();
        self.cache
            .read_with_logical_expire(&self.keys, id, move |id| async move { db.find(id).await }, ttl)
            .await
    }

    async fn warm(&self, id: u64, ttl: Duration) -> Result<(), CacheError> {
        let db = self.db.clone();
        self.cache
            .warm_logical(SHOP_PREFIX, id, move |id| async move { db.find(id).await }, ttl)
            .await?;
        Ok(())
    }

    async fn rename(&self, id: Option<u64>, name: &str) -> Result<(), CacheError> {
        let db = self.db.clone();
        let name = name.to_string();
        self.cache
            .update_then_invalidate(SHOP_PREFIX, id, move |id| async move { db.rename(id, name).await })
            .await
    }
}

#[tokio::main]
async fn main() -> Result<(), CacheError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = ShopDatabase::default();
    db.seed().await;

    let cache = CacheClient::builder(Arc::new(HashMapStore::default()))
        .lock_retry_interval(Duration::from_millis(20))
        .build();
    let service = ShopService::new(db, cache.clone());

    // Pass-through: the second lookup of a missing shop never reaches the database
    for attempt in 1..=2 {
        let shop = service.shop(999).await?;
        tracing::info!(attempt, found = shop.is_some(), "looked up shop 999");
    }

    // Mutex: ten concurrent cold lookups, one database query
    let lookups = (0..10).map(|_| service.hot_shop(2));
    let results = futures::future::join_all(lookups).await;
    tracing::info!(
        ok = results.iter().filter(|r| r.is_ok()).count(),
        "concurrent lookups of shop 2 finished"
    );

    // Logical expiration: warm with a short TTL, then read past it
    let ttl = Duration::from_secs(1);
    service.warm(1, ttl).await?;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    match service.featured_shop(1, ttl).await? {
        LogicalRead::Stale {
            value,
            rebuild_scheduled,
        } => tracing::info!(?value, rebuild_scheduled, "served stale shop 1"),
        other => tracing::info!(?other, "shop 1 read"),
    }

    // Rename, invalidate and read again
    service.rename(Some(3), "Night Market Grill & Bar").await?;
    let renamed = service.shop(3).await?;
    tracing::info!(name = ?renamed.map(|s| s.name), "shop 3 after rename");

    if let Err(e) = service.rename(None, "nobody").await {
        tracing::warn!(error = %e, "rename without id rejected");
    }

    cache.shutdown().await;
    tracing::info!(stats = ?cache.scheduler().stats(), "rebuild scheduler drained");

    Ok(())
}
