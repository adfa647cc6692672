use cache_shield::LoaderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Record served by the fake database
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchShop {
    pub id: u64,
    pub name: String,
    pub area: String,
    pub score: u32,
}

impl BenchShop {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("Shop {}", id),
            area: format!("Area {}", id % 17),
            score: (id % 50) as u32,
        }
    }
}

/// Simulated database with configurable latency
#[derive(Clone)]
pub struct FakeDatabase {
    data: Arc<HashMap<u64, BenchShop>>,
    latency_ms: u64,
    query_count: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new(num_shops: usize, latency_ms: u64) -> Self {
        let data = (0..num_shops as u64)
            .map(|id| (id, BenchShop::new(id)))
            .collect();

        Self {
            data: Arc::new(data),
            latency_ms,
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Point lookup, shaped like a cache loader.
    pub async fn get(&self, id: u64) -> Result<Option<BenchShop>, LoaderError> {
        self.query_count.fetch_add(1, Ordering::Relaxed);

        // Simulate database latency
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        Ok(self.data.get(&id).cloned())
    }

    #[allow(dead_code)]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    #[allow(dead_code)]
    pub fn reset_count(&self) {
        self.query_count.store(0, Ordering::Relaxed);
    }
}

/// Generate shop ids for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Every existing id once
    pub fn sequential(&self) -> Vec<u64> {
        (0..self.num_keys as u64).collect()
    }

    /// Ids with a Zipf-like skew (80% of requests go to 20% of ids)
    #[allow(dead_code)]
    pub fn zipf_random(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let hot = (self.num_keys / 5).max(1);

        (0..count)
            .map(|_| {
                let id = if rng.gen_bool(0.8) {
                    rng.gen_range(0..hot)
                } else {
                    rng.gen_range(hot..self.num_keys.max(hot + 1))
                };
                id as u64
            })
            .collect()
    }

    /// Ids where `missing_ratio` of requests ask for records that do not exist
    pub fn with_missing(&self, count: usize, missing_ratio: f64) -> Vec<u64> {
        let mut rng = rand::thread_rng();

        (0..count)
            .map(|_| {
                if rng.gen_bool(missing_ratio) {
                    rng.gen_range(self.num_keys..self.num_keys * 2) as u64
                } else {
                    rng.gen_range(0..self.num_keys) as u64
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_database() {
        use super::FakeDatabase;

        let db = FakeDatabase::new(100, 1);

        let shop = db.get(0).await.unwrap();
        assert_eq!(shop.unwrap().id, 0);
        assert!(db.get(100).await.unwrap().is_none());

        assert_eq!(db.query_count(), 2);
    }

    #[test]
    fn test_key_generator() {
        use super::KeyGenerator;

        let key_gen = KeyGenerator::new(100);

        let seq = key_gen.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], 0);

        let zipf = key_gen.zipf_random(100);
        assert_eq!(zipf.len(), 100);
        assert!(zipf.iter().all(|id| *id < 100));

        let missing = key_gen.with_missing(200, 1.0);
        assert!(missing.iter().all(|id| *id >= 100));
    }
}
