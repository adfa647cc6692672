use std::fmt::Display;

use crate::utils::build_key;

/// The pair of key prefixes used for one entity type.
///
/// Data entries live under `{data_prefix}{id}` and lock entries under
/// `{lock_prefix}{id}`, so a lock never shadows a data entry for the same id.
///
/// # Example
/// ```
/// use cache_shield::KeySpace;
///
/// let shops = KeySpace::new("cache:shop:", "lock:shop:");
/// assert_eq!(shops.data_key(&1), "cache:shop:1");
/// assert_eq!(shops.lock_key(&1), "lock:shop:1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    data_prefix: String,
    lock_prefix: String,
}

impl KeySpace {
    /// Create a key space from a data prefix and a lock prefix.
    ///
    /// # Panics
    /// Panics if the two prefixes are equal.
    pub fn new(data_prefix: impl Into<String>, lock_prefix: impl Into<String>) -> Self {
        let data_prefix = data_prefix.into();
        let lock_prefix = lock_prefix.into();
        assert_ne!(
            data_prefix, lock_prefix,
            "data and lock prefixes must differ"
        );
        KeySpace {
            data_prefix,
            lock_prefix,
        }
    }

    /// Key space using `lock:` prepended to the data prefix for locks.
    pub fn with_default_lock_prefix(data_prefix: impl Into<String>) -> Self {
        let data_prefix = data_prefix.into();
        let lock_prefix = format!("lock:{}", data_prefix);
        Self::new(data_prefix, lock_prefix)
    }

    pub fn data_prefix(&self) -> &str {
        &self.data_prefix
    }

    pub fn lock_prefix(&self) -> &str {
        &self.lock_prefix
    }

    /// Store key of the data entry for `id`.
    pub fn data_key<I: Display + ?Sized>(&self, id: &I) -> String {
        build_key(&self.data_prefix, id)
    }

    /// Store key of the lock entry for `id`.
    pub fn lock_key<I: Display + ?Sized>(&self, id: &I) -> String {
        build_key(&self.lock_prefix, id)
    }
}
