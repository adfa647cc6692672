use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CacheError;

/// Value written under a data key to record "looked up, does not exist".
///
/// JSON never encodes to an empty string, so the sentinel cannot collide with a value.
pub const NULL_SENTINEL: &str = "";

/// A logical-expiration envelope.
///
/// The store never expires an envelope on its own. Staleness is decided purely by
/// comparing `expire_at` with the wall clock at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalEntry<V> {
    /// The cached payload. `None` records that the source of record had no value
    /// at the time of the last rebuild.
    pub data: Option<V>,

    /// Unix timestamp in milliseconds.
    /// Before this time the entry is considered fresh.
    pub expire_at: i64,
}

impl<V> LogicalEntry<V> {
    /// Create a new envelope.
    pub fn new(data: Option<V>, expire_at: i64) -> Self {
        LogicalEntry { data, expire_at }
    }

    /// Check if the entry is logically expired.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expire_at
    }
}

impl<V: Serialize> LogicalEntry<V> {
    /// Serialize the envelope for storage.
    pub fn encode(&self) -> Result<String, CacheError> {
        serde_json::to_string(self)
            .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
    }
}

impl<V: DeserializeOwned> LogicalEntry<V> {
    /// Deserialize an envelope read from the store.
    pub fn decode(raw: &str) -> Result<Self, CacheError> {
        serde_json::from_str(raw)
            .map_err(|e| CacheError::Serialization(format!("Deserialization failed: {}", e)))
    }
}

/// A decoded plain cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PlainEntry<V> {
    /// The source of record has a value.
    Value(V),
    /// The empty sentinel: confirmed absent from the source of record.
    Null,
}

impl<V: DeserializeOwned> PlainEntry<V> {
    /// Decode a plain entry, recognizing the empty sentinel.
    pub fn decode(raw: &str) -> Result<Self, CacheError> {
        if raw == NULL_SENTINEL {
            return Ok(PlainEntry::Null);
        }
        serde_json::from_str(raw)
            .map(PlainEntry::Value)
            .map_err(|e| CacheError::Serialization(format!("Deserialization failed: {}", e)))
    }

    /// Convert to the caller-facing result.
    pub fn into_option(self) -> Option<V> {
        match self {
            PlainEntry::Value(v) => Some(v),
            PlainEntry::Null => None,
        }
    }
}

/// Serialize a plain value for storage.
pub fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<String, CacheError> {
    serde_json::to_string(value)
        .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
}
