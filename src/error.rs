/// Boxed error type returned by caller-supplied loaders.
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A store operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Operation {
        tier: String,
        key: String,
        message: String,
    },
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The loader failed or panicked while reading the source of record.
    #[error("loader failed for key '{key}': {message}")]
    Loader { key: String, message: String },
    /// The caller's update of the source of record failed; the cache was not touched.
    #[error("update failed for key '{key}': {message}")]
    Update { key: String, message: String },
    /// The mutex strategy gave up waiting for another caller's rebuild.
    #[error("timed out after {waited_ms}ms waiting for lock '{key}'")]
    LockTimeout { key: String, waited_ms: u64 },
    /// An update was requested without an identifier.
    #[error("identifier must not be empty")]
    MissingId,
    /// The rebuild scheduler has been shut down.
    #[error("rebuild scheduler is closed")]
    SchedulerClosed,
    /// The rebuild scheduler queue is full.
    #[error("rebuild queue is full, rejected task for key '{0}'")]
    SchedulerFull(String),
}

impl CacheError {
    /// Create a new operation error.
    pub fn operation(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Operation {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new loader error.
    pub fn loader(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Loader {
            key: key.into(),
            message: message.into(),
        }
    }
}
