//! Shared utilities for the cache library.

use std::fmt::Display;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Build a store key from a prefix and an identifier.
///
/// Format: `{prefix}{id}`, e.g. `cache:shop:` + `1` -> `cache:shop:1`.
pub fn build_key<I: Display + ?Sized>(prefix: &str, id: &I) -> String {
    format!("{}{}", prefix, id)
}

/// Get the current time in milliseconds since UNIX epoch.
///
/// A clock set before the epoch reads as `0`.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
