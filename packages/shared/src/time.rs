//! Time-related utilities with clock abstraction for testability.
//!
//! Chat timestamps are Unix seconds in UTC, assigned by the relay when it
//! receives a message.

use chrono::{TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (seconds)
    fn now_unix_secs(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        get_unix_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_secs: i64) -> Self {
        Self {
            fixed_time: fixed_time_secs,
        }
    }
}

impl Clock for FixedClock {
    fn now_unix_secs(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp (seconds)
pub fn get_unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert a Unix timestamp (seconds) to RFC 3339 in UTC.
///
/// Out-of-range timestamps fall back to the epoch rather than panicking.
pub fn timestamp_to_rfc3339(timestamp_secs: i64) -> String {
    Utc.timestamp_opt(timestamp_secs, 0)
        .single()
        .unwrap_or_default()
        .to_rfc3339()
}
