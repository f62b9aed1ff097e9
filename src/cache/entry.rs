//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::mem::size_of;
use std::time::Duration;

use crate::cache::Value;

/// Fixed per-entry bookkeeping charged on top of key and value.
pub const ENTRY_OVERHEAD: i64 = size_of::<Entry>() as i64;

// == Cache Entry ==
/// A stored value with its expiration and estimated footprint.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix microseconds), 0 = never expires
    pub expire_at: i64,
    /// Estimated bytes charged against the budget, 0 when unbounded
    pub size: i64,
}

impl Entry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now. A zero `ttl` never expires.
    pub fn new(value: Value, ttl: Duration, size: i64) -> Self {
        Self {
            value,
            expire_at: expire_at(ttl),
            size,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now_us`.
    ///
    /// An entry is expired once the clock is strictly past its expiration
    /// timestamp. Entries with `expire_at == 0` never expire.
    pub fn is_expired_at(&self, now_us: i64) -> bool {
        self.expire_at != 0 && now_us > self.expire_at
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in microseconds.
pub fn current_timestamp_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn expire_at(ttl: Duration) -> i64 {
    if ttl.is_zero() {
        return 0;
    }
    let ttl_us = i64::try_from(ttl.as_micros()).unwrap_or(i64::MAX);
    current_timestamp_us().saturating_add(ttl_us)
}
