//! Cache Contract
//!
//! The operation set every backend implements, so callers can hold an
//! `Arc<dyn Cache>` without knowing which store sits behind it.

use std::time::Duration;

use crate::cache::Value;
use crate::error::Result;

// == Cache Trait ==
/// A key/value cache with per-entry time-to-live.
///
/// All methods are synchronous: they return once their effect is committed
/// or rejected. A `ttl` of [`Duration::ZERO`] means the entry never expires.
///
/// Backends may differ in how `set` treats an existing key. The memory cache
/// overwrites; the Redis adapter only sets absent keys and reports
/// [`CacheError::KeyExists`](crate::error::CacheError::KeyExists) otherwise.
pub trait Cache: Send + Sync {
    /// Constant backend identifier.
    fn name(&self) -> &'static str;

    /// Current footprint: estimated bytes for the memory cache, key count for
    /// remote stores.
    fn size(&self) -> i64;

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Returns the live value for `key`, or None if absent or expired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Returns the live value for `key`, or `default`.
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Returns the cached value, or produces, stores and returns a new one.
    ///
    /// `producer` runs at most once and never under a cache lock, so it may
    /// use the cache itself. If storing fails the produced value is dropped
    /// and the error returned.
    fn remember(
        &self,
        key: &str,
        producer: &mut dyn FnMut() -> Value,
        ttl: Duration,
    ) -> Result<Value> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = producer();
        self.set(key, value.clone(), ttl)?;
        Ok(value)
    }

    /// [`Cache::remember`] for an entry that never expires.
    fn remember_forever(&self, key: &str, producer: &mut dyn FnMut() -> Value) -> Result<Value> {
        self.remember(key, producer, Duration::ZERO)
    }

    /// Removes `key`. Returns true whether or not the key existed.
    fn forget(&self, key: &str) -> bool;

    /// Removes every entry.
    fn flush(&self) -> bool;
}
