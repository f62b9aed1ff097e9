//! Memory Cache Module
//!
//! In-process cache engine: a string-keyed entry table guarded by a single
//! reader/writer lock, an approximate memory budget and TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::entry::{current_timestamp_us, Entry, ENTRY_OVERHEAD};
use crate::cache::size::SizeEstimator;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::{Cache, Value};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper;

/// Interval between background sweeps unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// == Entry Table ==
/// Entries plus the running sum of their sizes.
///
/// Both fields only change together, under the cache's write lock.
#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Entry>,
    allocated: i64,
}

impl Table {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.allocated -= entry.size;
        Some(entry)
    }

    /// Removes `key` only if it is still expired at `now_us`. A live entry
    /// written since the expiry was observed is left alone.
    fn remove_if_expired(&mut self, key: &str, now_us: i64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now_us) => {
                self.remove(key);
                true
            }
            _ => false,
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.allocated = 0;
    }
}

// == Memory Cache ==
/// In-process [`Cache`] with an optional memory budget.
///
/// A budget of zero or less disables size estimation entirely and every
/// entry is charged 0 bytes. Expired entries are dropped lazily by `get` and
/// eagerly by a background sweeper bound to the cache's lifecycle token.
#[derive(Debug)]
pub struct MemoryCache {
    table: RwLock<Table>,
    budget: i64,
    stats: StatsRecorder,
    lifecycle: CancellationToken,
}

impl MemoryCache {
    // == Constructors ==
    /// Creates a cache and spawns its sweeper with [`DEFAULT_SWEEP_INTERVAL`].
    ///
    /// The sweeper stops when `scope` is cancelled or the cache is dropped.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new(scope: &CancellationToken, budget: i64) -> Arc<Self> {
        Self::with_sweep_interval(scope, budget, DEFAULT_SWEEP_INTERVAL)
    }

    /// Same as [`MemoryCache::new`] with a custom sweep interval.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn with_sweep_interval(
        scope: &CancellationToken,
        budget: i64,
        interval: Duration,
    ) -> Arc<Self> {
        let cache = Arc::new(Self::build(scope.child_token(), budget));
        spawn_sweeper(&cache, interval);
        cache
    }

    /// Creates a cache from the loaded configuration.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn from_config(config: &Config, scope: &CancellationToken) -> Arc<Self> {
        Self::with_sweep_interval(
            scope,
            config.memory_budget,
            Duration::from_secs(config.sweep_interval),
        )
    }

    /// Creates a cache without a background sweeper. Expired entries are
    /// only removed by reads, [`MemoryCache::purge_expired`] or `flush`.
    pub fn without_sweeper(budget: i64) -> Self {
        Self::build(CancellationToken::new(), budget)
    }

    fn build(lifecycle: CancellationToken, budget: i64) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            budget,
            stats: StatsRecorder::default(),
            lifecycle,
        }
    }

    // == Accessors ==
    /// Token cancelled when this cache's sweeper must stop.
    pub fn lifecycle(&self) -> &CancellationToken {
        &self.lifecycle
    }

    /// Number of stored entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().entries.is_empty()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let table = self.table.read();
        self.stats
            .snapshot(table.entries.len(), table.allocated, self.budget)
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = current_timestamp_us();
        let mut table = self.table.write();

        let expired: Vec<String> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|key| table.remove_if_expired(key, now))
            .count();
        drop(table);

        self.stats.record_expirations(removed as u64);
        removed
    }

    /// Removes `key` if it is still expired once the write lock is held.
    fn evict_expired(&self, key: &str) {
        let removed = self
            .table
            .write()
            .remove_if_expired(key, current_timestamp_us());

        if removed {
            self.stats.record_expirations(1);
            debug!(key, "evicted expired cache entry");
        }
    }

    /// Estimated bytes for storing `value` under `key`, 0 when unbounded.
    fn entry_size(&self, key: &str, value: &Value) -> i64 {
        if self.budget <= 0 {
            return 0;
        }

        let mut est = SizeEstimator::new();
        let bytes = est
            .estimate(key)
            .saturating_add(value.payload_size(&mut est));
        i64::try_from(bytes)
            .unwrap_or(i64::MAX)
            .saturating_add(ENTRY_OVERHEAD)
    }
}

impl Cache for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn size(&self) -> i64 {
        self.table.read().allocated
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// With a budget, fails with [`CacheError::CapacityExceeded`] and leaves
    /// the table untouched if the write would push the allocated total over
    /// it. The size of a replaced entry is released first.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        let size = self.entry_size(key, &value);
        let entry = Entry::new(value, ttl, size);

        let mut table = self.table.write();
        if self.budget > 0 {
            let replaced = table.entries.get(key).map_or(0, |old| old.size);
            let allocated = table.allocated;
            if (allocated - replaced).saturating_add(size) > self.budget {
                drop(table);
                self.stats.record_rejection();
                debug!(
                    key,
                    size,
                    allocated,
                    budget = self.budget,
                    "cache write over memory budget"
                );
                return Err(CacheError::CapacityExceeded {
                    requested: size,
                    allocated,
                    budget: self.budget,
                });
            }
        }

        table.remove(key);
        table.allocated += size;
        table.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    // == Get ==
    fn get(&self, key: &str) -> Option<Value> {
        let now = current_timestamp_us();
        let expired = {
            let table = self.table.read();
            match table.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        self.stats.record_miss();
        // Read guard is released; removal takes the write lock.
        if expired {
            self.evict_expired(key);
        }
        None
    }

    fn forget(&self, key: &str) -> bool {
        self.table.write().remove(key);
        true
    }

    fn flush(&self) -> bool {
        self.table.write().clear();
        true
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}
