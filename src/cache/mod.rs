//! Cache Module
//!
//! The cache contract plus its backends: an in-process memory cache with an
//! approximate memory budget and TTL expiration, and an optional Redis adapter.

mod contract;
mod entry;
mod memory;
mod size;
mod stats;
mod value;

#[cfg(feature = "redis")]
mod remote;


// Re-export public types
pub use contract::Cache;
pub use entry::{current_timestamp_us, ENTRY_OVERHEAD};
pub use memory::{MemoryCache, DEFAULT_SWEEP_INTERVAL};
pub use size::{estimate, SizeEstimator, SizeOf, DEFAULT_MAX_DEPTH};
pub use stats::CacheStats;
pub use value::Value;

#[cfg(feature = "redis")]
pub use remote::{RedisCache, RedisConfig};
