//! Memo Cache - a uniform caching abstraction
//!
//! Provides the [`Cache`] contract, an in-process memory cache with an
//! approximate memory budget, TTL expiration and memoization helpers, an
//! optional Redis adapter, and an HTTP front for either backend.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, MemoryCache, Value};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweeper;
