//! Background Tasks Module
//!
//! Contains background tasks bound to a cache's lifecycle.
//!
//! # Tasks
//! - TTL Sweeper: Removes expired cache entries at configured intervals

mod sweeper;

pub use sweeper::{spawn_sweeper, MIN_SWEEP_INTERVAL};
