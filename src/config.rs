//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

/// One kibibyte.
pub const SIZE_KB: i64 = 1 << 10;
/// One mebibyte.
pub const SIZE_MB: i64 = 1 << 20;
/// One gibibyte.
pub const SIZE_GB: i64 = 1 << 30;
/// One tebibyte.
pub const SIZE_TB: i64 = 1 << 40;

// == Backend ==
/// Which cache implementation serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Redis,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "redis" => Ok(Backend::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => f.write_str("memory"),
            Backend::Redis => f.write_str("redis"),
        }
    }
}

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend serving the cache contract
    pub backend: Backend,
    /// Memory budget in bytes for the memory backend, 0 or negative = unbounded
    pub memory_budget: i64,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Redis connection URL
    pub redis_url: String,
    /// Redis connect timeout in seconds
    pub redis_connect_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `CACHE_MEMORY_BUDGET` - Budget in bytes, `KB`/`MB`/`GB`/`TB` suffixes allowed (default: 0)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REDIS_URL` - Redis address (default: redis://127.0.0.1:6379/0)
    /// - `REDIS_CONNECT_TIMEOUT` - Connect timeout in seconds (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend: env::var("CACHE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            memory_budget: env::var("CACHE_MEMORY_BUDGET")
                .ok()
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.memory_budget),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_connect_timeout: env::var("REDIS_CONNECT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.redis_connect_timeout),
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis_config(&self) -> crate::cache::RedisConfig {
        crate::cache::RedisConfig {
            url: self.redis_url.clone(),
            connect_timeout: std::time::Duration::from_secs(self.redis_connect_timeout),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            memory_budget: 0,
            sweep_interval: 60,
            server_port: 3000,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            redis_connect_timeout: 5,
        }
    }
}

/// Parses a byte count such as `4096`, `512KB` or `64 MB`.
///
/// Suffixes are binary multiples and case-insensitive. Returns None on
/// malformed input or overflow.
pub fn parse_size(input: &str) -> Option<i64> {
    let normalized = input.trim().to_ascii_uppercase();

    let units = [
        ("TB", SIZE_TB),
        ("GB", SIZE_GB),
        ("MB", SIZE_MB),
        ("KB", SIZE_KB),
        ("B", 1),
    ];

    let (digits, unit) = units
        .iter()
        .find_map(|(suffix, unit)| {
            normalized
                .strip_suffix(suffix)
                .map(|rest| (rest.trim_end(), *unit))
        })
        .unwrap_or((normalized.as_str(), 1));

    digits.parse::<i64>().ok()?.checked_mul(unit)
}
