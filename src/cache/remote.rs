//! Redis Cache Module
//!
//! Cache contract over a remote Redis server. The server manages its own
//! memory, so no budget is enforced here.

use std::time::Duration;

use parking_lot::Mutex;
use redis::{Client, Connection};
use tracing::{info, warn};

use crate::cache::{Cache, Value};
use crate::error::{CacheError, Result};

/// Redis connection parameters.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL (redis://[user:pass@]host:port/db)
    pub url: String,
    /// Timeout for establishing the connection at startup
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// == Redis Cache ==
/// [`Cache`] backed by a single Redis connection.
///
/// `set` only writes absent keys (`SET NX`) and fails with
/// [`CacheError::KeyExists`] otherwise. `size` reports the key count. `get`
/// returns a `String` payload for UTF-8 replies and `Vec<u8>` otherwise.
pub struct RedisCache {
    conn: Mutex<Connection>,
}

impl RedisCache {
    /// Connects and pings the server, failing if it is unreachable.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::BackendUnavailable(format!("invalid redis url: {}", e)))?;

        let mut conn = client
            .get_connection_with_timeout(config.connect_timeout)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        info!("Connected to redis cache backend");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Cache for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn size(&self) -> i64 {
        redis::cmd("DBSIZE")
            .query::<i64>(&mut *self.conn.lock())
            .unwrap_or_else(|e| {
                warn!("redis DBSIZE failed: {}", e);
                0
            })
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let payload = encode(&value)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload.as_slice()).arg("NX");
        if !ttl.is_zero() {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }

        let reply: Option<String> = cmd
            .query(&mut *self.conn.lock())
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match reply {
            Some(_) => Ok(()),
            None => Err(CacheError::KeyExists(key.to_owned())),
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        match redis::cmd("GET")
            .arg(key)
            .query::<Option<Vec<u8>>>(&mut *self.conn.lock())
        {
            Ok(found) => found.map(decode),
            Err(e) => {
                warn!(key, "redis GET failed: {}", e);
                None
            }
        }
    }

    fn forget(&self, key: &str) -> bool {
        redis::cmd("DEL")
            .arg(key)
            .query::<i64>(&mut *self.conn.lock())
            .is_ok()
    }

    fn flush(&self) -> bool {
        matches!(
            redis::cmd("FLUSHALL").query::<String>(&mut *self.conn.lock()),
            Ok(reply) if reply == "OK"
        )
    }
}

/// Wire form of the payload types Redis can store.
fn encode(value: &Value) -> Result<Vec<u8>> {
    if let Some(text) = value.as_str() {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(bytes) = value.downcast_ref::<Vec<u8>>() {
        return Ok(bytes.clone());
    }
    if let Some(json) = value.downcast_ref::<serde_json::Value>() {
        return Ok(json.to_string().into_bytes());
    }
    if let Some(flag) = value.downcast_ref::<bool>() {
        return Ok(if *flag { b"1".to_vec() } else { b"0".to_vec() });
    }

    macro_rules! encode_number {
        ($($ty:ty),*) => {
            $(
                if let Some(number) = value.downcast_ref::<$ty>() {
                    return Ok(number.to_string().into_bytes());
                }
            )*
        };
    }
    encode_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

    Err(CacheError::UnsupportedPayload(value.type_name()))
}

/// Payload for stored bytes: text when they are valid UTF-8, raw otherwise.
fn decode(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::from(text),
        Err(e) => Value::from(e.into_bytes()),
    }
}
