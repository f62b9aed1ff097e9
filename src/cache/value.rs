//! Cache Value Module
//!
//! Type-erased payload handle shared by every backend.

use std::any::{type_name, Any};
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use crate::cache::size::{SizeEstimator, SizeOf};

trait Payload: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn weigh(&self, est: &mut SizeEstimator) -> u64;
    fn payload_type(&self) -> &'static str;
}

impl<T: SizeOf + Any + Send + Sync> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn weigh(&self, est: &mut SizeEstimator) -> u64 {
        est.estimate(self)
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }
}

// == Value ==
/// An opaque cached payload.
///
/// Cloning a `Value` clones a reference-counted handle, never the payload,
/// so a value read back from the cache is the one that was stored.
#[derive(Clone)]
pub struct Value(Arc<dyn Payload>);

impl Value {
    /// Wraps any sizeable, thread-safe payload.
    pub fn new<T: SizeOf + Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Borrows the payload as `T` if that is its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Name of the payload's concrete type.
    pub fn type_name(&self) -> &'static str {
        self.0.payload_type()
    }

    /// Estimated footprint of the payload alone, excluding this handle.
    pub fn payload_size(&self, est: &mut SizeEstimator) -> u64 {
        self.0.weigh(est)
    }

    /// Returns true when both handles point at the same payload.
    pub fn ptr_eq(this: &Value, other: &Value) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// JSON form of the payload for the payload types that have one.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        if let Some(json) = self.downcast_ref::<serde_json::Value>() {
            return Some(json.clone());
        }
        if let Some(text) = self.as_str() {
            return Some(serde_json::Value::from(text));
        }
        if let Some(flag) = self.downcast_ref::<bool>() {
            return Some(serde_json::Value::from(*flag));
        }
        if let Some(number) = self.downcast_ref::<i64>() {
            return Some(serde_json::Value::from(*number));
        }
        if let Some(number) = self.downcast_ref::<u64>() {
            return Some(serde_json::Value::from(*number));
        }
        if let Some(number) = self.downcast_ref::<f64>() {
            return Some(serde_json::Value::from(*number));
        }
        None
    }
}

// Polymorphic box: the held payload plus the handle itself.
impl SizeOf for Value {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        self.payload_size(est) + size_of::<Value>() as u64
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => f.debug_tuple("Value").field(&text).finish(),
            None => f.debug_tuple("Value").field(&self.type_name()).finish(),
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::new(text.to_owned())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::new(json)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Self::new(number)
    }
}

impl From<u64> for Value {
    fn from(number: u64) -> Self {
        Self::new(number)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::new(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::new(flag)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::size::estimate;

    #[derive(Debug, PartialEq)]
    struct Session {
        user: String,
        visits: u32,
    }

    impl SizeOf for Session {
        fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
            est.record::<Self>(&[&self.user, &self.visits])
        }
    }

    #[test]
    fn test_downcast_to_concrete_type() {
        let value = Value::new(Session {
            user: "ada".to_string(),
            visits: 3,
        });

        assert!(value.is::<Session>());
        assert_eq!(value.downcast_ref::<Session>().map(|s| s.visits), Some(3));
        assert!(value.downcast_ref::<String>().is_none());
        assert!(value.type_name().ends_with("Session"));
    }

    #[test]
    fn test_clone_shares_payload() {
        let value = Value::from("bar");
        let copy = value.clone();

        assert!(Value::ptr_eq(&value, &copy));
        assert!(!Value::ptr_eq(&value, &Value::from("bar")));
        assert_eq!(copy.as_str(), Some("bar"));
    }

    #[test]
    fn test_payload_size_excludes_handle() {
        let value = Value::from("abc");
        let payload = value.payload_size(&mut SizeEstimator::new());

        assert_eq!(payload, estimate("abc"));
        assert_eq!(estimate(&value), payload + size_of::<Value>() as u64);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::from("x").to_json(), Some(serde_json::json!("x")));
        assert_eq!(Value::from(42i64).to_json(), Some(serde_json::json!(42)));
        assert_eq!(
            Value::from(serde_json::json!({"a": [1, 2]})).to_json(),
            Some(serde_json::json!({"a": [1, 2]}))
        );
        assert!(Value::from(vec![1u8, 2]).to_json().is_none());
    }

    #[test]
    fn test_debug_shows_text_or_type() {
        assert_eq!(format!("{:?}", Value::from("hi")), "Value(\"hi\")");
        assert_eq!(format!("{:?}", Value::from(true)), "Value(\"bool\")");
    }
}
