//! Size Estimator Module
//!
//! Computes an approximate byte footprint of arbitrary values.
//!
//! Every value reports its own size through [`SizeOf`]. The implementations
//! below dispatch over a small set of shapes (sequences, maps, records, text,
//! nullable and indirect references, boxed values and scalars) and use the
//! [`SizeEstimator`] to recurse. The estimate is heuristic: aliased values are
//! counted once per reference.
//!
//! Shared pointers (`Rc`, `Arc`) are tracked along the current recursion
//! path, so a reference cycle is charged the pointer's static size instead of
//! looping forever. A hard depth limit bounds everything else.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::mem::{size_of, size_of_val};
use std::rc::Rc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Recursion depth below which values are charged their static size only.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// == SizeOf Trait ==
/// A value able to report its approximate memory footprint in bytes.
pub trait SizeOf {
    /// Returns the estimated footprint, recursing through `est`.
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64;
}

// == Size Estimator ==
/// Recursion driver carrying the depth limit and the cycle guard.
#[derive(Debug)]
pub struct SizeEstimator {
    max_depth: usize,
    depth: usize,
    /// Addresses of shared pointees currently being walked
    path: Vec<usize>,
}

impl Default for SizeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeEstimator {
    /// Creates an estimator with [`DEFAULT_MAX_DEPTH`].
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: 0,
            path: Vec::new(),
        }
    }

    /// Estimates a single value.
    ///
    /// Once the depth limit is reached the value is charged `size_of_val`
    /// without descending into it.
    pub fn estimate<T: SizeOf + ?Sized>(&mut self, value: &T) -> u64 {
        if self.depth >= self.max_depth {
            return size_of_val(value) as u64;
        }

        self.depth += 1;
        let size = value.estimate_size(self);
        self.depth -= 1;
        size
    }

    /// Sequence shape: element sizes plus `spare` unused slots of `T`.
    pub fn sequence<'a, T, I>(&mut self, items: I, spare: usize) -> u64
    where
        T: SizeOf + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let used: u64 = items.into_iter().map(|item| self.estimate(item)).sum();
        used + (spare * size_of::<T>()) as u64
    }

    /// Associative shape: key and value sizes plus the container overhead.
    pub fn map<'a, K, V, I>(&mut self, pairs: I, overhead: usize) -> u64
    where
        K: SizeOf + 'a,
        V: SizeOf + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let mut size = overhead as u64;
        for (key, value) in pairs {
            size += self.estimate(key) + self.estimate(value);
        }
        size
    }

    /// Record shape: field sizes plus the static size of `R`.
    ///
    /// ```
    /// use memo_cache::cache::{SizeEstimator, SizeOf};
    ///
    /// struct Point {
    ///     x: i32,
    ///     y: i32,
    /// }
    ///
    /// impl SizeOf for Point {
    ///     fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
    ///         est.record::<Self>(&[&self.x, &self.y])
    ///     }
    /// }
    ///
    /// assert_eq!(memo_cache::cache::estimate(&Point { x: 1, y: 2 }), 16);
    /// ```
    pub fn record<R>(&mut self, fields: &[&dyn SizeOf]) -> u64 {
        let mut size = size_of::<R>() as u64;
        for field in fields {
            size += self.estimate(*field);
        }
        size
    }

    /// Nullable shape: an absent value costs the static size of `T`.
    pub fn nullable<T: SizeOf>(&mut self, value: Option<&T>) -> u64 {
        let fallback = size_of::<T>() as u64;
        match value {
            None => fallback,
            Some(inner) => match self.estimate(inner) {
                0 => fallback,
                size => size,
            },
        }
    }

    /// Indirect shape: the size of the target, or the pointer's own size if
    /// the target weighs nothing.
    pub fn indirect<T: SizeOf + ?Sized>(&mut self, target: &T, pointer_size: usize) -> u64 {
        match self.estimate(target) {
            0 => pointer_size as u64,
            size => size,
        }
    }

    /// Indirect shape for shared ownership, guarded against cycles.
    pub fn shared<T: SizeOf + ?Sized>(&mut self, target: &T, pointer_size: usize) -> u64 {
        let address = target as *const T as *const () as usize;
        if self.path.contains(&address) {
            return pointer_size as u64;
        }

        self.path.push(address);
        let size = self.indirect(target, pointer_size);
        self.path.pop();
        size
    }

    /// Boxed shape: the held value plus the box overhead.
    pub fn boxed<T: SizeOf + ?Sized>(&mut self, inner: &T, overhead: usize) -> u64 {
        self.estimate(inner) + overhead as u64
    }
}

/// Estimates `value` with a fresh [`SizeEstimator`].
pub fn estimate<T: SizeOf + ?Sized>(value: &T) -> u64 {
    SizeEstimator::new().estimate(value)
}

// == Scalars ==
macro_rules! impl_static_size {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SizeOf for $ty {
                fn estimate_size(&self, _est: &mut SizeEstimator) -> u64 {
                    size_of::<$ty>() as u64
                }
            }
        )*
    };
}

impl_static_size!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    Duration,
);

// == Text ==
impl SizeOf for str {
    fn estimate_size(&self, _est: &mut SizeEstimator) -> u64 {
        (self.len() + size_of::<String>()) as u64
    }
}

impl SizeOf for String {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        self.as_str().estimate_size(est)
    }
}

// == Sequences ==
impl<T: SizeOf> SizeOf for [T] {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), 0)
    }
}

impl<T: SizeOf, const N: usize> SizeOf for [T; N] {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), 0)
    }
}

impl<T: SizeOf> SizeOf for Vec<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), self.capacity() - self.len())
    }
}

impl<T: SizeOf> SizeOf for VecDeque<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), self.capacity() - self.len())
    }
}

impl<T: SizeOf, S> SizeOf for HashSet<T, S> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), self.capacity() - self.len())
    }
}

impl<T: SizeOf> SizeOf for BTreeSet<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.sequence(self.iter(), 0)
    }
}

// == Maps ==
impl<K: SizeOf, V: SizeOf, S> SizeOf for HashMap<K, V, S> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.map(self.iter(), size_of::<Self>())
    }
}

impl<K: SizeOf, V: SizeOf> SizeOf for BTreeMap<K, V> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.map(self.iter(), size_of::<Self>())
    }
}

// == Records ==
impl<A: SizeOf, B: SizeOf> SizeOf for (A, B) {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.record::<Self>(&[&self.0, &self.1])
    }
}

impl<A: SizeOf, B: SizeOf, C: SizeOf> SizeOf for (A, B, C) {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.record::<Self>(&[&self.0, &self.1, &self.2])
    }
}

// == Nullable and indirect references ==
impl<T: SizeOf> SizeOf for Option<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.nullable(self.as_ref())
    }
}

impl<T: SizeOf + ?Sized> SizeOf for Box<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.indirect(&**self, size_of::<Self>())
    }
}

impl<T: SizeOf + ?Sized> SizeOf for &T {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.indirect(&**self, size_of::<Self>())
    }
}

impl<T: SizeOf + ?Sized> SizeOf for Rc<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.shared(&**self, size_of::<Self>())
    }
}

impl<T: SizeOf + ?Sized> SizeOf for Arc<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.shared(&**self, size_of::<Self>())
    }
}

// == Interior mutability ==
// A cell that is currently borrowed elsewhere is charged its static size.
impl<T: SizeOf> SizeOf for RefCell<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        match self.try_borrow() {
            Ok(inner) => est.boxed(&*inner, size_of::<Self>() - size_of::<T>()),
            Err(_) => size_of::<Self>() as u64,
        }
    }
}

impl<T: SizeOf> SizeOf for Mutex<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        match self.try_lock() {
            Ok(inner) => est.boxed(&*inner, size_of::<Self>() - size_of::<T>()),
            Err(_) => size_of::<Self>() as u64,
        }
    }
}

impl<T: SizeOf> SizeOf for RwLock<T> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        match self.try_read() {
            Ok(inner) => est.boxed(&*inner, size_of::<Self>() - size_of::<T>()),
            Err(_) => size_of::<Self>() as u64,
        }
    }
}

// == JSON documents ==
impl SizeOf for serde_json::Value {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        let overhead = size_of::<serde_json::Value>();
        match self {
            serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
                overhead as u64
            }
            serde_json::Value::String(text) => est.boxed(text, overhead),
            serde_json::Value::Array(items) => est.boxed(items, overhead),
            serde_json::Value::Object(fields) => est.boxed(fields, overhead),
        }
    }
}

impl SizeOf for serde_json::Map<String, serde_json::Value> {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.map(self.iter(), size_of::<Self>())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const STRING_HEADER: u64 = size_of::<String>() as u64;

    struct Point {
        x: i32,
        y: i32,
    }

    impl SizeOf for Point {
        fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
            est.record::<Self>(&[&self.x, &self.y])
        }
    }

    struct Node {
        id: u64,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl SizeOf for Node {
        fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
            est.record::<Self>(&[&self.id, &self.next])
        }
    }

    #[test]
    fn test_scalars_use_static_size() {
        assert_eq!(estimate(&7u64), 8);
        assert_eq!(estimate(&1u8), 1);
        assert_eq!(estimate(&true), 1);
        assert_eq!(estimate(&1.5f32), 4);
    }

    #[test]
    fn test_text_counts_bytes_plus_header() {
        assert_eq!(estimate("hello"), 5 + STRING_HEADER);
        assert_eq!(estimate(&String::from("hello")), 5 + STRING_HEADER);
        assert_eq!(estimate(&String::new()), STRING_HEADER);
    }

    #[test]
    fn test_vec_charges_unused_capacity() {
        let mut items: Vec<u32> = Vec::with_capacity(10);
        items.extend([1, 2, 3]);
        let spare = (items.capacity() - items.len()) as u64;

        assert_eq!(estimate(&items), 3 * 4 + spare * 4);
    }

    #[test]
    fn test_map_sums_keys_values_and_overhead() {
        let mut map = HashMap::new();
        map.insert(String::from("a"), 1u64);

        let expected = size_of::<HashMap<String, u64>>() as u64 + (1 + STRING_HEADER) + 8;
        assert_eq!(estimate(&map), expected);
    }

    #[test]
    fn test_record_adds_own_static_size() {
        assert_eq!(estimate(&Point { x: 1, y: 2 }), 8 + 4 + 4);
        assert_eq!(estimate(&(1u8, 2u64)), size_of::<(u8, u64)>() as u64 + 1 + 8);
    }

    #[test]
    fn test_nullable_falls_back_to_static_size() {
        assert_eq!(estimate(&None::<u64>), 8);
        assert_eq!(estimate(&Some(5u64)), 8);
        assert_eq!(estimate(&Some(String::from("abc"))), 3 + STRING_HEADER);
    }

    #[test]
    fn test_indirect_falls_back_to_pointer_size() {
        assert_eq!(estimate(&Box::new(5u32)), 4);
        assert_eq!(estimate(&Box::new(())), size_of::<Box<()>>() as u64);

        let text = String::from("abc");
        assert_eq!(estimate(&&text), 3 + STRING_HEADER);
    }

    #[test]
    fn test_aliased_values_are_double_counted() {
        let shared = Arc::new("x".repeat(100));
        let items = vec![shared.clone(), shared];

        assert_eq!(estimate(&items), 2 * (100 + STRING_HEADER));
    }

    #[test]
    fn test_json_document() {
        let doc = serde_json::json!({ "name": "cache" });
        let overhead = size_of::<serde_json::Value>() as u64;
        let map_overhead = size_of::<serde_json::Map<String, serde_json::Value>>() as u64;

        let expected = overhead + map_overhead + (4 + STRING_HEADER) + (overhead + 5 + STRING_HEADER);
        assert_eq!(estimate(&doc), expected);
    }

    #[test]
    fn test_self_referential_structure_terminates() {
        let first = Rc::new(Node {
            id: 1,
            next: RefCell::new(None),
        });
        let second = Rc::new(Node {
            id: 2,
            next: RefCell::new(Some(first.clone())),
        });
        *first.next.borrow_mut() = Some(second.clone());

        let size = estimate(&first);
        assert!(size > 0);
        assert_eq!(size, estimate(&first));

        // Break the cycle so both nodes are freed.
        first.next.borrow_mut().take();
    }

    #[test]
    fn test_depth_limit_bounds_deep_nesting() {
        let outer = vec![vec![1u64, 2, 3]];
        assert_eq!(estimate(&outer), 3 * 8);

        // Only the outer Vec is walked, the inner one is charged its header.
        let mut est = SizeEstimator::with_max_depth(1);
        assert_eq!(est.estimate(&outer), size_of::<Vec<u64>>() as u64);
    }
}
