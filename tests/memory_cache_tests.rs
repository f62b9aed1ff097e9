//! Integration Tests for the Memory Cache
//!
//! Exercises the cache through the backend-agnostic contract, from several
//! threads at once, and with payloads the estimator must walk carefully.

use std::sync::{Arc, Mutex};
use std::thread::{self, sleep};
use std::time::Duration;

use memo_cache::cache::{estimate, SizeEstimator, SizeOf, ENTRY_OVERHEAD};
use memo_cache::{Cache, CacheError, MemoryCache, Value};

// == Helper Types ==

/// Linked node whose successor may point back at itself.
struct Node {
    label: String,
    next: Mutex<Option<Arc<Node>>>,
}

impl SizeOf for Node {
    fn estimate_size(&self, est: &mut SizeEstimator) -> u64 {
        est.record::<Self>(&[&self.label, &self.next])
    }
}

fn contract(budget: i64) -> Arc<dyn Cache> {
    Arc::new(MemoryCache::without_sweeper(budget))
}

// == Contract Tests ==

#[test]
fn test_contract_round_trip() {
    let cache = contract(0);

    cache.set("foo", Value::from("bar"), Duration::ZERO).unwrap();

    assert_eq!(cache.name(), "memory");
    assert_eq!(cache.get("foo").unwrap().as_str(), Some("bar"));
    assert!(cache.get("nope").is_none());
}

#[test]
fn test_contract_get_or_default() {
    let cache = contract(0);

    let value = cache.get_or("foo.bar", Value::from("baz"));
    assert_eq!(value.as_str(), Some("baz"));
    assert!(cache.get("foo.bar").is_none());
}

#[test]
fn test_contract_empty_key() {
    let cache = contract(0);

    let result = cache.set("", Value::from("bar"), Duration::ZERO);
    assert!(matches!(result, Err(CacheError::InvalidKey)));
}

#[test]
fn test_contract_remember_with_ttl() {
    let cache = contract(0);
    let mut calls = 0;

    for _ in 0..3 {
        let value = cache
            .remember(
                "answer",
                &mut || {
                    calls += 1;
                    Value::from(42i64)
                },
                Duration::from_millis(100),
            )
            .unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&42));
    }
    assert_eq!(calls, 1);

    sleep(Duration::from_millis(150));

    let mut producer = || {
        calls += 1;
        Value::from(7i64)
    };
    cache.remember_forever("answer", &mut producer).unwrap();
    assert_eq!(calls, 2);
}

#[test]
fn test_contract_forget_and_flush() {
    let cache = contract(1 << 20);

    cache.set("a", Value::from("1"), Duration::ZERO).unwrap();
    cache.set("b", Value::from("2"), Duration::ZERO).unwrap();

    assert!(cache.forget("a"));
    assert!(cache.forget("a"));
    assert!(cache.get("a").is_none());
    assert!(cache.get("b").is_some());

    assert!(cache.flush());
    assert_eq!(cache.size(), 0);
    assert!(cache.get("b").is_none());
}

// == TTL Tests ==

#[test]
fn test_entry_expires_after_ttl() {
    let cache = contract(1 << 20);

    cache
        .set("k", Value::from("v"), Duration::from_millis(50))
        .unwrap();
    assert!(cache.get("k").is_some());

    sleep(Duration::from_millis(80));

    assert!(cache.get("k").is_none());
    // The expired read released the entry's bytes
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_zero_ttl_never_expires() {
    let cache = contract(0);

    cache.set("k", Value::from("v"), Duration::ZERO).unwrap();
    sleep(Duration::from_millis(20));

    assert!(cache.get("k").is_some());
}

// == Budget Tests ==

#[test]
fn test_budget_rejection_reports_figures() {
    let cache = MemoryCache::without_sweeper(256);
    let big = "x".repeat(512);
    let expected = (estimate("k") + estimate(big.as_str())) as i64 + ENTRY_OVERHEAD;

    match cache.set("k", Value::from(big), Duration::ZERO) {
        Err(CacheError::CapacityExceeded {
            requested,
            allocated,
            budget,
        }) => {
            assert_eq!(requested, expected);
            assert_eq!(allocated, 0);
            assert_eq!(budget, 256);
        }
        other => panic!("expected capacity error, got {:?}", other),
    }
    assert_eq!(cache.stats().rejections, 1);
}

#[test]
fn test_cyclic_payload_is_estimated_and_stored() {
    let cache = MemoryCache::without_sweeper(1 << 20);

    let node = Arc::new(Node {
        label: "loop".to_string(),
        next: Mutex::new(None),
    });
    *node.next.lock().unwrap() = Some(Arc::clone(&node));

    cache
        .set("cycle", Value::new(Arc::clone(&node)), Duration::ZERO)
        .unwrap();

    assert!(cache.size() > ENTRY_OVERHEAD);
    let stored = cache.get("cycle").unwrap();
    let back = stored.downcast_ref::<Arc<Node>>().unwrap();
    assert!(Arc::ptr_eq(back, &node));

    // Break the cycle so the node is freed
    node.next.lock().unwrap().take();
}

// == Concurrency Tests ==

#[test]
fn test_concurrent_operations_keep_footprint_consistent() {
    let cache = Arc::new(MemoryCache::without_sweeper(1 << 24));
    let keys: Vec<String> = (0..16).map(|i| format!("key-{}", i)).collect();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            let keys = keys.clone();
            thread::spawn(move || {
                for round in 0..500 {
                    let key = &keys[(worker * 7 + round) % keys.len()];
                    match round % 4 {
                        0 | 1 => {
                            let value = format!("{}-{}", worker, "v".repeat(round % 32));
                            cache.set(key, Value::from(value), Duration::ZERO).unwrap();
                        }
                        2 => {
                            if let Some(value) = cache.get(key) {
                                assert!(value.as_str().is_some());
                            }
                        }
                        _ => {
                            cache.forget(key);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let recomputed: i64 = keys
        .iter()
        .filter_map(|key| {
            let value = cache.get(key)?;
            let text = value.as_str()?;
            Some((estimate(key.as_str()) + estimate(text)) as i64 + ENTRY_OVERHEAD)
        })
        .sum();

    assert_eq!(cache.size(), recomputed);
    assert_eq!(cache.stats().total_entries, cache.len());
}

#[test]
fn test_concurrent_writers_respect_budget() {
    let per_entry = (estimate("key-00") + estimate("payload")) as i64 + ENTRY_OVERHEAD;
    let budget = per_entry * 10;
    let cache = Arc::new(MemoryCache::without_sweeper(budget));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut accepted = 0usize;
                for i in 0..25 {
                    let key = format!("key-{}{}", worker, i % 10);
                    if cache.set(&key, Value::from("payload"), Duration::ZERO).is_ok() {
                        accepted += 1;
                    }
                    assert!(cache.size() <= budget);
                }
                accepted
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert!(accepted >= 10);
    assert!(cache.size() <= budget);
    assert_eq!(cache.len(), 10);
}
