//! Integration tests for object-cache
//!
//! These tests verify end-to-end cache behavior across all components.

use object_cache::resolver::from_value_fn;
use object_cache::{
    CacheConfig, CacheFactory, Entry, Error, KeyStrength, ObjectCache, Result, Sweeper,
};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Cache over `String` keys whose resolver returns `value` and counts calls.
fn counting_cache(
    factory: &CacheFactory,
    strength: KeyStrength,
    value: &'static str,
) -> (ObjectCache<String, String>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = factory.new_resolving_cache(
        strength,
        move |_key: &String| -> Result<Option<Entry<String>>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Entry::new(value.to_string())))
        },
    );
    (cache, calls)
}

fn key(s: &str) -> Arc<String> {
    Arc::new(s.to_string())
}

/// Test 1: TTL Scenario
///
/// Soft cache, TTL 500ms:
/// - First lookup resolves
/// - Immediate second lookup is a hit
/// - After sleeping past the TTL the value is resolved again
#[test]
fn test_ttl_scenario() {
    init_logging();
    let (cache, calls) = counting_cache(&CacheFactory::default(), KeyStrength::Soft, "test");
    cache.set_ttl(500);
    let k = key("key");

    let r1 = cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(r1.as_deref(), Some("test"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let r2 = cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(r2.as_deref(), Some("test"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(1000));

    let r3 = cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(r3.as_deref(), Some("test"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test 2: TTL Boundary
///
/// A lookup well inside the TTL window is a hit; one past it resolves again.
#[test]
fn test_ttl_boundary() {
    init_logging();
    let factory = CacheFactory::new(CacheConfig::default().with_ttl_millis(500));
    let (cache, calls) = counting_cache(&factory, KeyStrength::Soft, "v");
    let k = key("boundary");

    cache.retrieve_object(&k).expect("Failed to retrieve");
    thread::sleep(Duration::from_millis(300));
    cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Hits do not extend the TTL window: age is measured from the update.
    thread::sleep(Duration::from_millis(250));
    cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test 3: Invalidate Then Miss
///
/// After invalidation the next lookup always resolves, even with TTL
/// disabled.
#[test]
fn test_invalidate_then_miss() {
    init_logging();
    let (cache, calls) = counting_cache(&CacheFactory::default(), KeyStrength::Soft, "v");
    let k = key("k");

    cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(cache.invalidate_object(&k).as_deref(), Some("v"));
    assert_eq!(cache.invalidate_object(&k), None);

    cache.retrieve_object(&k).expect("Failed to retrieve");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test 4: Uncacheable Values
///
/// A resolver returning `None` is asked again on every lookup and nothing is
/// ever stored.
#[test]
fn test_absent_values_are_never_cached() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache: ObjectCache<String, String> = CacheFactory::default().new_resolving_cache(
        KeyStrength::Weak,
        move |_key: &String| -> Result<Option<Entry<String>>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        },
    );
    let k = key("never");

    for _ in 0..5 {
        assert_eq!(cache.retrieve_object(&k).expect("Failed to retrieve"), None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(cache.is_empty());
}

/// Test 5: Eventually Available Values
///
/// Not caching "no value" lets a later lookup pick up a value once it exists.
#[test]
fn test_eventually_available_value() {
    init_logging();
    let published = Arc::new(AtomicUsize::new(0));
    let source = Arc::clone(&published);
    let cache: ObjectCache<u32, usize> = CacheFactory::default().new_resolving_cache(
        KeyStrength::Soft,
        from_value_fn(move |_pid: &u32| match source.load(Ordering::SeqCst) {
            0 => None,
            n => Some(n),
        }),
    );
    let pid = Arc::new(7);

    assert_eq!(cache.retrieve_object(&pid).expect("Failed to retrieve"), None);
    published.store(3, Ordering::SeqCst);
    assert_eq!(cache.retrieve_object(&pid).expect("Failed to retrieve"), Some(3));
}

/// Test 6: Value-Equal Keys
///
/// Distinct key objects that are equal by value share one slot; unequal keys
/// never do.
#[test]
fn test_value_equal_keys_share_slot() {
    init_logging();
    let cache: ObjectCache<String, usize> = CacheFactory::default().new_resolving_cache(
        KeyStrength::Soft,
        from_value_fn(|k: &String| Some(k.len())),
    );

    let a1 = key("alpha");
    let a2 = key("alpha");
    let b = key("beta");

    assert_eq!(cache.retrieve_object(&a1).expect("Failed to retrieve"), Some(5));
    assert_eq!(cache.retrieve_object(&a2).expect("Failed to retrieve"), Some(5));
    assert_eq!(cache.retrieve_object(&b).expect("Failed to retrieve"), Some(4));
    assert_eq!(cache.len(), 2);
}

/// Test 7: Concurrent First Access
///
/// N threads racing on the first lookup of one key cause a single resolver
/// invocation and all observe the same value.
#[test]
fn test_concurrent_first_access_resolves_once() {
    init_logging();
    const THREADS: usize = 16;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache: Arc<ObjectCache<String, String>> =
        Arc::new(CacheFactory::default().new_resolving_cache(
            KeyStrength::Soft,
            move |key: &String| -> Result<Option<Entry<String>>> {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(Some(Entry::new(format!("{}-value", key))))
            },
        ));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let k = key("shared");
                barrier.wait();
                cache.retrieve_object(&k).expect("Failed to retrieve")
            })
        })
        .collect();

    for handle in handles {
        let value = handle.join().expect("Thread panicked");
        assert_eq!(value.as_deref(), Some("shared-value"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test 8: Distinct Keys Do Not Block Each Other
///
/// While one key's resolver is blocked, another key resolves normally.
#[test]
fn test_slow_resolver_does_not_block_other_keys() {
    init_logging();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));
    let cache: Arc<ObjectCache<String, String>> =
        Arc::new(CacheFactory::default().new_resolving_cache(
            KeyStrength::Soft,
            move |key: &String| -> Result<Option<Entry<String>>> {
                if key == "slow" {
                    let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
                }
                Ok(Some(Entry::new(key.to_uppercase())))
            },
        ));

    let slow_cache = Arc::clone(&cache);
    let slow = thread::spawn(move || slow_cache.retrieve_object(&key("slow")));
    thread::sleep(Duration::from_millis(50));

    let fast = cache.retrieve_object(&key("fast")).expect("Failed to retrieve");
    assert_eq!(fast.as_deref(), Some("FAST"));
    assert!(!slow.is_finished());

    release_tx.send(()).expect("Failed to release");
    let slow = slow.join().expect("Thread panicked").expect("Failed to retrieve");
    assert_eq!(slow.as_deref(), Some("SLOW"));
}

/// Test 9: Resolver Failure
///
/// Errors propagate, nothing is installed, and the next call retries.
#[test]
fn test_resolver_failure_is_not_poisonous() {
    init_logging();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let cache: ObjectCache<String, String> = CacheFactory::default().new_resolving_cache(
        KeyStrength::Soft,
        move |_key: &String| -> Result<Option<Entry<String>>> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::ResolverError("target VM not attached".to_string()))
            } else {
                Ok(Some(Entry::new("attached".to_string())))
            }
        },
    );
    let k = key("vm");

    let err = cache.retrieve_object(&k).expect_err("Expected resolver error");
    assert!(err.to_string().contains("target VM not attached"));
    assert!(cache.is_empty());

    assert_eq!(
        cache.retrieve_object(&k).expect("Failed to retrieve").as_deref(),
        Some("attached")
    );
}

/// Test 10: Weak Key Reclamation
///
/// Dropping the last caller-side key abandons the slot; it self-heals into a
/// new slot and housekeeping drops the dead one.
#[test]
fn test_weak_key_reclamation_self_heals() {
    init_logging();
    let (cache, calls) = counting_cache(&CacheFactory::default(), KeyStrength::Weak, "v");

    let first = key("session");
    cache.retrieve_object(&first).expect("Failed to retrieve");
    drop(first);

    let second = key("session");
    cache.retrieve_object(&second).expect("Failed to retrieve");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().reclaimed_keys, 1);

    assert_eq!(cache.purge(), 1);
    let stats = cache.stats();
    assert_eq!(stats.total_slots, 1);
    assert_eq!(stats.reclaimed_keys, 0);
}

/// Test 11: Soft Capacity
///
/// A soft cache sheds least recently used slots beyond its capacity, but
/// never a slot whose key a caller still holds.
#[test]
fn test_soft_capacity_bounds_unpinned_slots() {
    init_logging();
    let factory = CacheFactory::new(CacheConfig::default().with_soft_capacity(4));
    let (cache, calls) = counting_cache(&factory, KeyStrength::Soft, "v");

    let pinned = key("pinned");
    cache.retrieve_object(&pinned).expect("Failed to retrieve");

    for i in 0..20 {
        cache
            .retrieve_object(&key(&format!("transient-{}", i)))
            .expect("Failed to retrieve");
        thread::sleep(Duration::from_millis(2));
    }

    assert!(cache.len() <= 4);
    cache.retrieve_object(&pinned).expect("Failed to retrieve");
    assert_eq!(calls.load(Ordering::SeqCst), 21);
}

/// Test 12: Background Sweeper
///
/// The factory-configured sweeper drops reclaimed weak slots on its own.
#[tokio::test]
async fn test_factory_sweeper_purges_reclaimed_slots() {
    init_logging();
    let factory = CacheFactory::new(
        CacheConfig::default().with_sweep_interval(Duration::from_millis(20)),
    );
    let (cache, _calls) = counting_cache(&factory, KeyStrength::Weak, "v");
    let cache = Arc::new(cache);

    for i in 0..10 {
        cache
            .retrieve_object(&key(&format!("short-lived-{}", i)))
            .expect("Failed to retrieve");
    }
    assert_eq!(cache.stats().reclaimed_keys, 10);

    let sweeper: Sweeper = factory.spawn_sweeper(&cache).expect("Failed to spawn sweeper");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(cache.is_empty());
    assert!(sweeper.sweep_count() >= 1);
    sweeper.stop();
}

/// Test 13: Config From JSON
#[test]
fn test_factory_from_json_config() {
    init_logging();
    let config = CacheConfig::from_json(r#"{ "ttl_millis": 1500, "soft_capacity": 100 }"#)
        .expect("Failed to parse config");
    let cache: ObjectCache<u64, u64> = CacheFactory::new(config).new_cache(KeyStrength::Soft);

    assert_eq!(cache.get_ttl(), 1500);
    cache.set_ttl(-1);
    assert_eq!(cache.stats().ttl_millis, -1);
}

/// Test 14: Invalidate During Resolution
///
/// Invalidating a key whose resolver is still running waits for it, so a
/// lookup arriving right after the invalidation never starts a second,
/// overlapping resolver call.
#[test]
fn test_invalidate_during_resolution_keeps_single_flight() {
    init_logging();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let (current, peak) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));
    let cache: Arc<ObjectCache<String, String>> =
        Arc::new(CacheFactory::default().new_resolving_cache(
            KeyStrength::Soft,
            move |key: &String| -> Result<Option<Entry<String>>> {
                let running = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(200));
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(Entry::new(format!("{}-value", key))))
            },
        ));

    let first_cache = Arc::clone(&cache);
    let first = thread::spawn(move || first_cache.retrieve_object(&key("k")));

    thread::sleep(Duration::from_millis(50));
    let invalidating_cache = Arc::clone(&cache);
    let invalidate = thread::spawn(move || invalidating_cache.invalidate_object(&key("k")));

    thread::sleep(Duration::from_millis(20));
    let late_cache = Arc::clone(&cache);
    let late = thread::spawn(move || late_cache.retrieve_object(&key("k")));

    let first = first.join().expect("Thread panicked").expect("Failed to retrieve");
    invalidate.join().expect("Thread panicked");
    let late = late.join().expect("Thread panicked").expect("Failed to retrieve");

    assert_eq!(first.as_deref(), Some("k-value"));
    assert_eq!(late.as_deref(), Some("k-value"));
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

/// Test 15: Weak Cache Stays Bounded Without A Sweeper
///
/// A stream of transient keys does not accumulate dead slots (and their
/// values) when no sweep interval is configured.
#[test]
fn test_weak_cache_bounded_without_sweeper() {
    init_logging();
    let cache: ObjectCache<u64, Vec<u8>> = CacheFactory::default()
        .new_resolving_cache(KeyStrength::Weak, from_value_fn(|_k: &u64| Some(vec![0u8; 1024])));

    let mut peak = 0;
    for i in 0..10_000u64 {
        let value = cache.retrieve_object(&Arc::new(i)).expect("Failed to retrieve");
        assert_eq!(value.map(|v| v.len()), Some(1024));
        peak = peak.max(cache.len());
    }

    assert!(peak < 200, "weak cache grew to {} slots", peak);
    assert!(cache.stats().reclaimed_keys < 200);
}

/// Key whose hash is the same for every value.
#[derive(Debug, PartialEq, Eq)]
struct Collide(u32);

impl Hash for Collide {
    fn hash<H: Hasher>(&self, state: &mut H) {
        0u8.hash(state);
    }
}

/// Test 16: Hash Collisions
///
/// Value-unequal keys with identical hashes still get their own slots and
/// their own values.
#[test]
fn test_colliding_hashes_keep_keys_apart() {
    init_logging();
    const KEYS: u32 = 50;

    for strength in [KeyStrength::Weak, KeyStrength::Soft] {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: ObjectCache<Collide, u32> = CacheFactory::default().new_resolving_cache(
            strength,
            from_value_fn(move |k: &Collide| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(k.0 * 10)
            }),
        );
        let keys: Vec<Arc<Collide>> = (0..KEYS).map(|i| Arc::new(Collide(i))).collect();

        for k in &keys {
            let value = cache.retrieve_object(k).expect("Failed to retrieve");
            assert_eq!(value, Some(k.0 * 10));
        }
        assert_eq!(calls.load(Ordering::SeqCst), KEYS as usize);
        assert_eq!(cache.len(), KEYS as usize);

        for k in &keys {
            let value = cache.retrieve_object(k).expect("Failed to retrieve");
            assert_eq!(value, Some(k.0 * 10));
        }
        assert_eq!(calls.load(Ordering::SeqCst), KEYS as usize);

        assert_eq!(cache.invalidate_object(&keys[7]), Some(70));
        assert_eq!(cache.len(), KEYS as usize - 1);
        assert_eq!(
            cache.retrieve_object(&keys[8]).expect("Failed to retrieve"),
            Some(80)
        );
    }
}
