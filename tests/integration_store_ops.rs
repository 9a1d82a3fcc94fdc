use std::time::Duration;

use serde_json::{json, Value};

use recache::{CacheConfig, CacheManager, Provenance};

#[test]
fn test_lru_fifo_on_seed() {
    let cache: CacheManager<Value> = CacheManager::with_initial(
        CacheConfig::with_max_length(2),
        [("A", json!(1)), ("B", json!(2)), ("C", json!(3))],
    );

    assert_eq!(cache.len(), 2);
    assert!(!cache.has("A"));
    assert!(cache.has("B"));
    assert!(cache.has("C"));
    assert_eq!(cache.keys(), vec!["C", "B"]);
}

#[test]
fn test_capacity_never_exceeded() {
    let cache: CacheManager<Value> = CacheManager::new(CacheConfig::with_max_length(2));

    for i in 0..5 {
        cache.set(format!("key/{i}"), json!(i));
        assert!(cache.len() <= 2);
    }
    assert_eq!(cache.keys(), vec!["key/4", "key/3"]);
}

#[test]
fn test_expire_glob_only_touches_matches() {
    let cache: CacheManager<Value> = CacheManager::with_initial(
        CacheConfig::default(),
        [
            ("house/1", json!(1)),
            ("house/2", json!(2)),
            ("guest/2", json!(3)),
        ],
    );

    let expired = cache.expire(["house/*"]);
    assert_eq!(expired, 2);

    assert_eq!(cache.probe("house/1"), Provenance::Stale);
    assert_eq!(cache.probe("house/2"), Provenance::Stale);
    assert_eq!(cache.probe("guest/2"), Provenance::Hit);

    // The expired entries stay stored, just stale.
    assert_eq!(cache.entry("house/1").unwrap().value, json!(1));
    assert_eq!(cache.entry("house/1").unwrap().ttl, Duration::ZERO);
}

#[test]
fn test_expire_is_idempotent() {
    let cache: CacheManager<Value> = CacheManager::with_initial(
        CacheConfig::default(),
        [("house/1", json!(1)), ("guest/2", json!(2))],
    );

    cache.expire(["house/*"]);
    let keys_after_first = cache.keys();
    let entry_after_first = cache.entry("house/1").unwrap();

    cache.expire(["house/*"]);
    assert_eq!(cache.keys(), keys_after_first);

    let entry_after_second = cache.entry("house/1").unwrap();
    assert_eq!(entry_after_second.value, entry_after_first.value);
    assert_eq!(entry_after_second.ttl, entry_after_first.ttl);
    assert_eq!(entry_after_second.created, entry_after_first.created);
    assert_eq!(cache.probe("guest/2"), Provenance::Hit);
}

#[test]
fn test_seeded_values_are_decoupled_from_the_seed() {
    let mut seed = json!({"ns": "v"});

    let cache: CacheManager<Value> =
        CacheManager::with_initial(CacheConfig::default(), [("hei/verden", seed.clone())]);

    // Mutating the seed object afterwards must not reach the cache.
    seed["ns"] = json!("mutated");
    seed["extra"] = json!(true);

    assert_eq!(
        cache.get("hei/verden").unwrap().value,
        json!({"ns": "v"})
    );
}

#[test]
fn test_ordered_patterns_mix_literals_and_globs() {
    let cache: CacheManager<Value> = CacheManager::with_initial(
        CacheConfig::default(),
        [
            ("house/1", json!(1)),
            ("guest/1", json!(2)),
            ("guest/2", json!(3)),
        ],
    );

    let expired = cache.expire(["house/1", "guest/*"]);
    assert_eq!(expired, 3);
    assert_eq!(cache.probe("house/1"), Provenance::Stale);
    assert_eq!(cache.probe("guest/1"), Provenance::Stale);
    assert_eq!(cache.probe("guest/2"), Provenance::Stale);
}

#[test]
fn test_store_metrics_track_reads_and_evictions() {
    let cache: CacheManager<Value> = CacheManager::new(CacheConfig::with_max_length(2));

    cache.set("a", json!(1));
    cache.set("b", json!(2));
    cache.set("c", json!(3)); // evicts "a"

    assert!(cache.get("b").is_some());
    assert!(cache.get("a").is_none());

    let metrics = cache.metrics();
    assert_eq!(metrics.evictions, 1);
    assert!(metrics.hits >= 1);
    assert!(metrics.misses >= 1);
    assert_eq!(metrics.size, 2);
}

#[test]
fn test_independent_instances_share_nothing() {
    let left: CacheManager<Value> =
        CacheManager::with_initial(CacheConfig::default(), [("k", json!("left"))]);
    let right: CacheManager<Value> = CacheManager::new(CacheConfig::default());

    assert!(left.has("k"));
    assert!(!right.has("k"));

    left.expire(["k"]);
    right.set("k", json!("right"));
    assert_eq!(right.probe("k"), Provenance::Hit);
    assert_eq!(left.probe("k"), Provenance::Stale);
}
