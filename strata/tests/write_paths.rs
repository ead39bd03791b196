//! Write, evict and clear behavior: tier ordering, sentinel writes,
//! invalidation broadcasts, and clear modes.

mod common;

use std::sync::atomic::Ordering;

use common::{Published, User, ada, harness};
use strata::{CacheError, ClearMode, StrategyOverrides, TieredCacheConfig, null_token};

#[tokio::test]
async fn put_is_visible_to_the_next_get() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();

    cache.put("user_7", Some(&ada())).await.unwrap();
    let wrapper = cache.get::<User>("user_7").await.unwrap().unwrap();
    assert_eq!(wrapper.value(), Some(&ada()));

    // Real writes land in L2 with a randomized TTL around the 1h default.
    let entry = h.store.entry("user_info", "user_7").unwrap();
    assert!(entry.ttl_ms >= 3_240_000 && entry.ttl_ms <= 3_960_000);

    // Peers are told to drop their stale L1 entry, not handed the value.
    assert_eq!(
        h.publisher.messages(),
        vec![Published::Evict {
            cache: "user_info".to_string(),
            key: "user_7".to_string(),
        }]
    );
}

#[tokio::test]
async fn put_null_stores_sentinel_and_reads_as_cached_none() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();

    cache.put::<User>("user_404", None).await.unwrap();

    let entry = h.store.entry("user_info", "user_404").unwrap();
    assert_eq!(entry.value, null_token());
    assert_eq!(entry.ttl_ms, 60_000);

    // Wrapper of None, distinct from an outright miss.
    let wrapper = cache.get::<User>("user_404").await.unwrap();
    assert_eq!(wrapper.unwrap().value(), None);
    assert_eq!(cache.get::<User>("never_written").await.unwrap(), None);
}

#[tokio::test]
async fn put_if_absent_keeps_the_first_value() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();

    let first = cache.put_if_absent("user_7", Some(&ada())).await.unwrap();
    assert!(first.is_none(), "first store returns None");

    let other = User {
        id: "7".to_string(),
        name: "grace".to_string(),
    };
    let second = cache.put_if_absent("user_7", Some(&other)).await.unwrap();
    assert_eq!(second.unwrap().value(), Some(&ada()));

    // L2 still holds the first value.
    let entry = h.store.entry("user_info", "user_7").unwrap();
    let stored: User = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(stored, ada());

    // Only the storing call broadcast an EVICT.
    assert_eq!(
        h.publisher.messages(),
        vec![Published::Evict {
            cache: "user_info".to_string(),
            key: "user_7".to_string(),
        }]
    );
}

#[tokio::test]
async fn evict_drops_both_tiers_and_is_idempotent() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();
    cache.put("user_7", Some(&ada())).await.unwrap();

    cache.evict("user_7").await.unwrap();
    assert!(h.store.entry("user_info", "user_7").is_none());
    assert_eq!(cache.get::<User>("user_7").await.unwrap(), None);

    // A second evict changes nothing and still succeeds.
    cache.evict("user_7").await.unwrap();
    assert_eq!(cache.get::<User>("user_7").await.unwrap(), None);
}

#[tokio::test]
async fn evict_if_present_reports_existence_once() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();
    cache.put("user_7", Some(&ada())).await.unwrap();

    assert!(cache.evict_if_present("user_7").await.unwrap());
    assert!(!cache.evict_if_present("user_7").await.unwrap());
}

#[tokio::test]
async fn evict_if_present_sees_remote_only_entries() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();
    // Present in L2 only, as after a peer's write.
    h.store.insert_raw(
        "user_info",
        "user_7",
        serde_json::to_vec(&ada()).unwrap().into(),
        3_600_000,
    );

    assert!(cache.evict_if_present("user_7").await.unwrap());
    assert!(h.store.entry("user_info", "user_7").is_none());
}

#[tokio::test]
async fn safe_clear_leaves_the_remote_tier_alone() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("sys_config").unwrap();
    cache.put("a", Some(&1u32)).await.unwrap();
    cache.put("b", Some(&2u32)).await.unwrap();

    cache.clear().await.unwrap();

    // L2 untouched, CLEAR broadcast for the peers' L1s.
    assert_eq!(h.store.len("sys_config"), 2);
    assert_eq!(h.store.clear_count.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.publisher.messages().last(),
        Some(&Published::Clear {
            cache: "sys_config".to_string()
        })
    );

    // This process's L1 is empty: the next read goes to L2 and back-fills.
    let remote_gets = h.store.get_count.load(Ordering::SeqCst);
    let wrapper = cache.get::<u32>("a").await.unwrap().unwrap();
    assert_eq!(wrapper.value(), Some(&1));
    assert_eq!(h.store.get_count.load(Ordering::SeqCst), remote_gets + 1);
}

#[tokio::test]
async fn full_clear_removes_the_remote_hash() {
    let mut config = TieredCacheConfig::default();
    config.caches.insert(
        "short_lived".to_string(),
        StrategyOverrides {
            clear_mode: Some(ClearMode::Full),
            ..StrategyOverrides::default()
        },
    );
    let h = harness(config);
    let cache = h.manager.get_cache("short_lived").unwrap();
    cache.put("a", Some(&1u32)).await.unwrap();

    cache.clear().await.unwrap();

    assert!(!h.store.has_hash("short_lived"));
    assert_eq!(h.store.clear_count.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get::<u32>("a").await.unwrap(), None);
    assert_eq!(
        h.publisher.messages().last(),
        Some(&Published::Clear {
            cache: "short_lived".to_string()
        })
    );
}

#[tokio::test]
async fn invalidate_clears_and_reports_true() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();
    cache.put("user_7", Some(&ada())).await.unwrap();

    assert!(cache.invalidate().await.unwrap());
    // L1 was dropped: the next read has to go back to L2.
    let remote_gets = h.store.get_count.load(Ordering::SeqCst);
    cache.get::<User>("user_7").await.unwrap();
    assert_eq!(h.store.get_count.load(Ordering::SeqCst), remote_gets + 1);
}

#[tokio::test]
async fn typed_read_of_foreign_bytes_is_an_error_not_a_miss() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();
    cache.put("greeting", Some(&"hello".to_string())).await.unwrap();

    let result = cache.get::<User>("greeting").await;
    match result {
        Err(CacheError::TypeMismatch { key, .. }) => assert_eq!(key, "greeting"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn local_stats_track_hits_and_misses() {
    let h = harness(TieredCacheConfig::default());
    let cache = h.manager.get_cache("user_info").unwrap();

    assert_eq!(cache.get::<User>("user_7").await.unwrap(), None);
    cache.put("user_7", Some(&ada())).await.unwrap();
    cache.get::<User>("user_7").await.unwrap();
    cache.get::<User>("user_7").await.unwrap();

    let stats = cache.local_stats();
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.hit_count, 2);
}
