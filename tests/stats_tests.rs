#![cfg(feature = "stats")]

use std::time::Duration;

use serial_test::serial;

use memolito::{memoize, stats_registry, Memo};

#[test]
fn test_engine_counts_hits_and_misses() {
    let memo = memoize(|n: u32| n, Duration::from_secs(60));

    memo.call(1); // miss
    memo.call(1); // hit
    memo.call(2); // miss
    memo.cached_value(&1); // hit
    memo.cached_value(&3); // miss

    assert_eq!(memo.stats().hits(), 2);
    assert_eq!(memo.stats().misses(), 3);
    assert_eq!(memo.stats().total_accesses(), 5);
}

#[test]
fn test_disabled_caching_records_nothing() {
    let memo = memoize(|n: u32| n, Duration::ZERO);

    memo.call(1);
    memo.call(1);

    assert_eq!(memo.stats().total_accesses(), 0);
}

#[test]
#[serial]
fn test_named_engine_registers_stats() {
    let memo = Memo::builder(|n: u32| n * 2)
        .ttl(Duration::from_secs(60))
        .name("stats_tests_doubler")
        .build();

    memo.call(1);
    memo.call(1);
    memo.call(2);

    let stats = stats_registry::get("stats_tests_doubler").expect("registered at build time");
    assert_eq!(stats.hits(), 1);
    assert_eq!(stats.misses(), 2);
    assert!(stats_registry::list().contains(&"stats_tests_doubler".to_string()));

    assert!(stats_registry::unregister("stats_tests_doubler"));
    assert!(stats_registry::get("stats_tests_doubler").is_none());
}

#[test]
#[serial]
fn test_registry_tracks_multiple_engines() {
    let first = Memo::builder(|n: u32| n)
        .ttl(Duration::from_secs(60))
        .name("stats_tests_first")
        .build();
    let second = Memo::builder(|n: u32| n)
        .ttl(Duration::from_secs(60))
        .name("stats_tests_second")
        .build();

    first.call(1);
    second.call(1);
    second.call(1);

    let first_stats = stats_registry::get("stats_tests_first").unwrap();
    let second_stats = stats_registry::get("stats_tests_second").unwrap();
    assert_eq!(first_stats.total_accesses(), 1);
    assert_eq!(second_stats.total_accesses(), 2);
    assert_eq!(second_stats.hits(), 1);

    stats_registry::unregister("stats_tests_first");
    stats_registry::unregister("stats_tests_second");
}

#[tokio::test]
#[serial]
async fn test_async_engine_registers_stats() {
    let memo = memolito::AsyncMemo::builder(|n: u32| async move { Ok::<_, String>(n) })
        .ttl(Duration::from_secs(60))
        .name("stats_tests_async")
        .build();

    memo.call(1).await.unwrap();
    memo.call(1).await.unwrap();

    let stats = stats_registry::get("stats_tests_async").unwrap();
    assert_eq!(stats.misses(), 1);
    assert_eq!(stats.hits(), 1);

    stats_registry::unregister("stats_tests_async");
}
