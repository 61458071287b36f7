use std::sync::Arc;
use std::time::Duration;

use activity_cache::{
    cache_key,
    features::{LocationFeatures, StaticLocationLookup},
    CacheCapableStore, CacheCoordinator, CacheLookup, Config, FeatureVector, FileStore, HitType,
    MemoryStore, Query,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn madrid() -> Query {
    Query::new("Madrid, Spain", "2025-05-14", vec![6, 9]).with_weather(18.0, 24.0, 10.0)
}

fn madrid_two_days_later() -> Query {
    Query::new("Madrid, Spain", "2025-05-16", vec![7, 9]).with_weather(19.0, 23.0, 8.0)
}

fn oslo() -> Query {
    Query::new("Oslo, Norway", "2025-05-14", vec![6, 9]).with_weather(18.0, 24.0, 10.0)
}

fn city(i: usize) -> Query {
    Query::new(format!("Town {i}"), "2025-06-01", vec![5])
}

fn gazetteer() -> StaticLocationLookup {
    let place = |lat: f64, lon: f64, code: &str| LocationFeatures {
        latitude: lat,
        longitude: lon,
        city_size: 0.8,
        is_coastal: false,
        population: 1_000_000,
        country_code: Some(code.to_string()),
    };
    StaticLocationLookup::new()
        .with_place("Madrid", place(40.4168, -3.7038, "ES"))
        .with_place("Oslo", place(59.9139, 10.7522, "NO"))
}

fn config_with_capacity(max_entries: usize) -> Config {
    let mut config = Config::default();
    config.cache.max_entries = max_entries;
    config
}

async fn tick() {
    // Keep last_accessed timestamps strictly ordered between operations
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn madrid_scenario_fuzzy_hit_then_oslo_miss() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheCoordinator::new(store.clone(), &Config::default())
        .with_location_lookup(Arc::new(gazetteer()));

    assert_eq!(cache.get(&madrid()).await, CacheLookup::Miss);
    cache.put(&madrid(), r#"{"activities":["Retiro Park"]}"#).await;

    let hit = cache
        .get(&madrid_two_days_later())
        .await
        .into_hit()
        .expect("similar Madrid query should hit");
    assert_eq!(hit.hit_type, HitType::Fuzzy);
    assert!(hit.similarity >= 0.90, "similarity {}", hit.similarity);
    assert_eq!(hit.result, r#"{"activities":["Retiro Park"]}"#);

    let before = store.count_entries().await.unwrap();
    assert_eq!(cache.get(&oslo()).await, CacheLookup::Miss);
    let outcome = cache.put(&oslo(), r#"{"activities":["Vigeland Park"]}"#).await;
    assert!(outcome.stored);
    assert_eq!(store.count_entries().await.unwrap(), before + 1);
}

#[tokio::test]
async fn madrid_scenario_without_geocoding() {
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &Config::default());
    cache.put(&madrid(), "cached").await;

    let hit = cache.get(&madrid_two_days_later()).await.into_hit().unwrap();
    assert_eq!(hit.hit_type, HitType::Fuzzy);
    assert!(hit.similarity >= 0.90);
    assert_eq!(cache.get(&oslo()).await, CacheLookup::Miss);
}

#[tokio::test]
async fn equivalent_queries_share_a_key() {
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &Config::default());
    let original = Query::new("Madrid, Spain", "2025-05-14", vec![8, 5]);
    let variant = Query::new("madrid, spain ", "2025-05-14", vec![5, 8]);
    assert_eq!(cache_key(&original), cache_key(&variant));

    cache.put(&original, "result").await;
    let hit = cache.get(&variant).await.into_hit().unwrap();
    assert_eq!(hit.hit_type, HitType::Exact);
}

#[tokio::test]
async fn exact_match_takes_precedence() {
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &Config::default());

    cache.put(&madrid(), "exact result").await;
    tick().await;
    // Identical features under a different key, and more recently accessed
    cache
        .put(&madrid().with_provider("another/model"), "fuzzy result")
        .await;

    let hit = cache.get(&madrid()).await.into_hit().unwrap();
    assert_eq!(hit.hit_type, HitType::Exact);
    assert_eq!(hit.similarity, 1.0);
    assert_eq!(hit.result, "exact result");
}

#[tokio::test]
async fn threshold_is_inclusive() {
    let probe = CacheCoordinator::new(Arc::new(MemoryStore::new()), &Config::default());
    let normalizer = probe.normalizer();
    // Stored vectors come back from JSON, so score against the decoded form
    let stored = FeatureVector::from_json(&normalizer.normalize(&madrid()).to_json().unwrap()).unwrap();
    let score = probe
        .scorer()
        .score(&normalizer.normalize(&madrid_two_days_later()), &stored, None);

    let mut at_threshold = Config::default();
    at_threshold.cache.min_similarity = score;
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &at_threshold);
    cache.put(&madrid(), "cached").await;
    let hit = cache.get(&madrid_two_days_later()).await.into_hit().unwrap();
    assert_eq!(hit.similarity, score);

    let mut above = Config::default();
    above.cache.min_similarity = score + 1e-6;
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &above);
    cache.put(&madrid(), "cached").await;
    assert_eq!(cache.get(&madrid_two_days_later()).await, CacheLookup::Miss);
}

#[tokio::test]
async fn eviction_removes_least_recently_accessed() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheCoordinator::new(store.clone(), &config_with_capacity(3));

    let mut evicted = 0;
    for i in 0..5 {
        evicted += cache.put(&city(i), format!("result {i}")).await.evicted;
        tick().await;
    }

    assert_eq!(evicted, 2);
    assert_eq!(store.count_entries().await.unwrap(), 3);
    for i in 0..2 {
        assert!(store.get_by_key(&cache_key(&city(i))).await.unwrap().is_none());
    }
    for i in 2..5 {
        assert!(store.get_by_key(&cache_key(&city(i))).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn touched_entries_survive_eviction() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheCoordinator::new(store.clone(), &config_with_capacity(3));

    for i in 0..3 {
        cache.put(&city(i), format!("result {i}")).await;
        tick().await;
    }

    // Oldest by creation, but freshest by access
    assert!(cache.get(&city(0)).await.is_hit());
    tick().await;
    cache.put(&city(3), "result 3").await;

    assert_eq!(store.count_entries().await.unwrap(), 3);
    assert!(store.get_by_key(&cache_key(&city(0))).await.unwrap().is_some());
    assert!(store.get_by_key(&cache_key(&city(1))).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_puts_for_one_key_last_write_wins() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheCoordinator::new(store.clone(), &Config::default()));

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.put(&madrid(), format!("result {i}")).await })
        })
        .collect();
    for writer in writers {
        assert!(writer.await.unwrap().stored);
    }

    assert_eq!(store.count_entries().await.unwrap(), 1);
    let hit = cache.get(&madrid()).await.into_hit().unwrap();
    assert!(hit.result.starts_with("result "));
}

#[tokio::test]
async fn concurrent_gets_all_hit() {
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()), &Config::default());
    cache.put(&madrid(), "cached").await;

    let queries = vec![madrid(), madrid_two_days_later(), madrid(), madrid_two_days_later()];
    let lookups = futures::future::join_all(queries.iter().map(|q| cache.get(q))).await;

    assert!(lookups.iter().all(CacheLookup::is_hit));
    assert_eq!(cache.stats().exact_hits, 2);
    assert_eq!(cache.stats().fuzzy_hits, 2);
}

#[tokio::test]
async fn file_store_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let cache = CacheCoordinator::new(store.clone(), &config_with_capacity(2));

    cache.put(&madrid(), "madrid").await;
    tick().await;
    cache.put(&oslo(), "oslo").await;
    tick().await;

    assert_eq!(
        cache.get(&madrid_two_days_later()).await.into_hit().unwrap().result,
        "madrid"
    );
    tick().await;

    // Oslo is now the least recently accessed entry
    cache.put(&city(1), "town").await;
    assert_eq!(store.count_entries().await.unwrap(), 2);
    assert_eq!(cache.get(&oslo()).await, CacheLookup::Miss);

    // A fresh coordinator over the same directory sees the persisted entries
    let reopened = CacheCoordinator::new(
        Arc::new(FileStore::open(dir.path()).unwrap()),
        &config_with_capacity(2),
    );
    let hit = reopened.get(&madrid()).await.into_hit().unwrap();
    assert_eq!(hit.hit_type, HitType::Exact);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_store_concurrent_puts_for_one_key_all_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let cache = Arc::new(CacheCoordinator::new(store.clone(), &Config::default()));

    for round in 0..10 {
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.put(&madrid(), format!("round {round} writer {i}")).await })
            })
            .collect();
        for writer in writers {
            assert!(writer.await.unwrap().stored);
        }
    }

    assert_eq!(store.count_entries().await.unwrap(), 1);
    let hit = cache.get(&madrid()).await.into_hit().unwrap();
    assert!(hit.result.starts_with("round 9 writer "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_store_get_racing_put_keeps_newest_result() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let cache = Arc::new(CacheCoordinator::new(store.clone(), &Config::default()));

    for round in 0..50 {
        cache.put(&madrid(), "old").await;

        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&madrid()).await })
        };
        let outcome = cache.put(&madrid(), format!("new {round}")).await;
        assert!(outcome.stored);
        reader.await.unwrap();

        let stored = store.get_by_key(&outcome.key).await.unwrap().unwrap();
        assert_eq!(stored.result, format!("new {round}"));
    }
}
