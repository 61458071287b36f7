use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::traits::CacheCapableStore;
use super::types::{
    oldest_keys, CacheEntry, CandidateFilter, CandidateRecord, LegacyEntry, LocationProfile,
};
use crate::utils::CacheResult;

/// In-process store backed by hash maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    profiles: RwLock<HashMap<String, LocationProfile>>,
    legacy: Option<RwLock<HashMap<String, LegacyEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that also keeps the legacy record shape
    pub fn with_legacy() -> Self {
        Self {
            legacy: Some(RwLock::new(HashMap::new())),
            ..Self::default()
        }
    }

    /// Snapshot of the stored keys, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn legacy_len(&self) -> usize {
        self.legacy.as_ref().map(|l| l.read().len()).unwrap_or(0)
    }
}

#[async_trait]
impl CacheCapableStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_by_key(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries.write().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn query_candidates(&self, filter: &CandidateFilter) -> CacheResult<Vec<CandidateRecord>> {
        Ok(filter.select(self.entries.read().values()))
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        let mut entries = self.entries.write();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn touch_accessed(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        match self.entries.write().get_mut(key) {
            Some(entry) => {
                entry.last_accessed = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_entries(&self) -> CacheResult<usize> {
        Ok(self.entries.read().len())
    }

    async fn least_recently_accessed(&self, limit: usize) -> CacheResult<Vec<String>> {
        let entries = self.entries.read();
        Ok(oldest_keys(
            entries.values().map(|e| (e.key.as_str(), e.last_accessed)),
            limit,
        ))
    }

    async fn upsert_location_profile(&self, profile: LocationProfile) -> CacheResult<()> {
        self.profiles
            .write()
            .insert(profile.location.clone(), profile);
        Ok(())
    }

    async fn get_location_profile(&self, location: &str) -> CacheResult<Option<LocationProfile>> {
        Ok(self.profiles.read().get(location).cloned())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.write().clear();
        self.profiles.write().clear();
        if let Some(legacy) = &self.legacy {
            legacy.write().clear();
        }
        Ok(())
    }

    fn supports_legacy(&self) -> bool {
        self.legacy.is_some()
    }

    async fn get_legacy(&self, key: &str) -> CacheResult<Option<LegacyEntry>> {
        Ok(self
            .legacy
            .as_ref()
            .and_then(|legacy| legacy.read().get(key).cloned()))
    }

    async fn upsert_legacy(&self, entry: LegacyEntry) -> CacheResult<()> {
        if let Some(legacy) = &self.legacy {
            legacy.write().insert(entry.key.clone(), entry);
        }
        Ok(())
    }

    async fn touch_legacy(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        let Some(legacy) = &self.legacy else {
            return Ok(false);
        };
        match legacy.write().get_mut(key) {
            Some(entry) => {
                entry.last_accessed = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn evict_legacy(&self, max_entries: usize) -> CacheResult<usize> {
        let Some(legacy) = &self.legacy else {
            return Ok(0);
        };
        let mut legacy = legacy.write();
        if legacy.len() <= max_entries {
            return Ok(0);
        }
        let excess = legacy.len() - max_entries;
        let victims = oldest_keys(
            legacy.values().map(|e| (e.key.as_str(), e.last_accessed)),
            excess,
        );
        for key in &victims {
            legacy.remove(key);
        }
        Ok(victims.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn entry(key: &str, accessed_secs: i64) -> CacheEntry {
        let at = Utc.timestamp_opt(1_700_000_000 + accessed_secs, 0).unwrap();
        CacheEntry {
            key: key.to_string(),
            location: "Madrid, Spain".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 14),
            feature_vector: "{}".to_string(),
            result: format!("result-{key}"),
            created_at: at,
            last_accessed: at,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryStore::new();
        store.upsert(entry("a", 1)).await.unwrap();

        let mut replacement = entry("a", 2);
        replacement.result = "fresh".to_string();
        store.upsert(replacement).await.unwrap();

        assert_eq!(store.count_entries().await.unwrap(), 1);
        let found = store.get_by_key("a").await.unwrap().unwrap();
        assert_eq!(found.result, "fresh");
    }

    #[tokio::test]
    async fn test_touch_and_lru_order() {
        let store = MemoryStore::new();
        for (key, secs) in [("a", 1), ("b", 2), ("c", 3)] {
            store.upsert(entry(key, secs)).await.unwrap();
        }

        let later = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        assert!(store.touch_accessed("a", later).await.unwrap());
        assert!(!store.touch_accessed("missing", later).await.unwrap());

        let order = store.least_recently_accessed(3).await.unwrap();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_delete_many_counts_existing() {
        let store = MemoryStore::new();
        store.upsert(entry("a", 1)).await.unwrap();
        store.upsert(entry("b", 2)).await.unwrap();

        let removed = store
            .delete_many(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.keys(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_legacy_shape_optional() {
        let plain = MemoryStore::new();
        assert!(!plain.supports_legacy());
        plain.upsert_legacy(entry("a", 1).to_legacy()).await.unwrap();
        assert!(plain.get_legacy("a").await.unwrap().is_none());

        let store = MemoryStore::with_legacy();
        for i in 0..5 {
            store.upsert_legacy(entry(&format!("k{i}"), i).to_legacy()).await.unwrap();
        }
        assert_eq!(store.evict_legacy(3).await.unwrap(), 2);
        assert_eq!(store.legacy_len(), 3);
        assert!(store.get_legacy("k0").await.unwrap().is_none());
        assert!(store.get_legacy("k4").await.unwrap().is_some());
    }
}
