use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{CacheEntry, CandidateFilter, CandidateRecord, LegacyEntry, LocationProfile};
use crate::utils::CacheResult;

/// Operations the cache needs from a backing store.
///
/// Any key-value, document or graph store that can provide these is
/// sufficient. Upserts and deletes must be idempotent; no multi-entry
/// atomicity is required.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheCapableStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Look up an entry by its exact key
    async fn get_by_key(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Insert or replace an entry by key
    async fn upsert(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Entries passing the filter, most recently accessed first, capped at `filter.limit`
    async fn query_candidates(&self, filter: &CandidateFilter) -> CacheResult<Vec<CandidateRecord>>;

    /// Delete entries by key, returning how many existed
    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize>;

    /// Set `last_accessed`; returns false when the key no longer exists
    async fn touch_accessed(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool>;

    async fn count_entries(&self) -> CacheResult<usize>;

    /// Keys ordered least recently accessed first
    async fn least_recently_accessed(&self, limit: usize) -> CacheResult<Vec<String>>;

    async fn upsert_location_profile(&self, profile: LocationProfile) -> CacheResult<()>;

    async fn get_location_profile(&self, location: &str) -> CacheResult<Option<LocationProfile>>;

    /// Remove every entry, legacy record and profile
    async fn clear(&self) -> CacheResult<()>;

    /// Whether the store also keeps the legacy record shape
    fn supports_legacy(&self) -> bool {
        false
    }

    async fn get_legacy(&self, _key: &str) -> CacheResult<Option<LegacyEntry>> {
        Ok(None)
    }

    async fn upsert_legacy(&self, _entry: LegacyEntry) -> CacheResult<()> {
        Ok(())
    }

    /// Set `last_accessed` on a legacy record; returns false when it no longer exists
    async fn touch_legacy(&self, _key: &str, _at: DateTime<Utc>) -> CacheResult<bool> {
        Ok(false)
    }

    /// Trim legacy records to `max_entries` by recency, returning how many were removed
    async fn evict_legacy(&self, _max_entries: usize) -> CacheResult<usize> {
        Ok(0)
    }
}
