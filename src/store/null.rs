use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::traits::CacheCapableStore;
use super::types::{CacheEntry, CandidateFilter, CandidateRecord, LocationProfile};
use crate::utils::CacheResult;

/// Store used when no backend is configured: reads find nothing, writes are accepted and dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl CacheCapableStore for NullStore {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn get_by_key(&self, _key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(None)
    }

    async fn upsert(&self, _entry: CacheEntry) -> CacheResult<()> {
        Ok(())
    }

    async fn query_candidates(&self, _filter: &CandidateFilter) -> CacheResult<Vec<CandidateRecord>> {
        Ok(Vec::new())
    }

    async fn delete_many(&self, _keys: &[String]) -> CacheResult<usize> {
        Ok(0)
    }

    async fn touch_accessed(&self, _key: &str, _at: DateTime<Utc>) -> CacheResult<bool> {
        Ok(false)
    }

    async fn count_entries(&self) -> CacheResult<usize> {
        Ok(0)
    }

    async fn least_recently_accessed(&self, _limit: usize) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn upsert_location_profile(&self, _profile: LocationProfile) -> CacheResult<()> {
        Ok(())
    }

    async fn get_location_profile(&self, _location: &str) -> CacheResult<Option<LocationProfile>> {
        Ok(None)
    }

    async fn clear(&self) -> CacheResult<()> {
        Ok(())
    }
}
