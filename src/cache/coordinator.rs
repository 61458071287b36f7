use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::selector::CandidateSelector;
use super::stats::{CacheStats, CacheStatsSnapshot};
use super::types::{CacheHit, CacheLookup, HitType, PutOutcome};
use crate::app::{CacheConfig, Config};
use crate::features::{haversine_km, FeatureNormalizer, FeatureVector, LocationLookup};
use crate::query::{cache_key, Query};
use crate::scoring::SimilarityScorer;
use crate::store::{CacheCapableStore, CacheEntry, CandidateRecord, LocationProfile, NullStore};
use crate::utils::{CacheError, CacheResult};

/// Best fuzzy candidate found during a lookup
struct BestMatch {
    key: String,
    similarity: f64,
}

/// Orchestrates exact and fuzzy lookups and write-through with eviction.
///
/// The cache is an optimization layer: no store failure ever reaches the
/// caller. Lookups degrade to a miss and writes are logged and dropped.
pub struct CacheCoordinator {
    store: Arc<dyn CacheCapableStore>,
    normalizer: FeatureNormalizer,
    scorer: SimilarityScorer,
    selector: CandidateSelector,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CacheCoordinator {
    /// Create a coordinator over `store` with neutral location lookup
    pub fn new(store: Arc<dyn CacheCapableStore>, config: &Config) -> Self {
        Self {
            store,
            normalizer: FeatureNormalizer::default(),
            scorer: SimilarityScorer::new(config.scoring_params()),
            selector: CandidateSelector::new(
                config.cache.date_range_days,
                config.cache.max_candidates,
            ),
            config: config.cache.clone(),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Coordinator that never caches anything
    pub fn disabled(config: &Config) -> Self {
        Self::new(Arc::new(NullStore), config)
    }

    /// Use a real location lookup; enables the distance gate
    pub fn with_location_lookup(mut self, lookup: Arc<dyn LocationLookup>) -> Self {
        self.normalizer = FeatureNormalizer::new(lookup);
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheCapableStore> {
        &self.store
    }

    pub fn normalizer(&self) -> &FeatureNormalizer {
        &self.normalizer
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Look up a query: exact key first, then the best fuzzy candidate
    pub async fn get(&self, query: &Query) -> CacheLookup {
        match self.try_get(query).await {
            Ok(CacheLookup::Hit(hit)) => {
                match hit.hit_type {
                    HitType::Exact => self.stats.record_exact_hit(),
                    HitType::Fuzzy => self.stats.record_fuzzy_hit(),
                }
                CacheLookup::Hit(hit)
            }
            Ok(CacheLookup::Miss) => {
                self.stats.record_miss();
                CacheLookup::Miss
            }
            Err(e) => {
                warn!("Cache lookup failed on {} store, treating as miss: {}", self.store.name(), e);
                self.stats.record_store_error();
                self.stats.record_miss();
                CacheLookup::Miss
            }
        }
    }

    /// Like [`get`](Self::get) but resolves to a miss as soon as `cancel` fires
    pub async fn get_cancellable(&self, query: &Query, cancel: &CancellationToken) -> CacheLookup {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cache lookup for '{}' cancelled", query.location);
                self.stats.record_miss();
                CacheLookup::Miss
            }
            lookup = self.get(query) => lookup,
        }
    }

    /// Store a freshly computed result; failures are logged and swallowed
    pub async fn put(&self, query: &Query, result: impl Into<String>) -> PutOutcome {
        let key = cache_key(query);
        match self.try_put(query, &key, result.into()).await {
            Ok(evicted) => {
                self.stats.record_write();
                PutOutcome {
                    key,
                    stored: true,
                    evicted,
                }
            }
            Err(e) => {
                warn!("Failed to cache result for '{}': {}", query.location, e);
                self.stats.record_failed_write();
                self.stats.record_store_error();
                PutOutcome {
                    key,
                    stored: false,
                    evicted: 0,
                }
            }
        }
    }

    /// Serve from cache, or run `compute` and cache its result.
    ///
    /// Only the compute error is ever returned.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        query: &Query,
        compute: F,
    ) -> Result<(String, Option<CacheHit>), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let CacheLookup::Hit(hit) = self.get(query).await {
            return Ok((hit.result.clone(), Some(hit)));
        }

        let result = compute().await?;
        self.put(query, result.clone()).await;
        Ok((result, None))
    }

    /// Number of primary entries currently stored
    pub async fn entry_count(&self) -> CacheResult<usize> {
        self.bounded("count_entries", self.store.count_entries()).await
    }

    /// Drop everything from the backing store
    pub async fn clear(&self) -> CacheResult<()> {
        self.bounded("clear", self.store.clear()).await
    }

    async fn try_get(&self, query: &Query) -> CacheResult<CacheLookup> {
        let key = cache_key(query);

        if let Some(hit) = self.exact_lookup(&key).await? {
            info!("Exact cache hit for '{}' on {}", query.location, query.date);
            return Ok(CacheLookup::Hit(hit));
        }

        let vector = self.normalizer.normalize(query);
        let candidates = self
            .bounded(
                "query_candidates",
                self.selector.find_candidates(self.store.as_ref(), query),
            )
            .await?;

        let Some(best) = self.best_candidate(query, &vector, &candidates) else {
            debug!("No scorable candidates for '{}'", query.location);
            return Ok(CacheLookup::Miss);
        };

        if best.similarity < self.config.min_similarity {
            debug!(
                "Best candidate {} scored {:.4}, below threshold {:.4}",
                best.key, best.similarity, self.config.min_similarity
            );
            return Ok(CacheLookup::Miss);
        }

        // Candidates carry no payload; fetch the winner in full
        let entry = match self.bounded("get_by_key", self.store.get_by_key(&best.key)).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Fuzzy candidate {} vanished before it could be served", best.key);
                return Ok(CacheLookup::Miss);
            }
            Err(e @ CacheError::MalformedEntry { .. }) => {
                warn!("Skipping malformed fuzzy candidate: {}", e);
                self.stats.record_malformed();
                return Ok(CacheLookup::Miss);
            }
            Err(e) => return Err(e),
        };

        self.touch(&entry.key).await;
        info!(
            "Fuzzy cache hit for '{}' on {} (similarity {:.3})",
            query.location, query.date, best.similarity
        );
        Ok(CacheLookup::Hit(CacheHit {
            key: entry.key,
            result: entry.result,
            hit_type: HitType::Fuzzy,
            similarity: best.similarity,
        }))
    }

    /// Primary shape first, then the legacy shape when the store keeps one
    async fn exact_lookup(&self, key: &str) -> CacheResult<Option<CacheHit>> {
        match self.bounded("get_by_key", self.store.get_by_key(key)).await {
            Ok(Some(entry)) => {
                self.touch(key).await;
                return Ok(Some(CacheHit {
                    key: entry.key,
                    result: entry.result,
                    hit_type: HitType::Exact,
                    similarity: 1.0,
                }));
            }
            Ok(None) => {}
            Err(e @ CacheError::MalformedEntry { .. }) => {
                warn!("Ignoring malformed exact entry: {}", e);
                self.stats.record_malformed();
            }
            Err(e) => return Err(e),
        }

        if !self.store.supports_legacy() {
            return Ok(None);
        }

        match self.bounded("get_legacy", self.store.get_legacy(key)).await {
            Ok(Some(legacy)) => {
                self.touch_legacy(key).await;
                Ok(Some(CacheHit {
                    key: legacy.key,
                    result: legacy.result,
                    hit_type: HitType::Exact,
                    similarity: 1.0,
                }))
            }
            Ok(None) => Ok(None),
            Err(e @ CacheError::MalformedEntry { .. }) => {
                warn!("Ignoring malformed legacy entry: {}", e);
                self.stats.record_malformed();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Highest-scoring candidate; the first one wins a tie
    fn best_candidate(
        &self,
        query: &Query,
        vector: &FeatureVector,
        candidates: &[CandidateRecord],
    ) -> Option<BestMatch> {
        let query_place = self.normalizer.locate(&query.location);
        let mut best: Option<BestMatch> = None;

        for candidate in candidates {
            let stored = match FeatureVector::from_json(&candidate.feature_vector) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Skipping candidate {} with malformed feature vector: {}", candidate.key, e);
                    self.stats.record_malformed();
                    continue;
                }
            };
            if stored.version != vector.version {
                debug!(
                    "Skipping candidate {} with feature version {} (current {})",
                    candidate.key, stored.version, vector.version
                );
                self.stats.record_stale();
                continue;
            }

            let distance_km = query_place.as_ref().and_then(|here| {
                self.normalizer
                    .locate(&candidate.location)
                    .map(|there| haversine_km(here, &there))
            });

            let breakdown = self.scorer.breakdown(vector, &stored, distance_km);
            debug!(
                "Candidate {} scored {:.4} (location {:?}, weather {:.3}, temporal {:.3}, demographic {:.3})",
                candidate.key,
                breakdown.total,
                breakdown.location,
                breakdown.weather,
                breakdown.temporal,
                breakdown.demographic
            );

            let is_better = best
                .as_ref()
                .map_or(true, |current| breakdown.total > current.similarity);
            if is_better {
                best = Some(BestMatch {
                    key: candidate.key.clone(),
                    similarity: breakdown.total,
                });
            }
        }

        best
    }

    async fn try_put(&self, query: &Query, key: &str, result: String) -> CacheResult<usize> {
        let vector = self.normalizer.normalize(query);
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            location: query.location.trim().to_string(),
            date: query.parsed_date(),
            feature_vector: vector.to_json()?,
            result,
            created_at: now,
            last_accessed: now,
        };

        let legacy = (self.config.write_legacy_shape && self.store.supports_legacy())
            .then(|| entry.to_legacy());

        self.bounded("upsert", self.store.upsert(entry)).await?;
        debug!("Cached result for '{}' under {}", query.location, key);

        if let Some(legacy) = legacy {
            if let Err(e) = self.write_legacy(legacy).await {
                warn!("Failed to write legacy cache record: {}", e);
                self.stats.record_store_error();
            }
        }

        let profile = LocationProfile::from_location(query.location.trim(), now);
        if let Err(e) = self
            .bounded("upsert_location_profile", self.store.upsert_location_profile(profile))
            .await
        {
            warn!("Failed to update location profile for '{}': {}", query.location, e);
            self.stats.record_store_error();
        }

        self.evict().await
    }

    async fn write_legacy(&self, legacy: crate::store::LegacyEntry) -> CacheResult<()> {
        self.bounded("upsert_legacy", self.store.upsert_legacy(legacy))
            .await?;
        let removed = self
            .bounded(
                "evict_legacy",
                self.store.evict_legacy(self.config.legacy_max_entries),
            )
            .await?;
        if removed > 0 {
            debug!("Evicted {} legacy record(s)", removed);
        }
        Ok(())
    }

    /// Delete least recently accessed entries until the store is within capacity
    async fn evict(&self) -> CacheResult<usize> {
        let count = self.bounded("count_entries", self.store.count_entries()).await?;
        if count <= self.config.max_entries {
            return Ok(0);
        }

        let excess = count - self.config.max_entries;
        let victims = self
            .bounded(
                "least_recently_accessed",
                self.store.least_recently_accessed(excess),
            )
            .await?;
        let removed = self
            .bounded("delete_many", self.store.delete_many(&victims))
            .await?;

        self.stats.record_evictions(removed);
        info!(
            "Evicted {} least recently used entr{} ({} over capacity {})",
            removed,
            if removed == 1 { "y" } else { "ies" },
            excess,
            self.config.max_entries
        );
        Ok(removed)
    }

    /// Refresh recency; a failed touch never fails the lookup
    async fn touch(&self, key: &str) {
        match self
            .bounded("touch_accessed", self.store.touch_accessed(key, Utc::now()))
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("Entry {} disappeared before its recency could be refreshed", key),
            Err(e) => {
                warn!("Failed to refresh recency for {}: {}", key, e);
                self.stats.record_store_error();
            }
        }
    }

    async fn touch_legacy(&self, key: &str) {
        match self
            .bounded("touch_legacy", self.store.touch_legacy(key, Utc::now()))
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("Legacy record {} disappeared before its recency could be refreshed", key),
            Err(e) => {
                warn!("Failed to refresh legacy recency for {}: {}", key, e);
                self.stats.record_store_error();
            }
        }
    }

    /// Bound a store call by the configured timeout
    async fn bounded<T, F>(&self, operation: &str, call: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        if self.config.store_timeout_ms == 0 {
            return call.await;
        }

        let limit = Duration::from_millis(self.config.store_timeout_ms);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::StoreUnavailable(format!(
                "{} on {} store timed out after {}ms",
                operation,
                self.store.name(),
                self.config.store_timeout_ms
            ))),
        }
    }
}
