use tracing::debug;

use crate::query::Query;
use crate::store::{CacheCapableStore, CandidateFilter, CandidateRecord};
use crate::utils::CacheResult;

/// Cheap location/date pre-filter run before full similarity scoring.
///
/// Keeps scoring cost proportional to a small candidate set. A valid match
/// whose location shares no city token with the query, or whose date lies
/// outside the window, is never considered.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector {
    date_range_days: i64,
    max_candidates: usize,
}

impl CandidateSelector {
    pub fn new(date_range_days: i64, max_candidates: usize) -> Self {
        Self {
            date_range_days,
            max_candidates,
        }
    }

    /// Filter the store should apply; `None` when the query has no usable date
    pub fn filter_for(&self, query: &Query) -> Option<CandidateFilter> {
        CandidateFilter::for_query(query, self.date_range_days, self.max_candidates)
    }

    /// Candidates for a query, most recently accessed first
    pub async fn find_candidates(
        &self,
        store: &dyn CacheCapableStore,
        query: &Query,
    ) -> CacheResult<Vec<CandidateRecord>> {
        let Some(filter) = self.filter_for(query) else {
            debug!("No candidate search for '{}': unusable date '{}'", query.location, query.date);
            return Ok(Vec::new());
        };
        if filter.limit == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = store.query_candidates(&filter).await?;
        // Stores are asked to cap, but never trust them to
        candidates.truncate(filter.limit);
        debug!(
            "{} candidate(s) for '{}' between {} and {}",
            candidates.len(),
            query.location,
            filter.date_from,
            filter.date_to
        );
        Ok(candidates)
    }
}
