use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::query::{city_token, normalize_text, Query};

/// Persisted unit of the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Exact-match composite key
    pub key: String,
    /// Denormalized query location, used for candidate pre-filtering
    pub location: String,
    /// Denormalized query date, used for candidate pre-filtering
    pub date: Option<NaiveDate>,
    /// Serialized `FeatureVector` (JSON)
    pub feature_vector: String,
    /// Opaque serialized result owned by the cache
    pub result: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    /// Metadata view used during candidate scoring
    pub fn candidate(&self) -> CandidateRecord {
        CandidateRecord {
            key: self.key.clone(),
            location: self.location.clone(),
            date: self.date,
            feature_vector: self.feature_vector.clone(),
            last_accessed: self.last_accessed,
        }
    }

    /// The older record shape without a feature vector
    pub fn to_legacy(&self) -> LegacyEntry {
        LegacyEntry {
            key: self.key.clone(),
            location: self.location.clone(),
            date: self.date,
            result: self.result.clone(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }
}

/// Candidate metadata without the result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub key: String,
    pub location: String,
    pub date: Option<NaiveDate>,
    pub feature_vector: String,
    pub last_accessed: DateTime<Utc>,
}

/// Simple cache record shape kept for stores written by older deployments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyEntry {
    pub key: String,
    pub location: String,
    pub date: Option<NaiveDate>,
    pub result: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Coarse geographic metadata cached per raw location string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationProfile {
    pub location: String,
    pub city: String,
    pub country: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LocationProfile {
    /// Derive a profile from "City, Region, Country" style text
    pub fn from_location(location: &str, now: DateTime<Utc>) -> Self {
        let parts: Vec<&str> = location
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            location: location.to_string(),
            city: parts.first().map(|s| s.to_string()).unwrap_or_default(),
            country: if parts.len() > 1 {
                parts.last().map(|s| s.to_string())
            } else {
                None
            },
            updated_at: now,
        }
    }
}

/// Coarse location/date pre-filter applied before full scoring
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFilter {
    /// Normalized query location
    pub location: String,
    /// Normalized leading city token of the query location
    pub city_token: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub limit: usize,
}

impl CandidateFilter {
    /// Build the filter for a query; `None` when the query date is unusable
    pub fn for_query(query: &Query, date_range_days: i64, limit: usize) -> Option<Self> {
        let date = query.parsed_date()?;
        let range = chrono::Duration::days(date_range_days.max(0));
        Some(Self {
            location: normalize_text(&query.location),
            city_token: city_token(&query.location),
            date_from: date - range,
            date_to: date + range,
            limit,
        })
    }

    /// Whether a stored location/date pair passes the pre-filter
    pub fn matches(&self, location: &str, date: Option<NaiveDate>) -> bool {
        let Some(date) = date else {
            return false;
        };
        if date < self.date_from || date > self.date_to {
            return false;
        }

        let stored = normalize_text(location);
        stored == self.location || (!self.city_token.is_empty() && stored.contains(&self.city_token))
    }

    /// Filter, order by recency (most recent first) and cap
    pub fn select<'a, I>(&self, entries: I) -> Vec<CandidateRecord>
    where
        I: IntoIterator<Item = &'a CacheEntry>,
    {
        let mut selected: Vec<CandidateRecord> = entries
            .into_iter()
            .filter(|e| self.matches(&e.location, e.date))
            .map(CacheEntry::candidate)
            .collect();
        sort_by_recency(&mut selected);
        selected.truncate(self.limit);
        selected
    }
}

/// Most recently accessed first; key breaks ties so ordering is stable
pub(crate) fn sort_by_recency(records: &mut [CandidateRecord]) {
    records.sort_by(|a, b| {
        b.last_accessed
            .cmp(&a.last_accessed)
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Keys ordered least recently accessed first
pub(crate) fn oldest_keys<'a, I>(entries: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, DateTime<Utc>)>,
{
    let mut all: Vec<(&str, DateTime<Utc>)> = entries.into_iter().collect();
    all.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    all.into_iter()
        .take(limit)
        .map(|(key, _)| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(key: &str, location: &str, date: &str, accessed_secs: i64) -> CacheEntry {
        let at = Utc.timestamp_opt(1_700_000_000 + accessed_secs, 0).unwrap();
        CacheEntry {
            key: key.to_string(),
            location: location.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            feature_vector: "{}".to_string(),
            result: "[]".to_string(),
            created_at: at,
            last_accessed: at,
        }
    }

    #[test]
    fn test_filter_location_rules() {
        let query = Query::new("Madrid, Spain", "2025-05-14", vec![6]);
        let filter = CandidateFilter::for_query(&query, 14, 10).unwrap();

        assert!(filter.matches("madrid, spain", NaiveDate::from_ymd_opt(2025, 5, 14)));
        assert!(filter.matches("Madrid", NaiveDate::from_ymd_opt(2025, 5, 20)));
        assert!(filter.matches("Central Madrid, ES", NaiveDate::from_ymd_opt(2025, 5, 1)));
        assert!(!filter.matches("Oslo, Norway", NaiveDate::from_ymd_opt(2025, 5, 14)));
        assert!(!filter.matches("Madrid", None));
    }

    #[test]
    fn test_filter_date_window_inclusive() {
        let query = Query::new("Madrid", "2025-05-14", vec![6]);
        let filter = CandidateFilter::for_query(&query, 14, 10).unwrap();

        assert!(filter.matches("Madrid", NaiveDate::from_ymd_opt(2025, 4, 30)));
        assert!(filter.matches("Madrid", NaiveDate::from_ymd_opt(2025, 5, 28)));
        assert!(!filter.matches("Madrid", NaiveDate::from_ymd_opt(2025, 4, 29)));
        assert!(!filter.matches("Madrid", NaiveDate::from_ymd_opt(2025, 5, 29)));
    }

    #[test]
    fn test_filter_requires_valid_date() {
        let query = Query::new("Madrid", "not-a-date", vec![6]);
        assert!(CandidateFilter::for_query(&query, 14, 10).is_none());
    }

    #[test]
    fn test_select_orders_by_recency_and_caps() {
        let query = Query::new("Madrid", "2025-05-14", vec![6]);
        let filter = CandidateFilter::for_query(&query, 14, 2).unwrap();
        let entries = vec![
            entry("old", "Madrid", "2025-05-10", 10),
            entry("newest", "Madrid", "2025-05-12", 30),
            entry("middle", "Madrid", "2025-05-13", 20),
            entry("elsewhere", "Oslo", "2025-05-13", 40),
        ];

        let keys: Vec<String> = filter.select(&entries).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["newest", "middle"]);
    }

    #[test]
    fn test_oldest_keys() {
        let entries = vec![
            entry("b", "Madrid", "2025-05-10", 20),
            entry("a", "Madrid", "2025-05-10", 10),
            entry("c", "Madrid", "2025-05-10", 30),
        ];
        let keys = oldest_keys(entries.iter().map(|e| (e.key.as_str(), e.last_accessed)), 2);
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_location_profile() {
        let now = Utc::now();
        let profile = LocationProfile::from_location("Madrid, Community of Madrid, Spain", now);
        assert_eq!(profile.city, "Madrid");
        assert_eq!(profile.country.as_deref(), Some("Spain"));

        let bare = LocationProfile::from_location("Oslo", now);
        assert_eq!(bare.city, "Oslo");
        assert_eq!(bare.country, None);
    }
}
