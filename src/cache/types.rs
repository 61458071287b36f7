use serde::{Deserialize, Serialize};

/// How a lookup was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
    Exact,
    Fuzzy,
}

/// A cached result returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHit {
    /// Key of the entry that was served
    pub key: String,
    pub result: String,
    pub hit_type: HitType,
    /// 1.0 for exact hits
    pub similarity: f64,
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CacheLookup {
    Hit(CacheHit),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn hit(&self) -> Option<&CacheHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss => None,
        }
    }

    pub fn into_hit(self) -> Option<CacheHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss => None,
        }
    }
}

/// Acknowledgement of a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOutcome {
    pub key: String,
    /// False when the store rejected the write; the caller's result is unaffected
    pub stored: bool,
    /// Entries removed by recency eviction
    pub evicted: usize,
}
