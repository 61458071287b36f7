use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::utils::{CacheError, CacheResult};

/// Relative importance of each similarity dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub location: f64,
    pub weather: f64,
    pub temporal: f64,
    pub demographic: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION_WEIGHT,
            weather: DEFAULT_WEATHER_WEIGHT,
            temporal: DEFAULT_TEMPORAL_WEIGHT,
            demographic: DEFAULT_DEMOGRAPHIC_WEIGHT,
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.location + self.weather + self.temporal + self.demographic
    }

    /// Weights must be finite, non-negative and not all zero
    pub fn validate(&self) -> CacheResult<()> {
        let all = [self.location, self.weather, self.temporal, self.demographic];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CacheError::ConfigError(
                "similarity weights must be finite and non-negative".to_string(),
            ));
        }
        if self.total() <= 0.0 {
            return Err(CacheError::ConfigError(
                "similarity weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the scorer needs besides the two vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub weights: SimilarityWeights,
    /// Hard cutoff; a known distance above this scores 0
    pub max_distance_km: f64,
    /// Day-of-year proximity window
    pub date_window_days: i64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            max_distance_km: DEFAULT_MAX_CANDIDATE_DISTANCE_KM,
            date_window_days: DEFAULT_DATE_RANGE_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = SimilarityWeights::default();
        assert!((weights.total() - 1.0).abs() < 1e-12);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights() {
        let negative = SimilarityWeights {
            weather: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero = SimilarityWeights {
            location: 0.0,
            weather: 0.0,
            temporal: 0.0,
            demographic: 0.0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let weights: SimilarityWeights = toml::from_str("weather = 0.5").unwrap();
        assert_eq!(weights.weather, 0.5);
        assert_eq!(weights.temporal, DEFAULT_TEMPORAL_WEIGHT);
    }
}
