use serde::{Deserialize, Serialize};

use crate::constants::FEATURE_FORMULA_VERSION;

/// Normalized location features. Latitude/longitude are divided by their
/// maxima (range [-1, 1]); every other field lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationVector {
    pub latitude: f64,
    pub longitude: f64,
    pub city_size: f64,
    pub is_coastal: f64,
    pub population: f64,
    pub country_code: f64,
}

/// Calendar features, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalVector {
    pub season: f64,
    pub day_of_year: f64,
    pub day_of_week: f64,
    pub month: f64,
    pub is_weekend: f64,
    pub holiday_proximity: f64,
}

/// Weather features, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherVector {
    pub avg_temperature: f64,
    pub temp_range: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub weather_suitability: f64,
    /// Temperature-bucketed season, independent of the calendar season
    pub season: f64,
}

/// Family composition features; band flags are 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicVector {
    pub avg_age: f64,
    pub age_range: f64,
    pub has_toddlers: f64,
    pub has_preschool: f64,
    pub has_school_age: f64,
    pub has_teens: f64,
    pub duration: f64,
}

/// Auxiliary context features; stored but not scored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextVector {
    pub has_festivals: f64,
    pub festival_count: f64,
    pub has_extra_instructions: f64,
    pub instructions_hash: f64,
}

/// Bounded, dimensionless encoding of a query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Formula version; vectors from another version are never compared
    pub version: u32,
    pub location: LocationVector,
    pub temporal: TemporalVector,
    pub weather: WeatherVector,
    pub demographic: DemographicVector,
    pub context: ContextVector,
}

impl FeatureVector {
    /// Whether this vector was produced by the current normalizer formulas
    pub fn is_current(&self) -> bool {
        self.version == FEATURE_FORMULA_VERSION
    }

    /// Serialize for storage
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize a stored vector
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
