use chrono::{Datelike, NaiveDate, Weekday};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::location::{LocationFeatures, LocationLookup, NeutralLocationLookup};
use super::types::{
    ContextVector, DemographicVector, FeatureVector, LocationVector, TemporalVector, WeatherVector,
};
use crate::constants::*;
use crate::query::{Query, WeatherInfo};

/// Converts raw queries into bounded feature vectors.
///
/// Never fails: missing or unusable inputs degrade to neutral defaults.
#[derive(Clone)]
pub struct FeatureNormalizer {
    locations: Arc<dyn LocationLookup>,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(NeutralLocationLookup))
    }
}

impl std::fmt::Debug for FeatureNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureNormalizer").finish_non_exhaustive()
    }
}

impl FeatureNormalizer {
    pub fn new(locations: Arc<dyn LocationLookup>) -> Self {
        Self { locations }
    }

    /// Resolve a location through the injected lookup
    pub fn locate(&self, location: &str) -> Option<LocationFeatures> {
        self.locations.lookup(location)
    }

    /// Normalize a query into its feature vector
    pub fn normalize(&self, query: &Query) -> FeatureVector {
        let located = self.locate(&query.location);
        FeatureVector {
            version: FEATURE_FORMULA_VERSION,
            location: location_vector(located.as_ref()),
            temporal: temporal_vector(query.parsed_date(), query.is_public_holiday),
            weather: weather_vector(&query.weather),
            demographic: demographic_vector(&query.ages, query.effective_duration()),
            context: context_vector(query),
        }
    }
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Fold text into [0, 1] with a stable hash
pub(crate) fn fold_hash(text: &str) -> f64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) as f64 / u64::MAX as f64
}

/// Calendar season index: 0 winter, 1 spring, 2 summer, 3 fall
pub fn astronomical_season_index(month: u32) -> u32 {
    match month {
        3..=5 => 1,
        6..=8 => 2,
        9..=11 => 3,
        _ => 0,
    }
}

/// Temperature-bucketed season index on the same 0..=3 scale
pub fn temperature_season_index(avg_temp_c: f64) -> u32 {
    if avg_temp_c <= 5.0 {
        0
    } else if avg_temp_c <= 15.0 {
        1
    } else if avg_temp_c <= 25.0 {
        2
    } else {
        3
    }
}

fn location_vector(features: Option<&LocationFeatures>) -> LocationVector {
    match features {
        Some(f) => LocationVector {
            latitude: (f.latitude / 90.0).clamp(-1.0, 1.0),
            longitude: (f.longitude / 180.0).clamp(-1.0, 1.0),
            city_size: clamp01(f.city_size),
            is_coastal: flag(f.is_coastal),
            population: if f.population == 0 {
                0.0
            } else {
                clamp01((f.population as f64).log10() / POPULATION_LOG_SCALE)
            },
            country_code: f
                .country_code
                .as_deref()
                .map(|code| fold_hash(&code.trim().to_uppercase()))
                .unwrap_or(NEUTRAL_FEATURE),
        },
        None => LocationVector {
            latitude: 0.0,
            longitude: 0.0,
            city_size: NEUTRAL_FEATURE,
            is_coastal: 0.0,
            population: NEUTRAL_FEATURE,
            country_code: NEUTRAL_FEATURE,
        },
    }
}

fn temporal_vector(date: Option<NaiveDate>, is_holiday: bool) -> TemporalVector {
    let holiday_proximity = flag(is_holiday);
    let Some(date) = date else {
        return TemporalVector {
            season: NEUTRAL_FEATURE,
            day_of_year: NEUTRAL_FEATURE,
            day_of_week: NEUTRAL_FEATURE,
            month: NEUTRAL_FEATURE,
            is_weekend: 0.0,
            holiday_proximity,
        };
    };

    let weekday = date.weekday();
    TemporalVector {
        season: astronomical_season_index(date.month()) as f64 / 3.0,
        day_of_year: clamp01(date.ordinal() as f64 / DAYS_PER_YEAR),
        day_of_week: weekday.num_days_from_sunday() as f64 / 6.0,
        month: date.month0() as f64 / 11.0,
        is_weekend: flag(matches!(weekday, Weekday::Sat | Weekday::Sun)),
        holiday_proximity,
    }
}

fn weather_vector(weather: &WeatherInfo) -> WeatherVector {
    let min = weather
        .temperature_min_c
        .filter(|t| t.is_finite())
        .unwrap_or(DEFAULT_TEMP_MIN_C);
    let max = weather
        .temperature_max_c
        .filter(|t| t.is_finite())
        .unwrap_or(DEFAULT_TEMP_MAX_C);
    let avg = (min + max) / 2.0;
    let precipitation = weather
        .precipitation_probability_percent
        .filter(|p| p.is_finite());
    let wind = weather
        .wind_speed_max_kmh
        .filter(|w| w.is_finite())
        .unwrap_or(0.0);

    WeatherVector {
        avg_temperature: clamp01(avg / TEMPERATURE_SCALE_C),
        temp_range: clamp01((max - min) / TEMPERATURE_SCALE_C),
        precipitation: clamp01(precipitation.unwrap_or(0.0) / 100.0),
        wind_speed: clamp01(wind / WIND_SCALE_KMH),
        weather_suitability: weather_suitability(avg, precipitation),
        season: temperature_season_index(avg) as f64 / 3.0,
    }
}

/// How pleasant the weather is for outdoor activities, in [0, 1]
fn weather_suitability(avg_temp_c: f64, precipitation_percent: Option<f64>) -> f64 {
    let mut score = 0.5;

    if (15.0..=25.0).contains(&avg_temp_c) {
        score += 0.3;
    } else if (10.0..=30.0).contains(&avg_temp_c) {
        score += 0.1;
    } else if avg_temp_c < 5.0 || avg_temp_c > 35.0 {
        score -= 0.2;
    }

    // Unknown precipitation leaves the score untouched
    if let Some(pct) = precipitation_percent {
        if pct < 20.0 {
            score += 0.2;
        } else if pct > 60.0 {
            score -= 0.3;
        }
    }

    clamp01(score)
}

fn demographic_vector(ages: &[u32], duration_hours: Option<f64>) -> DemographicVector {
    let duration = clamp01(duration_hours.unwrap_or(DEFAULT_DURATION_HOURS) / DURATION_SCALE_HOURS);

    if ages.is_empty() {
        return DemographicVector {
            avg_age: NEUTRAL_FEATURE,
            age_range: 0.0,
            has_toddlers: 0.0,
            has_preschool: 0.0,
            has_school_age: 0.0,
            has_teens: 0.0,
            duration,
        };
    }

    let mean = ages.iter().map(|&a| a as f64).sum::<f64>() / ages.len() as f64;
    let youngest = ages.iter().copied().min().unwrap_or_default();
    let oldest = ages.iter().copied().max().unwrap_or_default();

    DemographicVector {
        avg_age: clamp01(mean / MAX_CHILD_AGE),
        age_range: clamp01((oldest - youngest) as f64 / AGE_RANGE_SCALE),
        has_toddlers: flag(ages.iter().any(|&a| a <= TODDLER_MAX_AGE)),
        has_preschool: flag(
            ages.iter()
                .any(|&a| a > TODDLER_MAX_AGE && a <= PRESCHOOL_MAX_AGE),
        ),
        has_school_age: flag(
            ages.iter()
                .any(|&a| a > PRESCHOOL_MAX_AGE && a <= SCHOOL_AGE_MAX_AGE),
        ),
        has_teens: flag(ages.iter().any(|&a| a > SCHOOL_AGE_MAX_AGE)),
        duration,
    }
}

fn context_vector(query: &Query) -> ContextVector {
    let festivals = query.nearby_festivals.len();
    let instructions = query.instructions();

    ContextVector {
        has_festivals: flag(festivals > 0),
        festival_count: clamp01(festivals as f64 / FESTIVAL_COUNT_SCALE),
        has_extra_instructions: flag(instructions.is_some()),
        instructions_hash: instructions
            .map(|text| fold_hash(&crate::query::normalize_text(text)))
            .unwrap_or(0.0),
    }
}
