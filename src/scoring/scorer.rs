use serde::Serialize;

use super::weights::ScoringParams;
use crate::constants::DAYS_PER_YEAR;
use crate::features::{DemographicVector, FeatureVector, TemporalVector, WeatherVector};

/// Per-dimension scores behind a similarity value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// `None` when the distance between the two locations is unknown
    pub location: Option<f64>,
    pub weather: f64,
    pub temporal: f64,
    pub demographic: f64,
    pub total: f64,
    /// True when the distance gate forced the total to 0
    pub gated: bool,
}

/// Weighted multi-dimensional similarity between two feature vectors
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    params: ScoringParams,
}

impl SimilarityScorer {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Similarity in [0, 1]
    pub fn score(&self, a: &FeatureVector, b: &FeatureVector, distance_km: Option<f64>) -> f64 {
        self.breakdown(a, b, distance_km).total
    }

    /// Similarity with the individual dimension scores
    pub fn breakdown(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
        distance_km: Option<f64>,
    ) -> ScoreBreakdown {
        let weather = weather_similarity(&a.weather, &b.weather);
        let temporal = temporal_similarity(&a.temporal, &b.temporal, self.params.date_window_days);
        let demographic = demographic_similarity(&a.demographic, &b.demographic);

        let distance_km = distance_km.filter(|d| d.is_finite());
        if let Some(distance) = distance_km {
            if distance > self.params.max_distance_km {
                return ScoreBreakdown {
                    location: Some(0.0),
                    weather,
                    temporal,
                    demographic,
                    total: 0.0,
                    gated: true,
                };
            }
        }

        let location = distance_km.map(|d| location_similarity(d, self.params.max_distance_km));
        let weights = &self.params.weights;

        let mut weighted = weights.weather * weather
            + weights.temporal * temporal
            + weights.demographic * demographic;
        let mut weight_sum = weights.weather + weights.temporal + weights.demographic;
        if let Some(location) = location {
            weighted += weights.location * location;
            weight_sum += weights.location;
        }

        let total = if weight_sum > 0.0 {
            (weighted / weight_sum).clamp(0.0, 1.0)
        } else {
            0.0
        };

        ScoreBreakdown {
            location,
            weather,
            temporal,
            demographic,
            total,
            gated: false,
        }
    }
}

/// `max(0, 1 - |a - b| * factor)`
fn proximity(a: f64, b: f64, factor: f64) -> f64 {
    (1.0 - (a - b).abs() * factor).max(0.0)
}

fn location_similarity(distance_km: f64, max_distance_km: f64) -> f64 {
    if max_distance_km <= 0.0 {
        return if distance_km <= 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - distance_km / max_distance_km).max(0.0)
}

fn weather_similarity(a: &WeatherVector, b: &WeatherVector) -> f64 {
    let temperature = proximity(a.avg_temperature, b.avg_temperature, 2.0);

    let mut precipitation = proximity(a.precipitation, b.precipitation, 1.5);
    if a.precipitation < 0.2 && b.precipitation < 0.2 {
        // Two dry days are interchangeable
        precipitation = precipitation.max(0.9);
    }

    let suitability = proximity(a.weather_suitability, b.weather_suitability, 1.0);
    let wind = proximity(a.wind_speed, b.wind_speed, 2.0);

    temperature * 0.4 + precipitation * 0.3 + suitability * 0.2 + wind * 0.1
}

fn temporal_similarity(a: &TemporalVector, b: &TemporalVector, window_days: i64) -> f64 {
    // Seasons sit at multiples of 1/3 and wrap (fall is adjacent to winter)
    let step = 1.0 / 3.0;
    let raw = (a.season - b.season).abs();
    let season_delta = raw.min(4.0 * step - raw).max(0.0);
    let season = if season_delta <= step + 1e-9 {
        (1.0 - 1.5 * season_delta).max(0.0)
    } else {
        0.2
    };

    let raw = (a.day_of_year - b.day_of_year).abs();
    let day_delta = raw.min(1.0 - raw).max(0.0);
    let window = window_days as f64 / DAYS_PER_YEAR;
    let day = if window > 0.0 {
        (1.0 - day_delta / window).max(0.0)
    } else if day_delta == 0.0 {
        1.0
    } else {
        0.0
    };

    let weekend = if a.is_weekend == b.is_weekend { 1.0 } else { 0.7 };
    let holiday_bonus = (0.1 * (1.0 - (a.holiday_proximity - b.holiday_proximity).abs())).min(0.1);

    season * 0.4 + day * 0.3 + weekend * 0.2 + holiday_bonus
}

fn band_match(a: f64, b: f64) -> f64 {
    match (a >= 0.5, b >= 0.5) {
        (true, true) => 1.0,
        (false, false) => 0.0,
        _ => 0.7,
    }
}

fn demographic_similarity(a: &DemographicVector, b: &DemographicVector) -> f64 {
    let bands = band_match(a.has_toddlers, b.has_toddlers)
        + band_match(a.has_preschool, b.has_preschool)
        + band_match(a.has_school_age, b.has_school_age)
        + band_match(a.has_teens, b.has_teens);

    let age = proximity(a.avg_age, b.avg_age, 2.0);
    let duration = proximity(a.duration, b.duration, 1.5);

    (bands * 0.15 + age * 0.3 + duration * 0.3).min(1.0)
}
