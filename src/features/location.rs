use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::EARTH_RADIUS_KM;
use crate::query::normalize_text;

/// Raw geographic metadata for a place, as supplied by a geocoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFeatures {
    pub latitude: f64,
    pub longitude: f64,
    /// Relative city size in [0, 1]
    pub city_size: f64,
    pub is_coastal: bool,
    pub population: u64,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Location-feature capability injected into the normalizer
pub trait LocationLookup: Send + Sync {
    /// Resolve a free-text location; `None` when unknown
    fn lookup(&self, location: &str) -> Option<LocationFeatures>;
}

/// Lookup that never resolves anything; locations normalize to neutral values
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralLocationLookup;

impl LocationLookup for NeutralLocationLookup {
    fn lookup(&self, _location: &str) -> Option<LocationFeatures> {
        None
    }
}

/// Table-backed lookup keyed by normalized location or city name
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StaticLocationLookup {
    places: HashMap<String, LocationFeatures>,
}

impl StaticLocationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a place under its normalized name
    pub fn insert(&mut self, name: &str, features: LocationFeatures) {
        self.places.insert(normalize_text(name), features);
    }

    pub fn with_place(mut self, name: &str, features: LocationFeatures) -> Self {
        self.insert(name, features);
        self
    }

    /// Load a gazetteer from a JSON object of `name -> LocationFeatures`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let raw: HashMap<String, LocationFeatures> = serde_json::from_str(json)?;
        let mut lookup = Self::new();
        for (name, features) in raw {
            lookup.insert(&name, features);
        }
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl LocationLookup for StaticLocationLookup {
    fn lookup(&self, location: &str) -> Option<LocationFeatures> {
        let full = normalize_text(location);
        if let Some(found) = self.places.get(&full) {
            return Some(found.clone());
        }
        // Fall back to the city part of "City, Country"
        let city = crate::query::city_token(location);
        self.places.get(&city).cloned()
    }
}

/// Great-circle distance between two points in kilometres
pub fn haversine_km(a: &LocationFeatures, b: &LocationFeatures) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
