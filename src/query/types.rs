use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DISCRIMINATOR;
use crate::utils::{CacheError, CacheResult};

/// Weather forecast attached to a query; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    #[serde(default)]
    pub temperature_min_c: Option<f64>,
    #[serde(default)]
    pub temperature_max_c: Option<f64>,
    #[serde(default)]
    pub precipitation_probability_percent: Option<f64>,
    #[serde(default)]
    pub wind_speed_max_kmh: Option<f64>,
}

/// A festival happening near the requested location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Festival {
    pub name: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A family-activity request, the logical input to the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Free-text place name, e.g. "Madrid, Spain"
    pub location: String,
    /// ISO 8601 calendar date (YYYY-MM-DD)
    pub date: String,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub ages: Vec<u32>,
    #[serde(default)]
    pub weather: WeatherInfo,
    #[serde(default)]
    pub is_public_holiday: bool,
    #[serde(default)]
    pub nearby_festivals: Vec<Festival>,
    #[serde(default)]
    pub extra_instructions: Option<String>,
    /// Query family tag; results for different families never share a key
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    /// Model/provider that produces the result
    #[serde(default)]
    pub provider_identity: String,
}

fn default_discriminator() -> String {
    DEFAULT_DISCRIMINATOR.to_string()
}

impl Query {
    /// Create a query with the required fields; everything else takes defaults
    pub fn new(location: impl Into<String>, date: impl Into<String>, ages: Vec<u32>) -> Self {
        Self {
            location: location.into(),
            date: date.into(),
            duration_hours: None,
            ages,
            weather: WeatherInfo::default(),
            is_public_holiday: false,
            nearby_festivals: Vec::new(),
            extra_instructions: None,
            discriminator: default_discriminator(),
            provider_identity: String::new(),
        }
    }

    pub fn with_weather(mut self, min_c: f64, max_c: f64, precipitation_percent: f64) -> Self {
        self.weather.temperature_min_c = Some(min_c);
        self.weather.temperature_max_c = Some(max_c);
        self.weather.precipitation_probability_percent = Some(precipitation_percent);
        self
    }

    pub fn with_duration(mut self, hours: f64) -> Self {
        self.duration_hours = Some(hours);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_identity = provider.into();
        self
    }

    /// Parse the date field, `None` when it is not a valid ISO date
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    /// Duration if present and usable
    pub fn effective_duration(&self) -> Option<f64> {
        self.duration_hours.filter(|h| h.is_finite() && *h > 0.0)
    }

    /// Instructions text if present and not blank
    pub fn instructions(&self) -> Option<&str> {
        self.extra_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Check the query for missing or unusable fields.
    ///
    /// The cache never rejects a query; callers use this to warn early.
    pub fn validate(&self) -> CacheResult<()> {
        if self.location.trim().is_empty() {
            return Err(CacheError::InvalidQuery("location is empty".to_string()));
        }
        if self.parsed_date().is_none() {
            return Err(CacheError::InvalidQuery(format!(
                "date '{}' is not YYYY-MM-DD",
                self.date
            )));
        }
        if self.ages.is_empty() {
            return Err(CacheError::InvalidQuery("ages list is empty".to_string()));
        }
        if self.duration_hours.is_some() && self.effective_duration().is_none() {
            return Err(CacheError::InvalidQuery(
                "duration_hours must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}
