/// Constants module to avoid magic numbers in the codebase

// Feature vector schema
pub const FEATURE_FORMULA_VERSION: u32 = 1;

// Cache capacity and matching
pub const DEFAULT_MAX_ENTRIES: usize = 30;
pub const DEFAULT_LEGACY_MAX_ENTRIES: usize = 20;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.90;
pub const DEFAULT_DATE_RANGE_DAYS: i64 = 14;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;
pub const DEFAULT_MAX_CANDIDATE_DISTANCE_KM: f64 = 20.0;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

// Default dimension weights (sum to 1.0)
pub const DEFAULT_LOCATION_WEIGHT: f64 = 0.2;
pub const DEFAULT_WEATHER_WEIGHT: f64 = 0.4;
pub const DEFAULT_TEMPORAL_WEIGHT: f64 = 0.3;
pub const DEFAULT_DEMOGRAPHIC_WEIGHT: f64 = 0.1;

// Query defaults
pub const DEFAULT_DISCRIMINATOR: &str = "activities";
pub const DEFAULT_DURATION_HOURS: f64 = 4.0;
pub const DEFAULT_TEMP_MIN_C: f64 = 15.0;
pub const DEFAULT_TEMP_MAX_C: f64 = 25.0;

// Normalization scales
pub const TEMPERATURE_SCALE_C: f64 = 30.0;
pub const WIND_SCALE_KMH: f64 = 50.0;
pub const MAX_CHILD_AGE: f64 = 18.0;
pub const AGE_RANGE_SCALE: f64 = 15.0;
pub const DURATION_SCALE_HOURS: f64 = 12.0;
pub const FESTIVAL_COUNT_SCALE: f64 = 5.0;
pub const POPULATION_LOG_SCALE: f64 = 8.0; // 10^8 inhabitants maps to 1.0
pub const DAYS_PER_YEAR: f64 = 365.0;

// Age bands (inclusive upper bounds)
pub const TODDLER_MAX_AGE: u32 = 3;
pub const PRESCHOOL_MAX_AGE: u32 = 6;
pub const SCHOOL_AGE_MAX_AGE: u32 = 12;

// Neutral values used when an input is missing
pub const NEUTRAL_FEATURE: f64 = 0.5;
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Local configuration directory
pub const LOCAL_CONFIG_DIR: &str = ".activity-cache";
pub const ENV_PREFIX: &str = "ACTIVITY_CACHE_";
