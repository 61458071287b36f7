// Gateway module for features - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod location;
mod normalizer;
mod types;

// Public re-exports - the ONLY way to access feature functionality
pub use location::{
    haversine_km, LocationFeatures, LocationLookup, NeutralLocationLookup, StaticLocationLookup,
};
pub use normalizer::{astronomical_season_index, temperature_season_index, FeatureNormalizer};
pub use types::{
    ContextVector, DemographicVector, FeatureVector, LocationVector, TemporalVector, WeatherVector,
};
