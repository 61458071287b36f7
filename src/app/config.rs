use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::scoring::{ScoringParams, SimilarityWeights};
use crate::utils::{CacheError, CacheResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Similarity dimension weights
    #[serde(default)]
    pub weights: SimilarityWeights,

    /// Backing store selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Location lookup
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Cache tuning knobs, all adjustable at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of the primary cache before recency eviction
    pub max_entries: usize,
    /// Capacity of the legacy record shape
    pub legacy_max_entries: usize,
    /// Minimum similarity for a fuzzy hit (inclusive)
    pub min_similarity: f64,
    /// Candidate date window, in days either side of the query date
    pub date_range_days: i64,
    /// Maximum candidates scored per lookup
    pub max_candidates: usize,
    /// Known distances above this never match
    pub max_candidate_distance_km: f64,
    /// Upper bound on any single store call
    pub store_timeout_ms: u64,
    /// Also write the legacy record shape when the store supports it
    pub write_legacy_shape: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            legacy_max_entries: DEFAULT_LEGACY_MAX_ENTRIES,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            date_range_days: DEFAULT_DATE_RANGE_DAYS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_candidate_distance_km: DEFAULT_MAX_CANDIDATE_DISTANCE_KM,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            write_legacy_shape: false,
        }
    }
}

/// Which store backs the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    None,
}

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory for the file backend (defaults to the user cache dir)
    pub path: Option<PathBuf>,
}

/// Location lookup configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// JSON gazetteer of `name -> location features`; absent means neutral locations
    pub gazetteer: Option<PathBuf>,
}

impl Config {
    /// Reject settings the cache cannot operate with
    pub fn validate(&self) -> CacheResult<()> {
        self.weights.validate()?;

        let cache = &self.cache;
        if !(0.0..=1.0).contains(&cache.min_similarity) {
            return Err(CacheError::ConfigError(format!(
                "min_similarity must be within [0, 1], got {}",
                cache.min_similarity
            )));
        }
        if cache.max_entries == 0 {
            return Err(CacheError::ConfigError(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if cache.date_range_days < 0 {
            return Err(CacheError::ConfigError(
                "date_range_days must not be negative".to_string(),
            ));
        }
        if !cache.max_candidate_distance_km.is_finite() || cache.max_candidate_distance_km < 0.0 {
            return Err(CacheError::ConfigError(
                "max_candidate_distance_km must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Scorer parameters derived from this configuration
    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            weights: self.weights,
            max_distance_km: self.cache.max_candidate_distance_km,
            date_window_days: self.cache.date_range_days,
        }
    }

    /// Directory for the file store
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => get_cache_dir(),
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    let local_config = PathBuf::from(LOCAL_CONFIG_DIR).join("config.toml");

    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    extract(figment)
}

/// Load configuration from an explicit file, still honouring environment overrides
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path));
    extract(figment)
}

fn extract(figment: Figment) -> Result<Config> {
    // ACTIVITY_CACHE_CACHE__MAX_ENTRIES=50 -> cache.max_entries
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "activity-cache")
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match project_dirs() {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => home_dir()?.join(".config").join("activity-cache"),
    };
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Get the default directory for the file store
pub fn get_cache_dir() -> Result<PathBuf> {
    // ~/.cache/activity-cache on Linux, ~/Library/Caches/activity-cache on macOS
    match project_dirs() {
        Some(dirs) => Ok(dirs.cache_dir().to_path_buf()),
        None => Ok(home_dir()?.join(".cache").join("activity-cache")),
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist, returning its path
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");
    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
    }
    Ok(config_file)
}
