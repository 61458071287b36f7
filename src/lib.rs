pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod features;
pub mod query;
pub mod scoring;
pub mod store;
pub mod utils;

pub use app::{load_config, CacheConfig, Config};
pub use cache::{CacheCoordinator, CacheHit, CacheLookup, HitType, PutOutcome};
pub use features::{FeatureNormalizer, FeatureVector, LocationLookup};
pub use query::{cache_key, Query};
pub use scoring::{SimilarityScorer, SimilarityWeights};
pub use store::{CacheCapableStore, FileStore, MemoryStore, NullStore};
pub use utils::CacheError;
