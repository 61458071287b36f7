// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod coordinator;
mod selector;
mod stats;
mod types;

// Public re-exports - the ONLY way to access cache functionality
pub use coordinator::CacheCoordinator;
pub use selector::CandidateSelector;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use types::{CacheHit, CacheLookup, HitType, PutOutcome};
