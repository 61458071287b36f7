// Gateway module for store - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod file_store;
mod memory;
mod null;
mod traits;
mod types;

// Public re-exports - the ONLY way to access store functionality
pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use null::NullStore;
pub use traits::CacheCapableStore;
pub use types::{CacheEntry, CandidateFilter, CandidateRecord, LegacyEntry, LocationProfile};

#[cfg(test)]
pub(crate) use traits::MockCacheCapableStore;
