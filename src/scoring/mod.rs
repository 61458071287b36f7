// Gateway module for scoring - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod scorer;
mod weights;

// Public re-exports - the ONLY way to access scoring functionality
pub use scorer::{ScoreBreakdown, SimilarityScorer};
pub use weights::{ScoringParams, SimilarityWeights};
