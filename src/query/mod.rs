// Gateway module for query - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod key;
mod types;

// Public re-exports - the ONLY way to access query functionality
pub use key::{cache_key, city_token, normalize_text};
pub use types::{Festival, Query, WeatherInfo};
