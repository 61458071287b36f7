use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::types::Query;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trim, lowercase and collapse internal whitespace
pub fn normalize_text(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Leading city-name token of a location ("Madrid, Spain" -> "madrid")
pub fn city_token(location: &str) -> String {
    normalize_text(location.split(',').next().unwrap_or_default())
}

/// Generate the exact-match composite key for a query.
///
/// Two queries share a key iff their normalized
/// `(location, date, duration, sorted ages, discriminator, instructions, provider)`
/// tuples are equal.
pub fn cache_key(query: &Query) -> String {
    let mut ages = query.ages.clone();
    ages.sort_unstable();
    let ages = ages
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let duration = query
        .duration_hours
        .map(|h| format!("{:.2}", h))
        .unwrap_or_else(|| "none".to_string());

    let parts = [
        normalize_text(&query.location),
        query.date.trim().to_string(),
        duration,
        ages,
        normalize_text(&query.discriminator),
        normalize_text(query.extra_instructions.as_deref().unwrap_or_default()),
        normalize_text(&query.provider_identity),
    ];

    let mut hasher = Sha256::new();
    for part in &parts {
        hasher.update(part.as_bytes());
        // Unit separator keeps ("ab", "c") distinct from ("a", "bc")
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}
