use thiserror::Error;

/// Main error type for the activity cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed cache entry {key}: {reason}")]
    MalformedEntry { key: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CacheError {
    /// Build a `MalformedEntry` error for a stored key
    pub fn malformed(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedEntry {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result alias used across the library
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = CacheError::malformed("abc123", "missing field `version`");
        assert_eq!(
            err.to_string(),
            "Malformed cache entry abc123: missing field `version`"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let err: CacheError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, CacheError::SerializationError(_)));
    }
}
