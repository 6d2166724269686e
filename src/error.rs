//! Error types for cache operations
//!
//! Errors raised by the wrapped computation are never converted into
//! [`CacheError`]; they reach the caller untouched. This type only covers
//! failures of the cache layer itself and of the durable store behind it.

use thiserror::Error;

/// Main error type for cache and store operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid cache or wrapper configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The durable store could not be reached
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A durable store query failed
    #[error("Query error: {0}")]
    QueryError(String),

    /// Serialization/Deserialization of arguments or cached values failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Neo4rs driver error (wrapper)
    #[error("Neo4rs driver error: {0}")]
    DriverError(#[from] neo4rs::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::ConnectionError("Failed to connect".to_string());
        assert_eq!(error.to_string(), "Connection error: Failed to connect");

        let error = CacheError::ConfigError("fast cache requires a timeout".to_string());
        assert!(error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: CacheError = json_err.into();
        assert!(matches!(error, CacheError::SerializationError(_)));
    }
}
