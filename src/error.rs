//! Error types for Boxmap

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoxmapError {
    #[error("couldn't find container {0}")]
    KeyNotFound(String),

    #[error("Runtime error during {operation}: {message}")]
    RuntimeError {
        operation: &'static str,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),
}

impl BoxmapError {
    /// Build a `KeyNotFound` from any key, rendered with `Display`
    pub fn key_not_found<K: std::fmt::Display + ?Sized>(key: &K) -> Self {
        BoxmapError::KeyNotFound(key.to_string())
    }

    /// Build a runtime failure for the given operation
    pub fn runtime(operation: &'static str, message: impl Into<String>) -> Self {
        BoxmapError::RuntimeError {
            operation,
            message: message.into(),
        }
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, BoxmapError::KeyNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BoxmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_message() {
        let err = BoxmapError::key_not_found(&"a");
        assert_eq!(err.to_string(), "couldn't find container a");
        assert!(err.is_key_not_found());
    }

    #[test]
    fn test_runtime_error_message() {
        let err = BoxmapError::runtime("pause", "container is already paused");
        assert_eq!(
            err.to_string(),
            "Runtime error during pause: container is already paused"
        );
        assert!(!err.is_key_not_found());
    }
}
