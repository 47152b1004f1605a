//! Error handling for the share verifier
//!
//! Low-level error types shared by the codec, epoch keying, context cache and
//! configuration layers. The verification pipeline wraps these into
//! [`crate::verifier::VerifyError`] so callers can tell input bugs apart from
//! transient resource failures.

use thiserror::Error;

/// Result type alias for verifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the share verifier
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed hex input (wrong length or non-hex characters)
    #[error("Format error: {message}")]
    Format { message: String },

    /// Invalid parameter supplied by the caller, such as a zero epoch duration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The hashing library failed to build a context for an epoch
    #[error("Context initialization failed for epoch {epoch}: {message}")]
    ContextInit { epoch: u32, message: String },

    /// The hashing library failed while computing a hash or commitment
    #[error("Hash computation failed: {message}")]
    HashComputation { message: String },

    /// The hashing library reported a failure; the caller decides whether it
    /// happened while building a context or while hashing
    #[error("Hashing library error: {message}")]
    Engine { message: String },

    /// A hash was requested before any context was built
    #[error("Hashing context is not initialized")]
    NotInitialized,

    /// Configuration file or CLI errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a context initialization error
    pub fn context_init(epoch: u32, message: impl Into<String>) -> Self {
        Self::ContextInit {
            epoch,
            message: message.into(),
        }
    }

    /// Create a hash computation error
    pub fn hash_computation(message: impl Into<String>) -> Self {
        Self::HashComputation {
            message: message.into(),
        }
    }

    /// Create a hashing library error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if the operation may succeed when retried after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ContextInit { .. } | Error::HashComputation { .. } | Error::Engine { .. } | Error::Io(_)
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Format { .. } => "format",
            Error::InvalidConfig { .. } => "invalid_config",
            Error::ContextInit { .. } => "context_init",
            Error::HashComputation { .. } => "hash_computation",
            Error::Engine { .. } => "engine",
            Error::NotInitialized => "not_initialized",
            Error::Config { .. } => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::context_init(3, "out of memory").is_retryable());
        assert!(Error::hash_computation("vm fault").is_retryable());
        assert!(!Error::format("odd length").is_retryable());
        assert!(!Error::invalid_config("zero duration").is_retryable());
        assert!(!Error::NotInitialized.is_retryable());
        assert!(Error::engine("cache allocation failed").is_retryable());
        assert_eq!(Error::engine("vm fault").category(), "engine");
    }

    #[test]
    fn test_error_display() {
        let err = Error::context_init(2823, "cache allocation failed");
        assert_eq!(
            err.to_string(),
            "Context initialization failed for epoch 2823: cache allocation failed"
        );
        assert_eq!(err.category(), "context_init");
    }
}
