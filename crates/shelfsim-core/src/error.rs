//! Error types and result aliases for shelfsim.
//!
//! This module defines the shared error types used across all shelfsim
//! components. Errors are structured for programmatic handling and include
//! context for debugging.

/// The result type used throughout shelfsim.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shelfsim operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation failed.
    ///
    /// Storage errors are fatal for the invocation that hit them; no partial
    /// cycle state is mutated and the invocation is safe to retry entirely.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = Error::storage("connection refused");
        assert_eq!(err.to_string(), "storage error: connection refused");
    }

    #[test]
    fn test_storage_error_carries_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = Error::storage_with_source("bulk write failed", io);

        let source = std::error::Error::source(&err).expect("source present");
        assert!(source.to_string().contains("timed out"));
    }

    #[test]
    fn test_invalid_input_display() {
        let err = Error::InvalidInput("batch size must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid input: batch size must be positive"
        );
    }
}
