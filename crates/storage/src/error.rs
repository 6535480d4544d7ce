//! Storage error types and result alias.
//!
//! Every [`KeyStore`](crate::KeyStore) implementation maps its internal
//! failures onto [`StorageError`], so the key manager can reason about
//! collaborator failures without knowing which backend produced them.
//!
//! # Example
//!
//! ```
//! use keyrotor_storage::{StorageError, StorageResult};
//!
//! fn lookup(kid: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(kid))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while listing or rotating key records.
///
/// Errors preserve their source chain via `#[source]`, so a caller logging
/// the error sees the backend failure that caused it.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The record referenced by an operation does not exist.
    #[error("Key record not found: {kid}")]
    NotFound {
        /// Key id that was not found.
        kid: String,
    },

    /// The operation would overwrite an existing record.
    ///
    /// Raised when a rotation tries to insert a key id that is already
    /// stored. Key ids are never reused, so this indicates a caller bug or
    /// a racing writer.
    #[error("Key record already exists: {kid}")]
    Conflict {
        /// Key id that already exists.
        kid: String,
    },

    /// Connection or network error talking to the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Backend-specific failure that fits no other category.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend did not answer within its own time limit.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `NotFound` error for the given key id.
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::NotFound { kid: kid.into() }
    }

    /// Creates a new `Conflict` error for the given key id.
    #[must_use]
    pub fn conflict(kid: impl Into<String>) -> Self {
        Self::Conflict { kid: kid.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` for failures that may succeed if retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StorageError::not_found("RS256_abc").to_string(), "Key record not found: RS256_abc");
        assert_eq!(
            StorageError::conflict("EdDSA_xyz").to_string(),
            "Key record already exists: EdDSA_xyz"
        );
        assert_eq!(StorageError::timeout().to_string(), "Operation timeout");
    }

    #[test]
    fn test_connection_preserves_source_chain() {
        let err = StorageError::connection_with_source("list failed", StorageError::Timeout);
        let source = err.source().expect("source exists");
        assert_eq!(source.to_string(), "Operation timeout");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StorageError::timeout().is_transient());
        assert!(StorageError::connection("refused").is_transient());
        assert!(!StorageError::not_found("k").is_transient());
        assert!(!StorageError::internal("boom").is_transient());
    }
}
