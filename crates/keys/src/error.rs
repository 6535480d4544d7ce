//! Key management error types.
//!
//! This module defines errors that can occur while encrypting, decoding,
//! signing, verifying, or rotating keys.

use std::fmt::Write as _;

use keyrotor_storage::{Alg, BoxError, StorageError, UnsupportedAlgorithm};
use thiserror::Error;

/// Errors returned by the key manager and its building blocks.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// A component was constructed with invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bytes could not be parsed as the expected structure (DER, PKCS#8,
    /// signature length, JWS segments).
    #[error("Decode error: {0}")]
    Decode(String),

    /// An ECDSA integer does not fit in a curve coordinate.
    #[error("Integer too large: {len} bytes exceeds {max}")]
    IntegerTooLarge {
        /// Length of the integer after stripping sign padding.
        len: usize,
        /// Maximum length for the curve.
        max: usize,
    },

    /// AEAD open failed: wrong key, tampered data, or malformed nonce.
    #[error("Decryption failed")]
    Decryption,

    /// AEAD seal failed or randomness was unavailable.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The signature does not verify under the public key.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The key's kind does not match the algorithm it is used with.
    #[error("Wrong key type for {expected}")]
    WrongKeyType {
        /// Algorithm the caller asked for.
        expected: Alg,
    },

    /// An algorithm identifier outside the supported set.
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithm),

    /// The key store failed.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("Key storage error: {0}")]
    Storage(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),

    /// The rotation policy failed or produced an unusable configuration.
    #[error("Rotation policy error: {message}")]
    Policy {
        /// What went wrong.
        message: String,
        /// The policy's own error, if it returned one.
        #[source]
        source: Option<BoxError>,
    },

    /// The caller's payload builder failed during `sign`.
    #[error("Payload builder error: {0}")]
    Payload(
        /// The builder's error.
        #[source]
        BoxError,
    ),

    /// No active key exists for the algorithm, even after a reload.
    #[error("No active key for {alg}")]
    NoActiveKey {
        /// Algorithm that has no active key.
        alg: Alg,
    },

    /// No key with this id exists, even after a reload.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// Key id that was not found.
        kid: String,
    },

    /// One or more algorithms failed to rotate in a batch.
    #[error("Rotation failed for {}", describe_failures(failures))]
    RotationFailed {
        /// Each failed algorithm with its error, in algorithm order.
        failures: Vec<RotationFailure>,
    },

    /// Unexpected failure that fits no other category.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single algorithm's failure inside [`KeyError::RotationFailed`].
#[derive(Debug)]
pub struct RotationFailure {
    /// Algorithm whose rotation failed.
    pub alg: Alg,
    /// Why it failed.
    pub error: KeyError,
}

fn describe_failures(failures: &[RotationFailure]) -> String {
    let mut out = String::new();
    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{}: {}", failure.alg, failure.error);
    }
    out
}

impl KeyError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates a new `Encryption` error.
    #[must_use]
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Creates a new `Policy` error without a source.
    #[must_use]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the failed algorithms if this is a `RotationFailed` error.
    #[must_use]
    pub fn failed_algorithms(&self) -> Vec<Alg> {
        match self {
            Self::RotationFailed { failures } => failures.iter().map(|f| f.alg).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<StorageError> for KeyError {
    fn from(err: StorageError) -> Self {
        KeyError::Storage(err)
    }
}

/// Result type alias for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(KeyError::decode("trailing bytes").to_string(), "Decode error: trailing bytes");
        assert_eq!(
            KeyError::IntegerTooLarge { len: 33, max: 32 }.to_string(),
            "Integer too large: 33 bytes exceeds 32"
        );
        assert_eq!(KeyError::NoActiveKey { alg: Alg::Es256 }.to_string(), "No active key for ES256");
        assert_eq!(
            KeyError::WrongKeyType { expected: Alg::EdDsa }.to_string(),
            "Wrong key type for EdDSA"
        );
    }

    #[test]
    fn test_unsupported_algorithm_is_transparent() {
        let err: KeyError = "HS256".parse::<Alg>().unwrap_err().into();
        assert!(matches!(err, KeyError::UnsupportedAlgorithm(_)));
        assert_eq!(err.to_string(), "Unsupported algorithm: HS256");
    }

    #[test]
    fn test_storage_error_preserves_source_chain() {
        let err: KeyError =
            StorageError::connection_with_source("connection failed", StorageError::Timeout).into();

        let level_1 = err.source().expect("level 1 source");
        assert_eq!(level_1.to_string(), "Connection error: connection failed");
        let level_2 = level_1.source().expect("level 2 source");
        assert_eq!(level_2.to_string(), "Operation timeout");
    }

    #[test]
    fn test_rotation_failed_lists_each_algorithm() {
        let err = KeyError::RotationFailed {
            failures: vec![
                RotationFailure { alg: Alg::Rs256, error: KeyError::Decryption },
                RotationFailure {
                    alg: Alg::EdDsa,
                    error: KeyError::Storage(StorageError::timeout()),
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "Rotation failed for RS256: Decryption failed; EdDSA: Key storage error: Operation timeout"
        );
        assert_eq!(err.failed_algorithms(), vec![Alg::Rs256, Alg::EdDsa]);
        assert!(KeyError::InvalidSignature.failed_algorithms().is_empty());
    }
}
