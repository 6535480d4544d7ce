//! # keyrotor keys
//!
//! Signing key lifecycle: generation, encrypted persistence, rotation,
//! signing, verification and public key export.
//!
//! This crate provides:
//! - **Key manager**: an in-memory cache of decrypted keys over a [`KeyStore`](keyrotor_storage::KeyStore),
//!   one active key per algorithm, read-through on misses
//! - **Rotation**: policy-driven TTLs, expiry sweeps and a background task
//! - **Algorithms**: RS256, ES256 (JOSE `r || s` signatures) and EdDSA
//! - **Encryption at rest**: AES-256-GCM over PKCS#8 private keys
//! - **Export**: JWKS documents and compact JWS tokens
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyrotor_keys::{AesGcmEncryptor, KeyManager, KeyManagerConfig, jws};
//! use keyrotor_storage::{Alg, MemoryKeyStore};
//! use serde_json::json;
//!
//! # async fn example(master_key: &str) -> Result<(), keyrotor_keys::KeyError> {
//! let config = KeyManagerConfig::default();
//! let manager = Arc::new(
//!     KeyManager::from_config(&config, MemoryKeyStore::new(), AesGcmEncryptor::from_base64(master_key)?)
//!         .await?,
//! );
//! let rotation = manager.spawn_rotation_task(config.rotation_check_interval)?;
//!
//! let token = jws::sign_compact(&manager, Alg::EdDsa, &json!({"sub": "svc-a"})).await?;
//! let jwks = manager.jwks_json()?;
//!
//! rotation.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with pass-through and fault-injecting
//!   encryptors, a record factory and assertion macros.
//! - **`failpoints`**: Activates fail points inside rotation (`rotate-before-encrypt`,
//!   `rotate-before-store`, `rotate-before-reload`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Key generation, PKCS#8 encoding, signing and verification per algorithm.
pub mod algorithm;
/// Decrypted keys and cache snapshots.
pub mod cache;
/// Key manager configuration.
pub mod config;
/// ECDSA signature conversion between DER and JOSE raw form.
pub mod der;
/// Encryption of private keys at rest.
pub mod encryption;
/// Key manager error types.
pub mod error;
/// JWKS export.
pub mod jwks;
/// Compact JWS signing and verification.
pub mod jws;
/// Key id generation.
pub mod kid;
/// Key cache and rotation engine.
pub mod manager;
/// Rotation policies.
pub mod policy;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;

// Re-export key types for convenience
pub use algorithm::{PrivateKey, PublicKey};
pub use cache::{CachedKey, KeyCache};
pub use config::KeyManagerConfig;
pub use encryption::{AesGcmEncryptor, Encryptor};
pub use error::{KeyError, Result, RotationFailure};
pub use jwks::{Jwk, JwkSet};
pub use manager::{KeyManager, RotationTask};
pub use policy::{FixedTtlPolicy, RotationConfig, RotationPolicy};
