//! Key record types and the storage contract for keyrotor.
//!
//! This crate defines what a signing key looks like at rest and the two-call
//! [`KeyStore`] trait the key manager persists through. The manager itself
//! lives in `keyrotor-keys`; nothing here touches private key material in the
//! clear.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    keyrotor-keys                            │
//! │      KeyManager (cache, rotation, sign/verify, JWKS)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  keyrotor-storage                           │
//! │               KeyStore trait (list, rotate)                 │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │MemoryKeyStore│     your backend (SQL, KV, secret manager)   │
//! │   (testing)  │                                              │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use keyrotor_storage::{Alg, EncryptedKey, KeyRecord, KeyStore, MemoryKeyStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryKeyStore::new();
//!     let record = KeyRecord::builder()
//!         .kid("ES256_AAECAwQFBgcICQoL")
//!         .alg(Alg::Es256)
//!         .encrypted_key(EncryptedKey::new(vec![0; 12], vec![0; 48]))
//!         .build();
//!
//!     store.rotate(&record, None).await?;
//!     assert_eq!(store.list().await?.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Backend
//!
//! 1. Implement [`KeyStore`], making [`KeyStore::rotate`] a single atomic transition
//! 2. Map backend-specific errors to [`StorageError`], keeping the cause as its source
//!
//! See the [`store`] module source for a reference implementation.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a fault-injecting store wrapper and
//!   assertion macros. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod error;
pub mod record;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use error::{BoxError, StorageError, StorageResult};
pub use record::{EncryptedKey, KeyRecord};
pub use store::{KeyStore, MemoryKeyStore};
pub use types::{Alg, UnsupportedAlgorithm};
