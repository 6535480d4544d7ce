//! Shared test utilities for key manager testing.
//!
//! This module provides pass-through and fault-injecting [`Encryptor`]s,
//! a record factory that produces real keys, and an assertion macro for
//! [`KeyError`](crate::error::KeyError) variants. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keyrotor-keys = { path = "../keys", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keyrotor_keys::testutil::{PlaintextEncryptor, make_record};
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use keyrotor_storage::{Alg, EncryptedKey, KeyRecord, KeyStore};
use zeroize::Zeroizing;

use crate::{
    algorithm::PrivateKey,
    encryption::Encryptor,
    error::{KeyError, Result},
    kid::generate_kid,
    manager::KeyManager,
    policy::FixedTtlPolicy,
};

/// Key lifetime used by [`test_manager`].
pub const TEST_TTL: Duration = Duration::from_secs(3600);

/// An [`Encryptor`] that stores the plaintext as the ciphertext.
///
/// Keeps tests independent of AES and makes records easy to tamper with.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncryptor;

impl Encryptor for PlaintextEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey> {
        Ok(EncryptedKey::new(Vec::new(), plaintext.to_vec()))
    }

    fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(encrypted.ciphertext.clone()))
    }
}

/// A [`PlaintextEncryptor`] whose two directions can be switched to fail.
///
/// Clones share their switches.
#[derive(Debug, Clone, Default)]
pub struct FaultyEncryptor {
    fail_encrypt: Arc<AtomicBool>,
    fail_decrypt: Arc<AtomicBool>,
}

impl FaultyEncryptor {
    /// Creates an encryptor that succeeds until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `encrypt` fail.
    pub fn set_fail_encrypt(&self, fail: bool) {
        self.fail_encrypt.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `decrypt` fail.
    pub fn set_fail_decrypt(&self, fail: bool) {
        self.fail_decrypt.store(fail, Ordering::SeqCst);
    }
}

impl Encryptor for FaultyEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey> {
        if self.fail_encrypt.load(Ordering::SeqCst) {
            return Err(KeyError::encryption("injected encrypt failure"));
        }
        PlaintextEncryptor.encrypt(plaintext)
    }

    fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Zeroizing<Vec<u8>>> {
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(KeyError::Decryption);
        }
        PlaintextEncryptor.decrypt(encrypted)
    }
}

/// Builds a record holding a freshly generated `alg` key, encrypted with
/// `encryptor`, created now and without expiry.
///
/// # Panics
///
/// Panics if key generation or encryption fails.
pub fn make_record(encryptor: &dyn Encryptor, alg: Alg, active: bool) -> KeyRecord {
    let key = PrivateKey::generate(alg).expect("generate test key");
    let der = key.to_pkcs8_der().expect("encode test key");
    KeyRecord::builder()
        .kid(generate_kid(alg))
        .alg(alg)
        .is_active(active)
        .encrypted_key(encryptor.encrypt(&der).expect("encrypt test key"))
        .build()
}

/// Creates a [`KeyManager`] over `store` with a [`PlaintextEncryptor`] and a
/// [`TEST_TTL`] policy.
///
/// # Panics
///
/// Panics if the initial load fails.
pub async fn test_manager(store: impl KeyStore + 'static) -> KeyManager {
    KeyManager::new(store, PlaintextEncryptor, FixedTtlPolicy::new(TEST_TTL))
        .await
        .expect("create test manager")
}

/// Asserts that a [`Result<T, KeyError>`] is an `Err` matching the given
/// [`KeyError`](crate::error::KeyError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keyrotor_keys::{assert_key_error, error::KeyError};
///
/// let result: Result<(), KeyError> = Err(KeyError::InvalidSignature);
/// assert_key_error!(result, InvalidSignature);
/// ```
#[macro_export]
macro_rules! assert_key_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::KeyError::$variant { .. })),
            "expected KeyError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::KeyError::$variant { .. })),
            "{}: expected KeyError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_encryptor_round_trips() {
        let encrypted = PlaintextEncryptor.encrypt(b"secret").expect("encrypt");
        assert!(encrypted.nonce.is_empty());
        assert_eq!(&*PlaintextEncryptor.decrypt(&encrypted).expect("decrypt"), b"secret");
    }

    #[test]
    fn test_faulty_encryptor_switches() {
        let enc = FaultyEncryptor::new();
        let copy = enc.clone();
        let encrypted = enc.encrypt(b"k").expect("encrypt");

        copy.set_fail_encrypt(true);
        assert_key_error!(enc.encrypt(b"k"), Encryption);

        copy.set_fail_decrypt(true);
        assert_key_error!(enc.decrypt(&encrypted), Decryption);

        copy.set_fail_decrypt(false);
        assert!(enc.decrypt(&encrypted).is_ok());
    }

    #[test]
    fn test_make_record_opens() {
        let record = make_record(&PlaintextEncryptor, Alg::Es256, false);
        assert!(!record.is_active);
        assert!(record.expires_at.is_none());
        let der = PlaintextEncryptor.decrypt(&record.encrypted_key).expect("decrypt");
        assert_eq!(PrivateKey::from_pkcs8_der(&der).expect("parse").alg(), Alg::Es256);
    }
}
