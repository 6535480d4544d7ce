//! At-rest encryption of private key material.
//!
//! The key manager never persists a private key in the clear: PKCS#8 bytes
//! pass through an [`Encryptor`] before they reach the store and back through
//! it after every `list`. [`AesGcmEncryptor`] is the default backend; callers
//! with a KMS or HSM implement the trait themselves.
//!
//! # Examples
//!
//! ```
//! use keyrotor_keys::encryption::{AesGcmEncryptor, Encryptor};
//!
//! let encryptor = AesGcmEncryptor::new(&[7u8; 32]).unwrap();
//! let sealed = encryptor.encrypt(b"pkcs8 bytes").unwrap();
//! assert_eq!(sealed.nonce.len(), 12);
//!
//! let opened = encryptor.decrypt(&sealed).unwrap();
//! assert_eq!(opened.as_slice(), b"pkcs8 bytes");
//! ```

use std::{fmt, sync::Arc};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use keyrotor_storage::EncryptedKey;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{KeyError, Result};

/// Required master key length for AES-256-GCM.
pub const MASTER_KEY_LEN: usize = 32;

/// Nonce length for AES-256-GCM.
pub const NONCE_LEN: usize = 12;

/// Seals and opens serialized private keys.
///
/// Implementations must use a fresh nonce on every `encrypt` and must
/// authenticate the ciphertext: a wrong key or any tampering has to surface
/// as [`KeyError::Decryption`], never as garbage plaintext.
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext` under a new random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Encryption`] if randomness is unavailable or the
    /// cipher fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey>;

    /// Decrypts and authenticates `encrypted`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Decryption`] if the nonce has the wrong length or
    /// the authentication tag does not verify.
    fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Zeroizing<Vec<u8>>>;
}

impl<E: Encryptor + ?Sized> Encryptor for Arc<E> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Zeroizing<Vec<u8>>> {
        (**self).decrypt(encrypted)
    }
}

/// AES-256-GCM encryptor over a 32-byte master key.
///
/// No associated data is bound; the tag covers the ciphertext only.
#[derive(Clone)]
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    /// Creates an encryptor from raw master key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] unless `master_key` is exactly
    /// [`MASTER_KEY_LEN`] bytes.
    pub fn new(master_key: &[u8]) -> Result<Self> {
        if master_key.len() != MASTER_KEY_LEN {
            return Err(KeyError::configuration(format!(
                "master key must be {MASTER_KEY_LEN} bytes, got {}",
                master_key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(master_key)
            .map_err(|_| KeyError::configuration("invalid AES-256 key"))?;
        Ok(Self { cipher })
    }

    /// Creates an encryptor from a standard base64 master key, as typically
    /// supplied through an environment variable or secret file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if the string is not base64 or
    /// does not decode to [`MASTER_KEY_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map(Zeroizing::new)
            .map_err(|e| KeyError::configuration(format!("master key is not base64: {e}")))?;
        Self::new(&bytes)
    }
}

impl fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryptor").field("cipher", &"[REDACTED]").finish()
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| KeyError::encryption(format!("nonce generation failed: {e}")))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| KeyError::encryption("AES-GCM seal failed"))?;

        Ok(EncryptedKey::new(nonce.to_vec(), ciphertext))
    }

    fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Zeroizing<Vec<u8>>> {
        if encrypted.nonce.len() != NONCE_LEN {
            return Err(KeyError::Decryption);
        }
        self.cipher
            .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| KeyError::Decryption)
    }
}
