//! Durable key record and its encrypted private key payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Alg;

/// Private key material sealed by an encryptor.
///
/// The store treats both fields as opaque bytes. Only the encryptor that
/// produced them knows how to open them. When serialized, both fields are
/// base64url-encoded without padding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedKey {
    /// Per-encryption nonce.
    #[serde(with = "base64url")]
    pub nonce: Vec<u8>,

    /// Ciphertext including the authentication tag.
    #[serde(with = "base64url")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedKey {
    /// Creates a new encrypted payload from its parts.
    #[must_use]
    pub fn new(nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }
}

/// A signing key as persisted by a [`KeyStore`](crate::KeyStore).
///
/// # Lifecycle
///
/// A record is created active by a rotation and deactivated by the next
/// rotation of the same algorithm. Records are never deleted by the key
/// manager; inactive keys stay published so that signatures made before a
/// rotation remain verifiable.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use keyrotor_storage::{Alg, EncryptedKey, KeyRecord};
///
/// let record = KeyRecord::builder()
///     .kid("EdDSA_q0mWc1l2n3o4p5q6")
///     .alg(Alg::EdDsa)
///     .expires_at(Utc::now() + Duration::days(30))
///     .encrypted_key(EncryptedKey::new(vec![0; 12], vec![1, 2, 3]))
///     .build();
///
/// assert!(record.is_active);
/// assert!(!record.is_expired_at(Utc::now()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct KeyRecord {
    /// Key id: algorithm prefix plus a random suffix. Never reused.
    #[builder(into)]
    pub kid: String,

    /// Algorithm the private key belongs to.
    pub alg: Alg,

    /// Whether this is the key currently used for new signatures.
    #[builder(default = true)]
    pub is_active: bool,

    /// When the key was generated.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    /// When the key is due for rotation, if ever.
    pub expires_at: Option<DateTime<Utc>>,

    /// Sealed PKCS#8 private key.
    pub encrypted_key: EncryptedKey,
}

impl KeyRecord {
    /// Returns `true` if `expires_at` is set and strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }

    /// Returns a copy of this record with `is_active` cleared.
    ///
    /// Rotation hands this copy to the store as the "old" record; the
    /// original (possibly owned by a cache) is left untouched.
    #[must_use]
    pub fn deactivated(&self) -> Self {
        Self { is_active: false, ..self.clone() }
    }
}

mod base64url {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}
