//! Public key export as a JSON Web Key Set (RFC 7517).
//!
//! Every cached key is published, active or not, so that tokens signed
//! before a rotation stay verifiable until the relying party refreshes.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use keyrotor_storage::Alg;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use crate::{algorithm::PublicKey, cache::CachedKey};

/// JWK `kty` values produced by the exporter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA key (`n`, `e`).
    #[serde(rename = "RSA")]
    Rsa,
    /// Elliptic curve key (`crv`, `x`, `y`).
    #[serde(rename = "EC")]
    Ec,
    /// Octet key pair (`crv`, `x`).
    #[serde(rename = "OKP")]
    Okp,
}

/// JWK `crv` values produced by the exporter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    /// NIST P-256.
    #[serde(rename = "P-256")]
    P256,
    /// Edwards 25519.
    #[serde(rename = "Ed25519")]
    Ed25519,
}

/// A single public key entry.
///
/// Binary members are base64url without padding. Members that do not apply
/// to the key type are omitted from the JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type.
    pub kty: KeyType,
    /// Key id.
    pub kid: String,
    /// Algorithm the key is used with.
    pub alg: Alg,
    /// Intended use; always `"sig"`.
    #[serde(rename = "use")]
    pub key_use: String,
    /// Curve, for EC and OKP keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<Curve>,
    /// RSA modulus, unsigned big-endian without leading zeros.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC x coordinate or the Ed25519 public key.
    ///
    /// EC coordinates are always the full 32 bytes, leading zeros included,
    /// as RFC 7518 section 6.2.1.2 requires; they are not minimal integers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate (32 bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// The exported key set document: `{"keys": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Returns the entry with the given key id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// Builds the JWK for a public key published under `kid` as `alg`.
///
/// Returns `None` if the key kind does not belong to `alg`.
#[must_use]
pub fn public_key_to_jwk(kid: &str, alg: Alg, public_key: &PublicKey) -> Option<Jwk> {
    if public_key.alg() != alg {
        return None;
    }

    let mut jwk = Jwk {
        kty: KeyType::Rsa,
        kid: kid.to_owned(),
        alg,
        key_use: "sig".to_owned(),
        crv: None,
        n: None,
        e: None,
        x: None,
        y: None,
    };

    match public_key {
        PublicKey::Rsa(key) => {
            jwk.n = Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()));
            jwk.e = Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()));
        },
        PublicKey::Ecdsa(key) => {
            let point = key.to_encoded_point(false);
            jwk.kty = KeyType::Ec;
            jwk.crv = Some(Curve::P256);
            jwk.x = Some(URL_SAFE_NO_PAD.encode(point.x()?));
            jwk.y = Some(URL_SAFE_NO_PAD.encode(point.y()?));
        },
        PublicKey::Ed25519(key) => {
            jwk.kty = KeyType::Okp;
            jwk.crv = Some(Curve::Ed25519);
            jwk.x = Some(URL_SAFE_NO_PAD.encode(key.as_bytes()));
        },
    }
    Some(jwk)
}

/// Builds a key set from cached keys, ordered by creation time then key id.
///
/// Keys whose public key kind does not match their record's algorithm are
/// skipped.
pub fn build_jwks<'a>(keys: impl IntoIterator<Item = &'a CachedKey>) -> JwkSet {
    let mut keys: Vec<&CachedKey> = keys.into_iter().collect();
    keys.sort_by(|a, b| {
        a.record().created_at.cmp(&b.record().created_at).then_with(|| a.kid().cmp(b.kid()))
    });

    let keys = keys
        .into_iter()
        .filter_map(|cached| {
            let jwk = public_key_to_jwk(cached.kid(), cached.alg(), cached.public_key());
            if jwk.is_none() {
                tracing::debug!(
                    kid = cached.kid(),
                    alg = %cached.alg(),
                    "skipping key with mismatched public key kind"
                );
            }
            jwk
        })
        .collect();

    JwkSet { keys }
}
