//! Per-algorithm key operations.
//!
//! [`PrivateKey`] and [`PublicKey`] are closed enums over the three supported
//! key kinds; every operation dispatches with a single `match`, so adding an
//! algorithm is a compile error everywhere it matters.
//!
//! | Alg   | Key            | Hash    | Signature            |
//! |-------|----------------|---------|----------------------|
//! | RS256 | RSA 2048       | SHA-256 | PKCS#1 v1.5, 256 B   |
//! | ES256 | P-256          | SHA-256 | raw `R‖S`, 64 B      |
//! | EdDSA | Ed25519        | none    | pure Ed25519, 64 B   |

use std::fmt;

use ed25519_dalek::{Signer as _, Verifier as _};
use keyrotor_storage::Alg;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use pkcs8::{EncodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rand_core::OsRng;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    der::{COORDINATE_LEN, RAW_SIGNATURE_LEN, der_to_raw},
    error::{KeyError, Result},
};

/// RSA modulus size for generated RS256 keys.
pub const RSA_KEY_BITS: usize = 2048;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Digest applied to the message before the signing primitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashKind {
    /// The primitive consumes the message directly (Ed25519).
    None,
    /// SHA-256 pre-hash.
    Sha256,
}

/// Returns the pre-hash used by `alg`.
#[must_use]
pub const fn hash_kind(alg: Alg) -> HashKind {
    match alg {
        Alg::Rs256 | Alg::Es256 => HashKind::Sha256,
        Alg::EdDsa => HashKind::None,
    }
}

/// A parsed private signing key.
///
/// `Debug` never prints key material.
#[derive(Clone)]
pub enum PrivateKey {
    /// RSA private key (boxed: it is much larger than the others).
    Rsa(Box<RsaPrivateKey>),
    /// P-256 ECDSA signing key.
    Ecdsa(p256::ecdsa::SigningKey),
    /// Ed25519 signing key.
    Ed25519(ed25519_dalek::SigningKey),
}

/// A public verification key derived from a [`PrivateKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    /// RSA public key.
    Rsa(RsaPublicKey),
    /// P-256 ECDSA verifying key.
    Ecdsa(p256::ecdsa::VerifyingKey),
    /// Ed25519 verifying key.
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PrivateKey {
    /// Generates a fresh key for `alg` from the OS CSPRNG.
    ///
    /// RSA generation takes tens to hundreds of milliseconds; async callers
    /// should run this on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if RSA prime generation fails.
    pub fn generate(alg: Alg) -> Result<Self> {
        match alg {
            Alg::Rs256 => RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(|e| KeyError::internal(format!("RSA key generation failed: {e}"))),
            Alg::Es256 => Ok(Self::Ecdsa(p256::ecdsa::SigningKey::random(&mut OsRng))),
            Alg::EdDsa => Ok(Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))),
        }
    }

    /// Returns the algorithm this key kind signs with.
    #[must_use]
    pub fn alg(&self) -> Alg {
        match self {
            Self::Rsa(_) => Alg::Rs256,
            Self::Ecdsa(_) => Alg::Es256,
            Self::Ed25519(_) => Alg::EdDsa,
        }
    }

    /// Derives the public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            Self::Ecdsa(key) => PublicKey::Ecdsa(*key.verifying_key()),
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Serializes the key as PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if the encoder fails.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = match self {
            Self::Rsa(key) => key.to_pkcs8_der(),
            Self::Ecdsa(key) => key.to_pkcs8_der(),
            Self::Ed25519(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| KeyError::internal(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Parses a PKCS#8 (v1 or v2) private key, detecting its kind from the
    /// algorithm identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Decode`] if the bytes are not PKCS#8, the
    /// algorithm is not RSA, P-256 or Ed25519, or the key body is invalid.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| KeyError::decode(format!("invalid PKCS#8: {e}")))?;
        let oid = info.algorithm.oid;

        let parsed = if oid == OID_ED25519 {
            ed25519_dalek::SigningKey::try_from(info).map(Self::Ed25519)
        } else if oid == OID_EC_PUBLIC_KEY {
            p256::ecdsa::SigningKey::try_from(info).map(Self::Ecdsa)
        } else if oid == OID_RSA_ENCRYPTION {
            RsaPrivateKey::try_from(info).map(|key| Self::Rsa(Box::new(key)))
        } else {
            return Err(KeyError::decode(format!("unsupported PKCS#8 key algorithm {oid}")));
        };

        parsed.map_err(|e| KeyError::decode(format!("invalid PKCS#8 key body: {e}")))
    }

    /// Signs `message`, pre-hashing where the algorithm requires it.
    ///
    /// ECDSA signatures are returned as 64-byte raw `R‖S`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if the primitive fails, or a codec
    /// error if an ECDSA signature cannot be re-encoded.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| KeyError::internal(format!("RSA signing failed: {e}")))
            },
            Self::Ecdsa(key) => {
                let digest = Sha256::digest(message);
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| KeyError::internal(format!("ECDSA signing failed: {e}")))?;
                Ok(der_to_raw(signature.to_der().as_bytes())?.to_vec())
            },
            Self::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Rsa(_) => "Rsa",
            Self::Ecdsa(_) => "Ecdsa",
            Self::Ed25519(_) => "Ed25519",
        };
        write!(f, "PrivateKey::{kind}([REDACTED])")
    }
}

impl PublicKey {
    /// Returns the algorithm this key kind verifies.
    #[must_use]
    pub fn alg(&self) -> Alg {
        match self {
            Self::Rsa(_) => Alg::Rs256,
            Self::Ecdsa(_) => Alg::Es256,
            Self::Ed25519(_) => Alg::EdDsa,
        }
    }

    /// Verifies `signature` over `message` as `alg`.
    ///
    /// See [`verify`].
    pub fn verify(&self, alg: Alg, message: &[u8], signature: &[u8]) -> Result<()> {
        verify(alg, self, message, signature)
    }
}

/// Verifies `signature` over `message` with `public_key` as `alg`.
///
/// ES256 signatures must be raw `R‖S` of even length; the halves are split
/// at the midpoint.
///
/// # Errors
///
/// - [`KeyError::WrongKeyType`] if `public_key` is not of the kind `alg` needs
/// - [`KeyError::Decode`] for an odd-length ES256 signature
/// - [`KeyError::InvalidSignature`] if verification fails for any other reason
pub fn verify(alg: Alg, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    match (alg, public_key) {
        (Alg::Rs256, PublicKey::Rsa(key)) => {
            let digest = Sha256::digest(message);
            key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                .map_err(|_| KeyError::InvalidSignature)
        },
        (Alg::Es256, PublicKey::Ecdsa(key)) => {
            let raw = raw_ecdsa_signature(signature)?;
            let signature = p256::ecdsa::Signature::from_slice(&raw)
                .map_err(|_| KeyError::InvalidSignature)?;
            let digest = Sha256::digest(message);
            key.verify_prehash(&digest, &signature).map_err(|_| KeyError::InvalidSignature)
        },
        (Alg::EdDsa, PublicKey::Ed25519(key)) => {
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| KeyError::InvalidSignature)?;
            key.verify(message, &signature).map_err(|_| KeyError::InvalidSignature)
        },
        (expected, _) => Err(KeyError::WrongKeyType { expected }),
    }
}

/// Normalizes an even-length `R‖S` of any width to 64 bytes.
fn raw_ecdsa_signature(signature: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN]> {
    if signature.len() % 2 != 0 {
        return Err(KeyError::decode(format!(
            "ECDSA signature length must be even, got {}",
            signature.len()
        )));
    }
    let (r, s) = signature.split_at(signature.len() / 2);

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    for (half, dst) in [r, s].into_iter().zip(raw.chunks_exact_mut(COORDINATE_LEN)) {
        let start = half.iter().position(|&b| b != 0).unwrap_or(half.len());
        let magnitude = &half[start..];
        if magnitude.len() > COORDINATE_LEN {
            return Err(KeyError::InvalidSignature);
        }
        dst[COORDINATE_LEN - magnitude.len()..].copy_from_slice(magnitude);
    }
    Ok(raw)
}
