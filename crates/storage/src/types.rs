//! Signing algorithm identifiers.
//!
//! The set of algorithms is closed: anything outside [`Alg`] is rejected when
//! parsed or deserialized, so no downstream code has to carry a wildcard
//! case.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signing algorithm of a key record, named by its JOSE identifier.
///
/// # Examples
///
/// ```
/// use keyrotor_storage::Alg;
///
/// let alg: Alg = "ES256".parse().unwrap();
/// assert_eq!(alg, Alg::Es256);
/// assert_eq!(alg.to_string(), "ES256");
/// assert!("HS256".parse::<Alg>().is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Alg {
    /// RSASSA-PKCS1-v1_5 with SHA-256 over a 2048-bit RSA key.
    #[serde(rename = "RS256")]
    Rs256,
    /// ECDSA over P-256 with SHA-256, raw `R‖S` signatures.
    #[serde(rename = "ES256")]
    Es256,
    /// Ed25519 (pure, no pre-hash).
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl Alg {
    /// All supported algorithms, in a stable order.
    pub const ALL: [Alg; 3] = [Alg::Rs256, Alg::Es256, Alg::EdDsa];

    /// Returns the JOSE identifier (`RS256`, `ES256`, `EdDSA`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Alg::Rs256 => "RS256",
            Alg::Es256 => "ES256",
            Alg::EdDsa => "EdDSA",
        }
    }
}

impl fmt::Display for Alg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an algorithm identifier is not one of [`Alg::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported algorithm: {0}")]
pub struct UnsupportedAlgorithm(pub String);

impl FromStr for Alg {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Alg::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| UnsupportedAlgorithm(s.to_owned()))
    }
}
