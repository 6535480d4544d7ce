//! Compact JWS tokens signed by the key manager.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(signature)`
//! with a JSON header of `{"alg", "kid", "typ": "JWT"}`. Signatures use the
//! JOSE encodings, so any RFC 7515 verifier holding the exported JWKS can
//! check them.
//!
//! Only the signature is checked on the way back in. Claim validation
//! (`exp`, `aud`, ...) is left to the caller.
//!
//! # Example
//!
//! ```no_run
//! use keyrotor_keys::{KeyManager, jws};
//! use keyrotor_storage::Alg;
//! use serde_json::{Value, json};
//!
//! # async fn example(manager: &KeyManager) -> Result<(), keyrotor_keys::KeyError> {
//! let token = jws::sign_compact(manager, Alg::Es256, &json!({"sub": "svc-a"})).await?;
//! let claims: Value = jws::verify_compact(manager, &token).await?;
//! assert_eq!(claims["sub"], "svc-a");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use keyrotor_storage::Alg;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{KeyError, Result},
    manager::KeyManager,
};

/// Protected header of a compact JWS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signing algorithm, as written in the token.
    pub alg: String,
    /// Id of the signing key.
    pub kid: String,
    /// Media type; `"JWT"` for tokens produced here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Signs `claims` with the active key for `alg` and returns a compact JWS.
///
/// # Errors
///
/// - [`KeyError::Payload`] if `claims` cannot be serialized
/// - any error of [`KeyManager::sign`]
#[tracing::instrument(skip(manager, claims))]
pub async fn sign_compact<T>(manager: &KeyManager, alg: Alg, claims: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let claims = serde_json::to_vec(claims).map_err(|e| KeyError::Payload(Arc::new(e)))?;
    let encoded_claims = URL_SAFE_NO_PAD.encode(claims);

    let mut signing_input = String::new();
    let signature = manager
        .sign(alg, |kid| {
            let header = JwsHeader {
                alg: alg.as_str().to_owned(),
                kid: kid.to_owned(),
                typ: Some("JWT".to_owned()),
            };
            let header = serde_json::to_vec(&header)?;
            signing_input = format!("{}.{encoded_claims}", URL_SAFE_NO_PAD.encode(header));
            Ok::<_, serde_json::Error>(signing_input.as_bytes().to_vec())
        })
        .await?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Decodes the header of a compact JWS without verifying anything.
///
/// # Errors
///
/// Returns [`KeyError::Decode`] if the token is not three base64url parts
/// or the header is not valid JSON.
pub fn decode_header(token: &str) -> Result<JwsHeader> {
    let (header, _, _) = split(token)?;
    decode_json(header, "header")
}

/// Verifies a compact JWS and returns its decoded claims.
///
/// The key is looked up by the header's `kid`, and the header's `alg` must
/// be the algorithm that key was generated for.
///
/// # Errors
///
/// - [`KeyError::Decode`] if the token is malformed
/// - [`KeyError::UnsupportedAlgorithm`] if `alg` is not RS256, ES256 or EdDSA
/// - [`KeyError::KeyNotFound`] if `kid` is unknown
/// - [`KeyError::WrongKeyType`] if `alg` does not match the key
/// - [`KeyError::InvalidSignature`] if the signature does not verify
#[tracing::instrument(skip(manager, token))]
pub async fn verify_compact<T>(manager: &KeyManager, token: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let (encoded_header, encoded_claims, encoded_signature) = split(token)?;
    let header: JwsHeader = decode_json(encoded_header, "header")?;
    let alg: Alg = header.alg.parse()?;

    let key = manager.key_by_kid(&header.kid).await?;
    if key.alg() != alg {
        tracing::debug!(kid = %header.kid, header_alg = %alg, key_alg = %key.alg(), "JWS algorithm mismatch");
        return Err(KeyError::WrongKeyType { expected: key.alg() });
    }

    let signature = decode_part(encoded_signature, "signature")?;
    let signing_input_len = encoded_header.len() + 1 + encoded_claims.len();
    key.public_key().verify(alg, token[..signing_input_len].as_bytes(), &signature)?;

    decode_json(encoded_claims, "claims")
}

fn split(token: &str) -> Result<(&str, &str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None) => Ok((header, claims, signature)),
        _ => Err(KeyError::decode("compact JWS must have exactly three parts")),
    }
}

fn decode_part(encoded: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| KeyError::decode(format!("invalid base64url in JWS {what}: {e}")))
}

fn decode_json<T: DeserializeOwned>(encoded: &str, what: &str) -> Result<T> {
    serde_json::from_slice(&decode_part(encoded, what)?)
        .map_err(|e| KeyError::decode(format!("invalid JSON in JWS {what}: {e}")))
}
