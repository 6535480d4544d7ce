//! Interoperability tests against an independent JOSE implementation.
//!
//! Tokens signed by the key manager must verify with `jsonwebtoken` using
//! only the exported JWKS, and tokens signed by `jsonwebtoken` with a
//! managed key must verify through the manager.
#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, jwk::JwkSet};
use keyrotor_keys::{AesGcmEncryptor, FixedTtlPolicy, KeyManager, jws};
use keyrotor_storage::{Alg, MemoryKeyStore};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn manager() -> KeyManager {
    let manager = KeyManager::new(
        MemoryKeyStore::new(),
        AesGcmEncryptor::new(&[0x33; 32]).expect("encryptor"),
        FixedTtlPolicy::new(Duration::from_secs(3600)),
    )
    .await
    .expect("manager");
    manager.init_keys(&Alg::ALL).await.expect("init");
    manager
}

fn jose_algorithm(alg: Alg) -> Algorithm {
    match alg {
        Alg::Rs256 => Algorithm::RS256,
        Alg::Es256 => Algorithm::ES256,
        Alg::EdDsa => Algorithm::EdDSA,
    }
}

fn claims() -> Value {
    json!({
        "sub": "svc-interop",
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 300,
    })
}

fn exported_set(manager: &KeyManager) -> JwkSet {
    serde_json::from_slice(&manager.jwks_json().expect("jwks")).expect("jsonwebtoken parses our JWKS")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manager_tokens_verify_with_exported_jwks() {
    let manager = manager().await;
    let set = exported_set(&manager);
    assert_eq!(set.keys.len(), 3);

    for alg in Alg::ALL {
        let claims = claims();
        let token = jws::sign_compact(&manager, alg, &claims).await.expect("sign");

        let header = jsonwebtoken::decode_header(&token).expect("header");
        assert_eq!(header.alg, jose_algorithm(alg));
        let kid = header.kid.expect("kid");
        let jwk = set.find(&kid).unwrap_or_else(|| panic!("{kid} missing from JWKS"));

        let key = DecodingKey::from_jwk(jwk).expect("decoding key from JWK");
        let decoded = jsonwebtoken::decode::<Value>(&token, &key, &Validation::new(jose_algorithm(alg)))
            .unwrap_or_else(|e| panic!("{alg} token rejected by jsonwebtoken: {e}"));
        assert_eq!(decoded.claims, claims);
    }
}

#[tokio::test]
async fn rotated_out_keys_stay_in_jwks() {
    let manager = manager().await;
    let token = jws::sign_compact(&manager, Alg::Es256, &claims()).await.expect("sign");
    manager.rotate(Alg::Es256).await.expect("rotate");

    let set = exported_set(&manager);
    assert_eq!(set.keys.len(), 4);

    let kid = jsonwebtoken::decode_header(&token).expect("header").kid.expect("kid");
    let key = DecodingKey::from_jwk(set.find(&kid).expect("old key published")).expect("decoding key");
    jsonwebtoken::decode::<Value>(&token, &key, &Validation::new(Algorithm::ES256))
        .expect("token from before rotation still verifies");
}

#[tokio::test]
async fn jsonwebtoken_tokens_verify_through_manager() {
    let manager = manager().await;

    // jsonwebtoken reads RSA private keys only as PKCS#1.
    for alg in [Alg::Es256, Alg::EdDsa] {
        let key = manager.active_key(alg).await.expect("active key");
        let pkcs8 = key.private_key().to_pkcs8_der().expect("pkcs8");
        let encoding_key = match alg {
            Alg::Es256 => EncodingKey::from_ec_der(&pkcs8),
            _ => EncodingKey::from_ed_der(&pkcs8),
        };

        let mut header = Header::new(jose_algorithm(alg));
        header.kid = Some(key.kid().to_owned());
        let claims = claims();
        let token = jsonwebtoken::encode(&header, &claims, &encoding_key).expect("encode");

        let decoded: Value = jws::verify_compact(&manager, &token)
            .await
            .unwrap_or_else(|e| panic!("{alg} jsonwebtoken token rejected: {e}"));
        assert_eq!(decoded, claims);
    }
}

#[tokio::test]
async fn jwks_members_match_jose_expectations() {
    let manager = manager().await;
    let json: Value = serde_json::from_slice(&manager.jwks_json().expect("jwks")).expect("parse");

    for entry in json["keys"].as_array().expect("keys") {
        assert_eq!(entry["use"], "sig");
        match entry["alg"].as_str().expect("alg") {
            "RS256" => {
                assert_eq!(entry["kty"], "RSA");
                assert_eq!(entry["e"], "AQAB");
            },
            "ES256" => {
                assert_eq!(entry["kty"], "EC");
                assert_eq!(entry["crv"], "P-256");
                assert_eq!(entry["x"].as_str().map(str::len), Some(43));
                assert_eq!(entry["y"].as_str().map(str::len), Some(43));
            },
            "EdDSA" => {
                assert_eq!(entry["kty"], "OKP");
                assert_eq!(entry["crv"], "Ed25519");
                assert_eq!(entry["x"].as_str().map(str::len), Some(43));
            },
            other => panic!("unexpected alg {other}"),
        }
    }
}
