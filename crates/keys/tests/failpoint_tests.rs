#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection during key rotation.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p keyrotor-keys --features failpoints,testutil --test failpoint_tests
//! ```

use keyrotor_keys::{KeyManager, assert_key_error, testutil::test_manager};
use keyrotor_storage::{Alg, KeyRecord, KeyStore, testutil::InstrumentedKeyStore};

async fn setup_with_key(alg: Alg) -> (KeyManager, InstrumentedKeyStore, String) {
    let store = InstrumentedKeyStore::new();
    let manager = test_manager(store.clone()).await;
    let kid = manager.rotate(alg).await.expect("initial rotation");
    (manager, store, kid)
}

async fn stored(store: &InstrumentedKeyStore) -> Vec<KeyRecord> {
    let mut records = store.inner().list().await.expect("list");
    records.sort_by(|a, b| a.kid.cmp(&b.kid));
    records
}

#[tokio::test]
async fn failure_before_encrypt_leaves_store_untouched() {
    let scenario = fail::FailScenario::setup();
    let (manager, store, kid) = setup_with_key(Alg::Es256).await;
    let before = stored(&store).await;
    let rotate_calls = store.rotate_calls();

    fail::cfg("rotate-before-encrypt", "return").expect("failed to configure fail point");
    let result = manager.rotate(Alg::Es256).await;

    assert_key_error!(result, Encryption);
    assert_eq!(store.rotate_calls(), rotate_calls);
    assert_eq!(stored(&store).await, before);
    assert_eq!(manager.active_key(Alg::Es256).await.expect("active").kid(), kid);

    scenario.teardown();
}

#[tokio::test]
async fn failure_before_store_leaves_store_untouched() {
    let scenario = fail::FailScenario::setup();
    let (manager, store, kid) = setup_with_key(Alg::EdDsa).await;
    let before = stored(&store).await;
    let rotate_calls = store.rotate_calls();

    fail::cfg("rotate-before-store", "return").expect("failed to configure fail point");
    let result = manager.rotate(Alg::EdDsa).await;

    assert_key_error!(result, Storage);
    assert_eq!(store.rotate_calls(), rotate_calls);
    assert_eq!(stored(&store).await, before);
    assert_eq!(manager.active_key(Alg::EdDsa).await.expect("active").kid(), kid);

    scenario.teardown();
}

#[tokio::test]
async fn failure_after_store_is_reported_and_recovered_by_reload() {
    let scenario = fail::FailScenario::setup();
    let (manager, store, old_kid) = setup_with_key(Alg::EdDsa).await;

    fail::cfg("rotate-before-reload", "return").expect("failed to configure fail point");
    let result = manager.rotate(Alg::EdDsa).await;
    assert_key_error!(result, Internal);

    // The store has already rotated; the cache still serves the old key.
    let active: Vec<_> = stored(&store).await.into_iter().filter(|r| r.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_ne!(active[0].kid, old_kid);
    assert_eq!(manager.active_key(Alg::EdDsa).await.expect("active").kid(), old_kid);

    fail::remove("rotate-before-reload");
    manager.reload().await.expect("reload");
    assert_eq!(manager.active_key(Alg::EdDsa).await.expect("active").kid(), active[0].kid);

    scenario.teardown();
}

#[tokio::test]
async fn rotation_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    let (manager, store, old_kid) = setup_with_key(Alg::EdDsa).await;

    let new_kid = manager.rotate(Alg::EdDsa).await.expect("rotate");
    assert_ne!(new_kid, old_kid);
    assert_eq!(store.inner().len(), 2);

    scenario.teardown();
}
