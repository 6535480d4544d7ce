//! Shared test utilities for key store testing.
//!
//! This module provides a fault-injecting [`KeyStore`] wrapper and
//! assertion macros for [`StorageResult`] values. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keyrotor-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keyrotor_storage::testutil::InstrumentedKeyStore;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    error::{StorageError, StorageResult},
    record::KeyRecord,
    store::{KeyStore, MemoryKeyStore},
};

/// A [`MemoryKeyStore`] wrapper that counts calls and fails on demand.
///
/// Clones share the same underlying store, counters and switches, so a test
/// can hand one clone to the code under test and keep another to steer it.
#[derive(Debug, Clone, Default)]
pub struct InstrumentedKeyStore {
    inner: MemoryKeyStore,
    fail_list: Arc<AtomicBool>,
    fail_rotate: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
    rotate_calls: Arc<AtomicUsize>,
}

impl InstrumentedKeyStore {
    /// Creates an empty instrumented store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped store for seeding and inspection.
    #[must_use]
    pub fn inner(&self) -> &MemoryKeyStore {
        &self.inner
    }

    /// Makes every subsequent `list` fail with a connection error.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `rotate` fail with a connection error.
    pub fn set_fail_rotate(&self, fail: bool) {
        self.fail_rotate.store(fail, Ordering::SeqCst);
    }

    /// Number of `list` calls so far, failed ones included.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `rotate` calls so far, failed ones included.
    #[must_use]
    pub fn rotate_calls(&self) -> usize {
        self.rotate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for InstrumentedKeyStore {
    async fn list(&self) -> StorageResult<Vec<KeyRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected list failure"));
        }
        self.inner.list().await
    }

    async fn rotate(&self, new_key: &KeyRecord, old_key: Option<&KeyRecord>) -> StorageResult<()> {
        self.rotate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_rotate.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected rotate failure"));
        }
        self.inner.rotate(new_key, old_key).await
    }
}

/// Assert that a [`StorageResult`] is an error of the given [`StorageError`]
/// variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keyrotor_storage::{StorageError, StorageResult, assert_storage_error};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("RS256_gone"));
/// assert_storage_error!(result, NotFound);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "{}: expected StorageError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
