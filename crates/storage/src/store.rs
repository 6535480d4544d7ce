//! Storage trait for key records, plus an in-memory implementation.
//!
//! The key manager only ever talks to storage through two calls:
//!
//! ```text
//! reload ──► list()            every record, any algorithm, active or not
//! rotate ──► rotate(new, old)  insert `new` as active and persist `old`
//!                              as inactive, as one durable transition
//! ```
//!
//! There is deliberately no `get` or `delete` in the contract: lookups go
//! through the manager's cache, which refreshes itself with a full `list`
//! on a miss.
//!
//! # Usage
//!
//! ```no_run
//! use keyrotor_storage::{KeyRecord, KeyStore, StorageError};
//!
//! async fn active_count<S: KeyStore>(store: &S) -> Result<usize, StorageError> {
//!     Ok(store.list().await?.iter().filter(|r| r.is_active).count())
//! }
//! ```

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    record::KeyRecord,
};

/// Persistence collaborator for key records.
///
/// Implementations own durability and the atomicity of
/// [`rotate`](Self::rotate). They are expected to enforce their own
/// timeouts; the key manager imposes none.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Returns every stored record.
    ///
    /// No ordering is guaranteed.
    async fn list(&self) -> StorageResult<Vec<KeyRecord>>;

    /// Inserts `new_key` and persists `old_key` (already marked inactive by
    /// the caller) as a single transition.
    ///
    /// If `old_key` is `None`, only `new_key` is inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `old_key` names a record that does not exist ([`StorageError::NotFound`])
    /// - `new_key.kid` is already stored ([`StorageError::Conflict`])
    /// - The backend is unavailable
    ///
    /// On error nothing has been persisted.
    async fn rotate(&self, new_key: &KeyRecord, old_key: Option<&KeyRecord>) -> StorageResult<()>;
}

#[async_trait]
impl<S: KeyStore + ?Sized> KeyStore for Arc<S> {
    async fn list(&self) -> StorageResult<Vec<KeyRecord>> {
        (**self).list().await
    }

    async fn rotate(&self, new_key: &KeyRecord, old_key: Option<&KeyRecord>) -> StorageResult<()> {
        (**self).rotate(new_key, old_key).await
    }
}

/// In-memory implementation of [`KeyStore`] for tests and development.
///
/// Records live in a hash map behind a [`parking_lot::RwLock`]; a rotation
/// validates and applies both halves under one write lock. Nothing survives
/// a restart.
///
/// # Examples
///
/// ```
/// use keyrotor_storage::{Alg, EncryptedKey, KeyRecord, KeyStore, MemoryKeyStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryKeyStore::new();
///     let first = KeyRecord::builder()
///         .kid("EdDSA_first")
///         .alg(Alg::EdDsa)
///         .encrypted_key(EncryptedKey::new(vec![], vec![]))
///         .build();
///     store.rotate(&first, None).await?;
///
///     let second = KeyRecord { kid: "EdDSA_second".into(), ..first.clone() };
///     store.rotate(&second, Some(&first.deactivated())).await?;
///
///     let active: Vec<_> = store.list().await?.into_iter().filter(|r| r.is_active).collect();
///     assert_eq!(active.len(), 1);
///     assert_eq!(active[0].kid, "EdDSA_second");
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyStore {
    /// Records indexed by kid.
    records: Arc<RwLock<HashMap<String, KeyRecord>>>,
}

impl MemoryKeyStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record directly, bypassing rotation.
    ///
    /// Used to seed fixtures, including deliberately inconsistent ones
    /// (two active records for one algorithm, undecryptable payloads).
    pub fn insert(&self, record: KeyRecord) {
        self.records.write().insert(record.kid.clone(), record);
    }

    /// Returns a copy of the record with the given kid, if stored.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<KeyRecord> {
        self.records.read().get(kid).cloned()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> StorageResult<Vec<KeyRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    #[tracing::instrument(
        skip(self, new_key, old_key),
        fields(new_kid = %new_key.kid, old_kid = old_key.map(|k| k.kid.as_str()))
    )]
    async fn rotate(&self, new_key: &KeyRecord, old_key: Option<&KeyRecord>) -> StorageResult<()> {
        let mut records = self.records.write();

        // Validate both preconditions before mutating
        if let Some(old) = old_key
            && !records.contains_key(&old.kid)
        {
            return Err(StorageError::not_found(&old.kid));
        }
        if records.contains_key(&new_key.kid) {
            return Err(StorageError::conflict(&new_key.kid));
        }

        if let Some(old) = old_key
            && let Entry::Occupied(mut entry) = records.entry(old.kid.clone())
        {
            entry.insert(old.clone());
        }
        records.insert(new_key.kid.clone(), new_key.clone());

        Ok(())
    }
}
