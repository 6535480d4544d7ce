//! Decrypted key handles and the immutable cache snapshot built from them.
//!
//! A [`KeyCache`] is built in full from one `list` of the store and never
//! mutated afterwards; the manager swaps whole snapshots. Readers holding an
//! older snapshot keep a consistent view until they drop it.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use keyrotor_storage::{Alg, KeyRecord};

use crate::{
    algorithm::{PrivateKey, PublicKey},
    encryption::Encryptor,
    error::{KeyError, Result},
};

/// A key record together with its decrypted signing key.
///
/// Never persisted. Rebuilt on every reload.
#[derive(Debug, Clone)]
pub struct CachedKey {
    record: KeyRecord,
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl CachedKey {
    /// Wraps a record and its parsed private key, deriving the public key.
    #[must_use]
    pub fn new(record: KeyRecord, private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self { record, private_key, public_key }
    }

    /// Decrypts and parses `record`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Decryption`] if the payload does not open, or
    /// [`KeyError::Decode`] if it is not PKCS#8 or holds a key of a different
    /// kind than `record.alg`.
    pub fn open(record: KeyRecord, encryptor: &dyn Encryptor) -> Result<Self> {
        let plaintext = encryptor.decrypt(&record.encrypted_key)?;
        let private_key = PrivateKey::from_pkcs8_der(&plaintext)?;
        if private_key.alg() != record.alg {
            return Err(KeyError::decode(format!(
                "key {} is recorded as {} but holds a {} key",
                record.kid,
                record.alg,
                private_key.alg()
            )));
        }
        Ok(Self::new(record, private_key))
    }

    /// The persisted record.
    #[must_use]
    pub fn record(&self) -> &KeyRecord {
        &self.record
    }

    /// Key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.record.kid
    }

    /// Algorithm of the record.
    #[must_use]
    pub fn alg(&self) -> Alg {
        self.record.alg
    }

    /// Whether the record is the active key for its algorithm.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.record.is_active
    }

    /// Decrypted signing key.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Derived verification key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// One consistent view of every known key.
///
/// `by_id` holds all keys; `active_by_alg` holds at most one active key per
/// algorithm, and every entry in it is also in `by_id`.
#[derive(Debug, Default, Clone)]
pub struct KeyCache {
    by_id: HashMap<String, Arc<CachedKey>>,
    active_by_alg: HashMap<Alg, Arc<CachedKey>>,
}

impl KeyCache {
    /// Builds a snapshot from stored records, opening each one.
    ///
    /// If the store holds more than one active record for an algorithm, the
    /// newest by `created_at` wins, ties going to the greater key id; the
    /// others are still indexed by id.
    ///
    /// # Errors
    ///
    /// Fails on the first record that cannot be opened; see
    /// [`CachedKey::open`].
    pub fn from_records(
        records: impl IntoIterator<Item = KeyRecord>,
        encryptor: &dyn Encryptor,
    ) -> Result<Self> {
        let mut cache = Self::default();

        for record in records {
            let cached = Arc::new(CachedKey::open(record, encryptor)?);

            if cached.is_active() {
                match cache.active_by_alg.entry(cached.alg()) {
                    Entry::Vacant(slot) => {
                        slot.insert(Arc::clone(&cached));
                    },
                    Entry::Occupied(mut slot) => {
                        let (winner, loser) = if supersedes(&cached, slot.get()) {
                            (Arc::clone(&cached), slot.get().kid().to_owned())
                        } else {
                            (Arc::clone(slot.get()), cached.kid().to_owned())
                        };
                        tracing::warn!(
                            alg = %cached.alg(),
                            active_kid = winner.kid(),
                            ignored_kid = %loser,
                            "multiple active keys for algorithm"
                        );
                        slot.insert(winner);
                    },
                }
            }

            cache.by_id.insert(cached.kid().to_owned(), cached);
        }

        Ok(cache)
    }

    /// Looks up a key by id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&Arc<CachedKey>> {
        self.by_id.get(kid)
    }

    /// Returns the active key for `alg`.
    #[must_use]
    pub fn active(&self, alg: Alg) -> Option<&Arc<CachedKey>> {
        self.active_by_alg.get(&alg)
    }

    /// Iterates over the active keys, one per algorithm that has one.
    pub fn active_keys(&self) -> impl Iterator<Item = &Arc<CachedKey>> {
        self.active_by_alg.values()
    }

    /// Iterates over all keys in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &CachedKey> {
        self.by_id.values().map(|key| &**key)
    }

    /// Returns all key ids, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if no keys are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn supersedes(candidate: &CachedKey, current: &CachedKey) -> bool {
    (candidate.record.created_at, candidate.kid()) > (current.record.created_at, current.kid())
}
