//! Key cache and rotation engine.
//!
//! [`KeyManager`] owns the in-memory [`KeyCache`] snapshot and is the only
//! component that talks to the [`KeyStore`] and the [`Encryptor`].
//!
//! # Architecture
//!
//! ```text
//! rotate(alg) → policy TTL
//!             → list() → current active record → copy with is_active = false
//!             → generate → PKCS#8 → encrypt        (blocking thread)
//!             → store.rotate(new, old)
//!             → reload()
//!
//! sign(alg, build)  → active key for alg ─┐
//! verify(kid, ..)   → key by kid ─────────┤ miss? reload once, retry
//!                                         │
//! jwks()            → snapshot ───────────┘ (no reload)
//! ```
//!
//! # Locking
//!
//! The snapshot sits behind a [`parking_lot::RwLock`] that is held only long
//! enough to clone or replace an `Arc`. Store calls, decryption and key
//! generation all run with no lock held. Concurrent rotations of the same
//! algorithm are not serialized here; the store decides which one wins.
//!
//! Each reload takes a generation number before it lists the store and
//! installs its snapshot only if no later-started reload has installed one
//! already. A slow cache-miss reload therefore cannot overwrite the state a
//! concurrent rotation just published.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{TimeDelta, Utc};
use fail::fail_point;
use keyrotor_storage::{Alg, BoxError, EncryptedKey, KeyRecord, KeyStore};
use parking_lot::RwLock;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    algorithm::PrivateKey,
    cache::{CachedKey, KeyCache},
    config::KeyManagerConfig,
    encryption::Encryptor,
    error::{KeyError, Result, RotationFailure},
    jwks::{JwkSet, build_jwks},
    kid::generate_kid,
    policy::{self, RotationPolicy},
};

/// Signing key lifecycle manager.
///
/// Holds one active key per algorithm plus every older key still in the
/// store, decrypted and ready to sign or verify. Shared across tasks via
/// `Arc`.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use keyrotor_keys::{AesGcmEncryptor, FixedTtlPolicy, KeyManager};
/// use keyrotor_storage::{Alg, MemoryKeyStore};
///
/// # async fn example() -> Result<(), keyrotor_keys::KeyError> {
/// let manager = KeyManager::new(
///     MemoryKeyStore::new(),
///     AesGcmEncryptor::new(&[7u8; 32])?,
///     FixedTtlPolicy::new(Duration::from_secs(30 * 24 * 3600)),
/// )
/// .await?;
///
/// manager.init_keys(&[Alg::EdDsa]).await?;
/// let signature = manager.sign(Alg::EdDsa, |kid| Ok::<_, String>(kid.as_bytes().to_vec())).await?;
/// # Ok(())
/// # }
/// ```
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    encryptor: Arc<dyn Encryptor>,
    policy: Arc<dyn RotationPolicy>,
    cache: RwLock<Installed>,
    next_generation: AtomicU64,
}

/// The published snapshot and the generation of the reload that built it.
struct Installed {
    generation: u64,
    cache: Arc<KeyCache>,
}

impl KeyManager {
    /// Creates a manager and loads the cache from the store.
    ///
    /// # Errors
    ///
    /// Fails if the initial [`reload`](Self::reload) fails.
    pub async fn new(
        store: impl KeyStore + 'static,
        encryptor: impl Encryptor + 'static,
        policy: impl RotationPolicy + 'static,
    ) -> Result<Self> {
        let manager = Self {
            store: Arc::new(store),
            encryptor: Arc::new(encryptor),
            policy: Arc::new(policy),
            cache: RwLock::new(Installed { generation: 0, cache: Arc::new(KeyCache::default()) }),
            next_generation: AtomicU64::new(1),
        };
        manager.reload().await?;
        Ok(manager)
    }

    /// Creates a manager from validated configuration and makes sure every
    /// configured algorithm has an active key.
    ///
    /// The background rotation task is not started; see
    /// [`spawn_rotation_task`](Self::spawn_rotation_task).
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the initial load fails, or a
    /// missing key cannot be created.
    pub async fn from_config(
        config: &KeyManagerConfig,
        store: impl KeyStore + 'static,
        encryptor: impl Encryptor + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let manager = Self::new(store, encryptor, config.rotation_policy()).await?;
        let created = manager.init_keys(&config.algorithms).await?;
        if !created.is_empty() {
            tracing::info!(?created, "created initial signing keys");
        }
        Ok(manager)
    }

    /// Returns the current cache snapshot.
    ///
    /// The snapshot is immutable; later reloads do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<KeyCache> {
        Arc::clone(&self.cache.read().cache)
    }

    /// Rebuilds the cache from the store.
    ///
    /// Every record is decrypted and parsed before anything is replaced; on
    /// any failure the previous snapshot stays in place. A result older than
    /// the installed snapshot is discarded.
    ///
    /// # Errors
    ///
    /// Returns the store, decryption or decode error that stopped the load.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let records = self.store.list().await?;
        let cache = KeyCache::from_records(records, self.encryptor.as_ref())?;
        let count = cache.len();

        let mut installed = self.cache.write();
        if installed.generation > generation {
            tracing::debug!(generation, installed = installed.generation, "discarding stale reload");
            return Ok(());
        }
        *installed = Installed { generation, cache: Arc::new(cache) };
        drop(installed);

        tracing::debug!(keys = count, generation, "key cache reloaded");
        Ok(())
    }

    /// Reloads for a cache miss. Failures are logged and otherwise ignored;
    /// the caller's retry reports the miss.
    async fn reload_on_miss(&self) {
        if let Err(err) = self.reload().await {
            tracing::warn!(error = %err, "reload after cache miss failed");
        }
    }

    /// Returns the active key for `alg`, reloading once on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NoActiveKey`] if the key is still missing after
    /// the reload.
    pub async fn active_key(&self, alg: Alg) -> Result<Arc<CachedKey>> {
        let snapshot = self.snapshot();
        if let Some(key) = snapshot.active(alg) {
            tracing::debug!(%alg, "active key cache hit");
            return Ok(Arc::clone(key));
        }
        tracing::debug!(%alg, "active key cache miss");

        self.reload_on_miss().await;
        self.snapshot().active(alg).cloned().ok_or(KeyError::NoActiveKey { alg })
    }

    /// Returns the key with id `kid`, reloading once on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] if the key is still missing after
    /// the reload.
    pub async fn key_by_kid(&self, kid: &str) -> Result<Arc<CachedKey>> {
        let snapshot = self.snapshot();
        if let Some(key) = snapshot.get(kid) {
            tracing::debug!(kid, "key cache hit");
            return Ok(Arc::clone(key));
        }
        tracing::debug!(kid, "key cache miss");

        self.reload_on_miss().await;
        self.snapshot().get(kid).cloned().ok_or_else(|| KeyError::KeyNotFound { kid: kid.to_owned() })
    }

    /// Signs with the active key for `alg`.
    ///
    /// `build` receives the key id before anything is signed, so the payload
    /// can embed it (a JWS header, for instance). The bytes it returns are
    /// what gets signed.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NoActiveKey`] if `alg` has no active key
    /// - [`KeyError::Payload`] if `build` fails
    /// - [`KeyError::Internal`] if the signing primitive fails
    pub async fn sign<F, E>(&self, alg: Alg, build: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&str) -> std::result::Result<Vec<u8>, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let key = self.active_key(alg).await?;
        let payload = build(key.kid()).map_err(|e| KeyError::Payload(BoxError::from(e.into())))?;
        key.private_key().sign(&payload)
    }

    /// Verifies `signature` over `payload` with the key `kid`.
    ///
    /// Inactive keys verify just like active ones.
    ///
    /// # Errors
    ///
    /// - [`KeyError::KeyNotFound`] if `kid` is unknown
    /// - [`KeyError::InvalidSignature`] or [`KeyError::Decode`] from the algorithm layer
    pub async fn verify(&self, kid: &str, payload: &[u8], signature: &[u8]) -> Result<()> {
        let key = self.key_by_kid(kid).await?;
        key.public_key().verify(key.alg(), payload, signature)
    }

    /// Returns the public key set for every cached key.
    #[must_use]
    pub fn jwks(&self) -> JwkSet {
        let snapshot = self.snapshot();
        build_jwks(snapshot.iter())
    }

    /// Returns [`jwks`](Self::jwks) serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if serialization fails.
    pub fn jwks_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.jwks())
            .map_err(|e| KeyError::internal(format!("JWKS serialization failed: {e}")))
    }

    /// Replaces the active key for `alg` with a freshly generated one and
    /// returns the new key id.
    ///
    /// The previous active key, if any, stays in the store as inactive and
    /// remains available for verification.
    ///
    /// # Errors
    ///
    /// Any failure before the store call leaves both store and cache
    /// untouched. A failure of the final reload is returned even though the
    /// store has already rotated.
    #[tracing::instrument(skip(self, alg), fields(%alg))]
    pub async fn rotate(&self, alg: Alg) -> Result<String> {
        let result = self.rotate_inner(alg).await;
        match &result {
            Ok(kid) => tracing::info!(
                audit.action = "rotate_key",
                audit.resource = %kid,
                audit.result = "success",
                "audit_event"
            ),
            Err(err) => tracing::warn!(
                audit.action = "rotate_key",
                audit.resource = %alg,
                audit.result = %format!("failure: {err}"),
                "audit_event"
            ),
        }
        result
    }

    async fn rotate_inner(&self, alg: Alg) -> Result<String> {
        let config = policy::resolve(self.policy.as_ref())?;
        let ttl = TimeDelta::from_std(config.ttl)
            .map_err(|_| KeyError::policy("rotation TTL out of range"))?;

        let old_key = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|record| record.alg == alg && record.is_active)
            .max_by(|a, b| (a.created_at, &a.kid).cmp(&(b.created_at, &b.kid)))
            .map(|record| record.deactivated());

        let encryptor = Arc::clone(&self.encryptor);
        let encrypted = tokio::task::spawn_blocking(move || -> Result<EncryptedKey> {
            let key = PrivateKey::generate(alg)?;
            let der = key.to_pkcs8_der()?;
            fail_point!("rotate-before-encrypt", |_| {
                Err(KeyError::encryption("injected failure before encrypt"))
            });
            encryptor.encrypt(&der)
        })
        .await
        .map_err(|e| KeyError::internal(format!("key generation task failed: {e}")))??;

        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| KeyError::policy("rotation TTL out of range"))?;
        let record = KeyRecord::builder()
            .kid(generate_kid(alg))
            .alg(alg)
            .created_at(created_at)
            .expires_at(expires_at)
            .encrypted_key(encrypted)
            .build();

        fail_point!("rotate-before-store", |_| {
            Err(KeyError::Storage(keyrotor_storage::StorageError::internal(
                "injected failure before store rotate",
            )))
        });
        self.store.rotate(&record, old_key.as_ref()).await?;

        fail_point!("rotate-before-reload", |_| {
            Err(KeyError::internal("injected failure before reload"))
        });
        self.reload().await?;

        Ok(record.kid)
    }

    /// Rotates every algorithm whose active key has expired.
    ///
    /// All due algorithms are attempted even if some fail. Returns the
    /// rotated algorithms in [`Alg`] order.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::RotationFailed`] listing every algorithm that
    /// could not be rotated.
    #[tracing::instrument(skip(self))]
    pub async fn rotate_expired(&self) -> Result<Vec<Alg>> {
        let now = Utc::now();
        let mut due: Vec<Alg> = self
            .snapshot()
            .active_keys()
            .filter(|key| key.record().is_expired_at(now))
            .map(|key| key.alg())
            .collect();
        due.sort_unstable();

        let mut rotated = Vec::with_capacity(due.len());
        let mut failures = Vec::new();
        for alg in due {
            match self.rotate(alg).await {
                Ok(_) => rotated.push(alg),
                Err(error) => failures.push(RotationFailure { alg, error }),
            }
        }

        if failures.is_empty() { Ok(rotated) } else { Err(KeyError::RotationFailed { failures }) }
    }

    /// Creates a key for each algorithm in `algs` that has no active key.
    ///
    /// Algorithms that already have one are left alone. Stops at the first
    /// failure. Returns the algorithms that were rotated.
    ///
    /// # Errors
    ///
    /// Returns the first rotation error.
    #[tracing::instrument(skip(self))]
    pub async fn init_keys(&self, algs: &[Alg]) -> Result<Vec<Alg>> {
        let mut rotated = Vec::new();
        for &alg in algs {
            if self.snapshot().active(alg).is_some() {
                continue;
            }
            self.rotate(alg).await?;
            rotated.push(alg);
        }
        Ok(rotated)
    }

    /// Starts a background task that runs
    /// [`rotate_expired`](Self::rotate_expired) every `interval`.
    ///
    /// The first check runs immediately. Failures are logged and retried on
    /// the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if `interval` is zero.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn spawn_rotation_task(self: &Arc<Self>, interval: Duration) -> Result<RotationTask> {
        if interval.is_zero() {
            return Err(KeyError::configuration("rotation check interval must be positive"));
        }

        let manager = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("key rotation task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.rotate_expired().await {
                            Ok(rotated) if !rotated.is_empty() => {
                                tracing::info!(?rotated, "rotated expired keys");
                            },
                            Ok(_) => {},
                            Err(err) => {
                                tracing::warn!(error = %err, "scheduled key rotation failed");
                            },
                        }
                    }
                }
            }
        });

        Ok(RotationTask { cancel, handle: Some(handle) })
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager").field("keys", &self.snapshot().len()).finish_non_exhaustive()
    }
}

/// Handle to the background rotation task.
///
/// Dropping the handle stops the task at its next await point;
/// [`shutdown`](Self::shutdown) also waits for it to finish.
#[derive(Debug)]
pub struct RotationTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RotationTask {
    /// Returns `true` once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "key rotation task panicked");
        }
    }
}

impl Drop for RotationTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
