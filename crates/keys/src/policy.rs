//! Rotation policies.
//!
//! A policy is consulted once per rotation for the new key's lifetime. It
//! may read configuration, a feature flag or a remote setting; the manager
//! does not cache the answer.

use std::time::Duration;

use keyrotor_storage::BoxError;

use crate::error::{KeyError, Result};

/// Settings for one rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RotationConfig {
    /// Lifetime of the new key; `expires_at = created_at + ttl`.
    pub ttl: Duration,
}

impl RotationConfig {
    /// Creates a rotation config with the given TTL.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

/// Supplies the [`RotationConfig`] for each rotation.
///
/// Closures returning `Result<RotationConfig, BoxError>` implement this
/// trait, so a policy can be inlined at construction.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use keyrotor_keys::policy::{RotationConfig, RotationPolicy};
/// use keyrotor_storage::BoxError;
///
/// let policy = || -> Result<RotationConfig, BoxError> { Ok(RotationConfig::new(Duration::from_secs(3600))) };
/// assert_eq!(policy.rotation_config().unwrap().ttl, Duration::from_secs(3600));
/// ```
pub trait RotationPolicy: Send + Sync {
    /// Returns the configuration for the rotation about to happen.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Policy`] if the policy cannot decide; the
    /// rotation is then aborted before anything is generated.
    fn rotation_config(&self) -> Result<RotationConfig>;
}

impl<F> RotationPolicy for F
where
    F: Fn() -> std::result::Result<RotationConfig, BoxError> + Send + Sync,
{
    fn rotation_config(&self) -> Result<RotationConfig> {
        self().map_err(|source| KeyError::Policy {
            message: "policy callback failed".to_owned(),
            source: Some(source),
        })
    }
}

/// A policy that always hands out the same TTL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedTtlPolicy {
    ttl: Duration,
}

impl FixedTtlPolicy {
    /// Creates a policy granting every new key `ttl`.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl RotationPolicy for FixedTtlPolicy {
    fn rotation_config(&self) -> Result<RotationConfig> {
        Ok(RotationConfig::new(self.ttl))
    }
}

/// Fetches a config from `policy` and rejects a zero TTL.
pub(crate) fn resolve(policy: &dyn RotationPolicy) -> Result<RotationConfig> {
    let config = policy.rotation_config()?;
    if config.ttl.is_zero() {
        return Err(KeyError::policy("rotation TTL must be positive"));
    }
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::{error::Error as _, sync::Arc};

    use keyrotor_storage::StorageError;

    use super::*;

    #[test]
    fn test_fixed_policy() {
        let policy = FixedTtlPolicy::new(Duration::from_secs(60));
        assert_eq!(resolve(&policy).expect("ok").ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let policy = FixedTtlPolicy::new(Duration::ZERO);
        assert!(matches!(resolve(&policy), Err(KeyError::Policy { .. })));
    }

    #[test]
    fn test_closure_error_keeps_source() {
        let policy = || -> std::result::Result<RotationConfig, BoxError> {
            Err(Arc::new(StorageError::connection("config service down")))
        };

        let err = resolve(&policy).unwrap_err();
        assert!(matches!(err, KeyError::Policy { .. }));
        assert_eq!(err.source().expect("source").to_string(), "Connection error: config service down");
    }
}
