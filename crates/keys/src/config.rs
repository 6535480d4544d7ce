//! Configuration for the key manager.
//!
//! [`KeyManagerConfig`] selects which algorithms get keys, how long each key
//! lives, and how often the background task looks for expired keys.
//! Durations use `humantime` notation (`"30days"`, `"1h"`) when deserialized.

use std::time::Duration;

use keyrotor_storage::Alg;
use serde::{Deserialize, Serialize};

use crate::{
    error::{KeyError, Result},
    policy::FixedTtlPolicy,
};

/// Default key lifetime (30 days).
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default interval between expiry checks (1 hour).
const DEFAULT_ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Key manager settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use keyrotor_keys::KeyManagerConfig;
/// use keyrotor_storage::Alg;
///
/// let config = KeyManagerConfig::builder()
///     .algorithms(vec![Alg::EdDsa])
///     .key_ttl(Duration::from_secs(7 * 24 * 3600))
///     .build();
/// config.validate()?;
/// assert_eq!(config.rotation_check_interval, Duration::from_secs(3600));
/// # Ok::<(), keyrotor_keys::KeyError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyManagerConfig {
    /// Algorithms that must always have an active key.
    #[serde(default = "default_algorithms")]
    #[builder(default = default_algorithms())]
    pub algorithms: Vec<Alg>,

    /// Lifetime of every newly generated key.
    #[serde(with = "humantime_serde", default = "default_key_ttl")]
    #[builder(default = DEFAULT_KEY_TTL)]
    pub key_ttl: Duration,

    /// How often the background task checks for expired keys.
    #[serde(with = "humantime_serde", default = "default_rotation_check_interval")]
    #[builder(default = DEFAULT_ROTATION_CHECK_INTERVAL)]
    pub rotation_check_interval: Duration,
}

fn default_algorithms() -> Vec<Alg> {
    Alg::ALL.to_vec()
}

fn default_key_ttl() -> Duration {
    DEFAULT_KEY_TTL
}

fn default_rotation_check_interval() -> Duration {
    DEFAULT_ROTATION_CHECK_INTERVAL
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl KeyManagerConfig {
    /// Checks the settings for values the manager cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if no algorithm is listed or a
    /// duration is zero.
    pub fn validate(&self) -> Result<()> {
        if self.algorithms.is_empty() {
            return Err(KeyError::configuration("at least one algorithm must be configured"));
        }
        if self.key_ttl.is_zero() {
            return Err(KeyError::configuration("key_ttl must be positive"));
        }
        if self.rotation_check_interval.is_zero() {
            return Err(KeyError::configuration("rotation_check_interval must be positive"));
        }
        Ok(())
    }

    /// Returns a policy granting every new key [`key_ttl`](Self::key_ttl).
    #[must_use]
    pub fn rotation_policy(&self) -> FixedTtlPolicy {
        FixedTtlPolicy::new(self.key_ttl)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::policy::RotationPolicy;

    #[test]
    fn test_defaults() {
        let config = KeyManagerConfig::default();
        assert_eq!(config.algorithms, Alg::ALL.to_vec());
        assert_eq!(config.key_ttl, Duration::from_secs(2_592_000));
        assert_eq!(config.rotation_check_interval, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: KeyManagerConfig = serde_json::from_str(
            r#"{"algorithms":["EdDSA","ES256"],"key_ttl":"7days","rotation_check_interval":"15m"}"#,
        )
        .expect("deserialize");

        assert_eq!(config.algorithms, vec![Alg::EdDsa, Alg::Es256]);
        assert_eq!(config.key_ttl, Duration::from_secs(7 * 86_400));
        assert_eq!(config.rotation_check_interval, Duration::from_secs(900));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: KeyManagerConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, KeyManagerConfig::default());
    }

    #[rstest]
    #[case::unknown_field(r#"{"key_tll":"1h"}"#)]
    #[case::unknown_algorithm(r#"{"algorithms":["HS256"]}"#)]
    #[case::bad_duration(r#"{"key_ttl":"soon"}"#)]
    fn test_deserialize_rejects(#[case] json: &str) {
        assert!(serde_json::from_str::<KeyManagerConfig>(json).is_err());
    }

    #[rstest]
    #[case::no_algorithms(KeyManagerConfig::builder().algorithms(vec![]).build())]
    #[case::zero_ttl(KeyManagerConfig::builder().key_ttl(Duration::ZERO).build())]
    #[case::zero_interval(KeyManagerConfig::builder().rotation_check_interval(Duration::ZERO).build())]
    fn test_validate_rejects(#[case] config: KeyManagerConfig) {
        assert!(matches!(config.validate(), Err(KeyError::Configuration(_))));
    }

    #[test]
    fn test_rotation_policy_uses_key_ttl() {
        let config = KeyManagerConfig::builder().key_ttl(Duration::from_secs(60)).build();
        let rotation = config.rotation_policy().rotation_config().expect("config");
        assert_eq!(rotation.ttl, Duration::from_secs(60));
    }
}
