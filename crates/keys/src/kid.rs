//! Key id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use keyrotor_storage::Alg;
use rand_core::{OsRng, RngCore};

/// Random bytes behind each key id suffix.
pub const KID_RANDOM_BYTES: usize = 12;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a key id of the form `<alg>_<base64url(12 random bytes)>`.
///
/// If the OS RNG is unavailable the suffix is derived from the current
/// timestamp and a process-wide counter instead, which is still unique
/// within the process.
///
/// # Examples
///
/// ```
/// use keyrotor_keys::kid::generate_kid;
/// use keyrotor_storage::Alg;
///
/// let kid = generate_kid(Alg::Es256);
/// assert!(kid.starts_with("ES256_"));
/// assert_eq!(kid.len(), "ES256_".len() + 16);
/// ```
#[must_use]
pub fn generate_kid(alg: Alg) -> String {
    let mut buf = [0u8; KID_RANDOM_BYTES];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => format!("{alg}_{}", URL_SAFE_NO_PAD.encode(buf)),
        Err(err) => {
            tracing::warn!(error = %err, %alg, "OS RNG unavailable, using fallback key id");
            fallback_kid(alg)
        },
    }
}

fn fallback_kid(alg: Alg) -> String {
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut suffix = Vec::with_capacity(16);
    suffix.extend_from_slice(&stamp.to_be_bytes());
    suffix.extend_from_slice(&count.to_be_bytes());
    format!("{alg}_{}", URL_SAFE_NO_PAD.encode(suffix))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_kid_format() {
        for alg in Alg::ALL {
            let kid = generate_kid(alg);
            let (prefix, suffix) = kid.split_once('_').expect("separator");
            assert_eq!(prefix, alg.as_str());
            assert_eq!(URL_SAFE_NO_PAD.decode(suffix).expect("base64url").len(), KID_RANDOM_BYTES);
        }
    }

    #[test]
    fn test_kids_are_unique() {
        let kids: HashSet<_> = (0..1_000).map(|_| generate_kid(Alg::EdDsa)).collect();
        assert_eq!(kids.len(), 1_000);
    }

    #[test]
    fn test_fallback_kids_are_unique_and_prefixed() {
        let a = fallback_kid(Alg::Rs256);
        let b = fallback_kid(Alg::Rs256);
        assert_ne!(a, b);
        assert!(a.starts_with("RS256_"));
    }
}
