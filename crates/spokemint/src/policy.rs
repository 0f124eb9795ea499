//! rotation timing policy.

use chrono::{DateTime, Duration, Utc};
use spokemint_types::{RequestStatus, RotationConfig};

/// decides when a recorded token is due for rotation.
///
/// pure time arithmetic: the policy has no clock of its own and does no i/o,
/// so callers pass `now` in and tests can pin it wherever they like.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    refresh_threshold: Duration,
}

impl RotationPolicy {
    /// rotate once remaining lifetime drops below `refresh_threshold`.
    pub fn new(refresh_threshold: Duration) -> Self {
        Self { refresh_threshold }
    }

    /// policy from configuration.
    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(Duration::seconds(config.refresh_threshold_secs as i64))
    }

    /// whether a fresh token should be minted now.
    ///
    /// fires when no token has been recorded yet, when a recorded token
    /// carries no expiry (an inconsistent status is repaired by rotating),
    /// and when remaining lifetime has dropped below the threshold. expired
    /// tokens fall out of the last case, since negative remaining lifetime
    /// is below any threshold.
    pub fn should_issue(&self, status: &RequestStatus, now: DateTime<Utc>) -> bool {
        if status.token.is_none() {
            return true;
        }
        let Some(expires_at) = status.expires_at else {
            return true;
        };
        expires_at - now < self.refresh_threshold
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}
