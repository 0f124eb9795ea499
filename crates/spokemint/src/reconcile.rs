//! a single rotation pass for one request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use spokemint_hub::{HubError, RequestCache, RequestStore};
use spokemint_spoke::{IssuedToken, SpokeClientBoxed, SpokeError, TrustAnchor, TrustAnchorError};
use spokemint_types::{Request, RequestKey, RequestStatus, managed_labels};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::policy::RotationPolicy;

/// what a reconcile pass concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// the request is no longer known; nothing left to do.
    Gone,
    /// the recorded token is still comfortably within its lifetime.
    Fresh,
    /// a replacement token was minted and published.
    Rotated {
        /// expiry the spoke granted.
        expires_at: DateTime<Utc>,
    },
}

/// how a reconcile pass can fail. every variant is retryable; the worker
/// loop decides how quickly.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// registering the spoke identity failed.
    #[error("ensuring spoke identity: {0}")]
    EnsureIdentity(#[source] SpokeError),
    /// minting the replacement token failed.
    #[error("issuing token: {0}")]
    IssueToken(#[source] SpokeError),
    /// no ca bundle could be resolved.
    #[error("resolving trust anchor: {0}")]
    TrustAnchor(#[from] TrustAnchorError),
    /// writing the new status back to the hub failed.
    #[error("publishing status: {0}")]
    PublishStatus(#[source] HubError),
    /// the hub revision moved while the pass was rotating. a short pause for
    /// the cache to catch up, then retry against the fresh snapshot.
    #[error("request changed during rotation")]
    Conflict,
    /// a remote call overran its deadline.
    #[error("{step} timed out")]
    Timeout {
        /// which remote call overran.
        step: &'static str,
    },
}

impl ReconcileError {
    /// whether this is the lost-the-revision-race case.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// runs one full rotation pass for a request.
///
/// owns no scheduling: [`Controller`] decides when to call
/// [`TokenRotator::reconcile`] and what to do with the result.
///
/// [`Controller`]: crate::Controller
pub struct TokenRotator<H> {
    cache: RequestCache,
    hub: H,
    spoke: Arc<dyn SpokeClientBoxed>,
    trust_anchor: TrustAnchor,
    spoke_namespace: String,
    policy: RotationPolicy,
    remote_timeout: Duration,
}

impl<H: RequestStore> TokenRotator<H> {
    /// assemble a rotator over an already-populated cache.
    pub fn new(
        cache: RequestCache,
        hub: H,
        spoke: Arc<dyn SpokeClientBoxed>,
        trust_anchor: TrustAnchor,
        spoke_namespace: impl Into<String>,
        policy: RotationPolicy,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            hub,
            spoke,
            trust_anchor,
            spoke_namespace: spoke_namespace.into(),
            policy,
            remote_timeout,
        }
    }

    /// run one pass for `key`.
    ///
    /// sequence: read the cached request, make sure the spoke identity
    /// exists, consult the policy, and when it fires mint a token, resolve
    /// the ca bundle and replace the status against the snapshot the pass
    /// started from. a request missing from the cache ends the pass
    /// successfully, since deletion means there is nothing left to rotate.
    pub async fn reconcile(&self, key: &RequestKey) -> Result<Outcome, ReconcileError> {
        let Some(request) = self.cache.get(key) else {
            debug!(request = %key, "request gone, nothing to reconcile");
            return Ok(Outcome::Gone);
        };

        self.ensure_identity(&request).await?;

        let now = Utc::now();
        if !self.policy.should_issue(&request.status, now) {
            debug!(
                request = %key,
                expires_at = ?request.status.expires_at,
                "recorded token still fresh"
            );
            return Ok(Outcome::Fresh);
        }

        let issued = self.issue_token(&request).await?;
        let expires_at = issued.expires_at;
        let ca_certificate = self.resolve_trust_anchor().await?;
        self.publish(&request, issued, ca_certificate).await?;

        info!(
            request = %key,
            expires_at = %expires_at,
            "rotated token"
        );
        Ok(Outcome::Rotated { expires_at })
    }

    /// register the spoke identity; an identity that already exists is fine.
    async fn ensure_identity(&self, request: &Request) -> Result<(), ReconcileError> {
        let created = timeout(
            self.remote_timeout,
            self.spoke.create_identity_boxed(
                self.spoke_namespace.clone(),
                request.name.clone(),
                managed_labels(),
            ),
        )
        .await
        .map_err(|_| ReconcileError::Timeout {
            step: "identity creation",
        })?;

        match created {
            Ok(()) => {
                info!(
                    namespace = %self.spoke_namespace,
                    identity = %request.name,
                    "registered spoke identity"
                );
                Ok(())
            }
            Err(err) if err.is_already_exists() => Ok(()),
            Err(err) => Err(ReconcileError::EnsureIdentity(err)),
        }
    }

    async fn issue_token(&self, request: &Request) -> Result<IssuedToken, ReconcileError> {
        timeout(
            self.remote_timeout,
            self.spoke.issue_token_boxed(
                self.spoke_namespace.clone(),
                request.name.clone(),
                request.validity_secs,
            ),
        )
        .await
        .map_err(|_| ReconcileError::Timeout {
            step: "token issuance",
        })?
        .map_err(ReconcileError::IssueToken)
    }

    async fn resolve_trust_anchor(&self) -> Result<Vec<u8>, ReconcileError> {
        let bundle = timeout(self.remote_timeout, self.trust_anchor.resolve())
            .await
            .map_err(|_| ReconcileError::Timeout {
                step: "trust anchor read",
            })?;
        Ok(bundle?)
    }

    /// replace the status wholesale, checked against the pass's snapshot.
    async fn publish(
        &self,
        original: &Request,
        issued: IssuedToken,
        ca_certificate: Vec<u8>,
    ) -> Result<(), ReconcileError> {
        let status = RequestStatus::issued(issued.token, issued.expires_at, ca_certificate);
        let written = timeout(self.remote_timeout, self.hub.update_status(original, status))
            .await
            .map_err(|_| ReconcileError::Timeout {
                step: "status publish",
            })?;

        match written {
            Ok(updated) => {
                // keep the cache ahead of the watch event so a back-to-back
                // pass sees its own write
                self.cache.insert(updated);
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                warn!(request = %original.key(), "hub revision moved during rotation");
                Err(ReconcileError::Conflict)
            }
            Err(err) => Err(ReconcileError::PublishStatus(err)),
        }
    }
}
