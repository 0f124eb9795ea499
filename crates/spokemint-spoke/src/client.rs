//! spoke client trait and backend selection.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use spokemint_types::{SpokeConfig, Token};

use crate::error::Result;
use crate::http::HttpSpoke;
use crate::memory::MemorySpoke;
use crate::trust::TrustAnchor;

/// a token minted by a spoke.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// the bearer token itself.
    pub token: Token,
    /// expiry the spoke granted. the spoke may clamp the requested validity,
    /// so this is the authoritative lifetime, not the requested one.
    pub expires_at: DateTime<Utc>,
}

/// an identity registered on a spoke.
#[derive(Debug, Clone)]
pub struct Identity {
    /// spoke namespace the identity lives in.
    pub namespace: String,
    /// identity name.
    pub name: String,
    /// labels attached at creation.
    pub labels: HashMap<String, String>,
    /// when the identity was registered.
    pub created_at: DateTime<Utc>,
}

/// client for a token-issuing spoke.
pub trait SpokeClient: Send + Sync {
    /// register `namespace/name` with `labels`.
    ///
    /// fails with [`SpokeError::AlreadyExists`] when the identity is already
    /// registered.
    ///
    /// [`SpokeError::AlreadyExists`]: crate::SpokeError::AlreadyExists
    fn create_identity(
        &self,
        namespace: String,
        name: String,
        labels: HashMap<String, String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// mint a token for an existing identity.
    ///
    /// `validity_secs` is a request; the spoke decides the actual lifetime
    /// and reports it in [`IssuedToken::expires_at`].
    fn issue_token(
        &self,
        namespace: String,
        identity: String,
        validity_secs: u64,
    ) -> impl Future<Output = Result<IssuedToken>> + Send;
}

/// object-safe flavor of [`SpokeClient`], so the agent can hold whichever
/// backend the config selected behind a single `Arc<dyn SpokeClientBoxed>`.
pub trait SpokeClientBoxed: Send + Sync {
    /// object-safe [`SpokeClient::create_identity`].
    fn create_identity_boxed(
        &self,
        namespace: String,
        name: String,
        labels: HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// object-safe [`SpokeClient::issue_token`].
    fn issue_token_boxed(
        &self,
        namespace: String,
        identity: String,
        validity_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<IssuedToken>> + Send + '_>>;
}

impl<T: SpokeClient> SpokeClientBoxed for T {
    fn create_identity_boxed(
        &self,
        namespace: String,
        name: String,
        labels: HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.create_identity(namespace, name, labels))
    }

    fn issue_token_boxed(
        &self,
        namespace: String,
        identity: String,
        validity_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<IssuedToken>> + Send + '_>> {
        Box::pin(self.issue_token(namespace, identity, validity_secs))
    }
}

/// build the spoke client and trust anchor selected by `config`.
///
/// the memory spoke supplies its own ca bundle; the http spoke takes
/// whichever inline bundle or file path the config carries.
pub fn from_config(config: &SpokeConfig) -> (Arc<dyn SpokeClientBoxed>, TrustAnchor) {
    match config {
        SpokeConfig::Memory { max_validity_secs } => {
            let spoke = MemorySpoke::new(*max_validity_secs);
            let anchor = TrustAnchor::inline(spoke.ca_certificate());
            let spoke: Arc<dyn SpokeClientBoxed> = Arc::new(spoke);
            (spoke, anchor)
        }
        SpokeConfig::Http {
            endpoint,
            bearer_token,
            ca_certificate,
            ca_certificate_path,
        } => {
            let spoke = HttpSpoke::new(endpoint.clone(), bearer_token.clone());
            let anchor = TrustAnchor::new(
                ca_certificate.as_ref().map(|pem| pem.clone().into_bytes()),
                ca_certificate_path.clone(),
            );
            let spoke: Arc<dyn SpokeClientBoxed> = Arc::new(spoke);
            (spoke, anchor)
        }
    }
}
