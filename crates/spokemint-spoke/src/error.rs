//! spoke error taxonomy.

/// errors surfaced by spoke operations.
#[derive(Debug, thiserror::Error)]
pub enum SpokeError {
    /// the identity is already registered. creation is idempotent, so
    /// callers that only need the identity to exist treat this as success.
    #[error("identity {0} already exists on the spoke")]
    AlreadyExists(String),
    /// token issuance named an identity the spoke does not know.
    #[error("identity {0} not found on the spoke")]
    IdentityNotFound(String),
    /// the spoke rejected the agent's credentials.
    #[error("spoke denied the request: {0}")]
    Denied(String),
    /// the http round trip itself failed.
    #[error("spoke http error: {0}")]
    Http(#[from] reqwest::Error),
    /// the spoke answered with an unexpected status or body.
    #[error("spoke api error: {0}")]
    Api(String),
}

impl SpokeError {
    /// whether this is the duplicate-create case.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// convenience alias for spoke results.
pub type Result<T> = std::result::Result<T, SpokeError>;
