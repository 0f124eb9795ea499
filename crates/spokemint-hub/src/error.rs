//! hub error taxonomy.

use spokemint_types::RequestKey;

/// errors surfaced by hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// the request does not exist on the hub.
    #[error("request {0} not found")]
    NotFound(RequestKey),
    /// the stored revision moved past the caller's snapshot. re-read the
    /// request and retry the write against the fresh copy.
    #[error("request {0} was modified concurrently")]
    Conflict(RequestKey),
    /// the backing store itself failed.
    #[error("hub store error: {0}")]
    Store(String),
}

impl HubError {
    /// whether this is the optimistic-concurrency conflict case.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// whether this is the request-no-longer-exists case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// convenience alias for hub results.
pub type Result<T> = std::result::Result<T, HubError>;
