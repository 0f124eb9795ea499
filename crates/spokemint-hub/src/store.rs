//! the storage trait the controller programs against.

use std::future::Future;

use spokemint_types::{Request, RequestKey, RequestStatus};
use tokio::sync::broadcast;

use crate::error::Result;

/// a change observed on the hub.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// a request was created or its spec or status updated. carries the full
    /// object as stored, including the new revision.
    Applied(Request),
    /// a request was deleted.
    Deleted(RequestKey),
}

/// hub-side request storage.
///
/// implementations are cheap-to-clone handles onto shared state and must be
/// safe to call from many tasks at once.
pub trait RequestStore: Send + Sync {
    /// fetch a single request by key.
    fn get(&self, key: &RequestKey) -> impl Future<Output = Result<Option<Request>>> + Send;

    /// list every request currently stored.
    fn list(&self) -> impl Future<Output = Result<Vec<Request>>> + Send;

    /// replace the status of `original` wholesale.
    ///
    /// the write succeeds only while the stored revision still matches
    /// `original.revision`; otherwise [`HubError::Conflict`] comes back and
    /// the caller must re-read before retrying.
    ///
    /// [`HubError::Conflict`]: crate::HubError::Conflict
    fn update_status(
        &self,
        original: &Request,
        status: RequestStatus,
    ) -> impl Future<Output = Result<Request>> + Send;

    /// subscribe to changes made after this call.
    ///
    /// a receiver that falls behind sees `Lagged` and must re-list to rebuild
    /// its view; the channel never replays missed events.
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}
