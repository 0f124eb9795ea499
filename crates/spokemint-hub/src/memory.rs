//! in-process hub used by the standalone serve mode and by tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use spokemint_types::{Request, RequestKey, RequestStatus};
use tokio::sync::{RwLock, broadcast};

use crate::error::{HubError, Result};
use crate::store::{RequestStore, WatchEvent};

/// watch channel depth before slow receivers start lagging.
const WATCH_CAPACITY: usize = 64;

/// in-memory [`RequestStore`].
///
/// behaves like a real hub as far as the controller can tell: every write
/// bumps a monotonic revision, status updates against a stale snapshot are
/// rejected, and every change lands on the watch channel.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    requests: RwLock<HashMap<RequestKey, Request>>,
    revision: AtomicU64,
    watch: broadcast::Sender<WatchEvent>,
}

impl MemoryHub {
    /// create an empty hub.
    pub fn new() -> Self {
        let (watch, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                requests: RwLock::new(HashMap::new()),
                revision: AtomicU64::new(0),
                watch,
            }),
        }
    }

    fn next_revision(&self) -> u64 {
        self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn notify(&self, event: WatchEvent) {
        // callers hold the write lock while sending, which keeps the watch
        // stream in revision order; send only errors when nobody is
        // subscribed yet
        let _ = self.inner.watch.send(event);
    }

    /// create a request, or update its spec side in place.
    ///
    /// any status already recorded for the key is preserved; only the spec
    /// fields and the revision change.
    pub async fn upsert_spec(&self, request: Request) -> Result<Request> {
        let key = request.key();
        let mut stored = request;
        let mut requests = self.inner.requests.write().await;
        if let Some(existing) = requests.get(&key) {
            stored.status = existing.status.clone();
            stored.created_at = existing.created_at;
        }
        stored.revision = self.next_revision();
        stored.updated_at = Utc::now();
        requests.insert(key.clone(), stored.clone());
        tracing::debug!(request = %key, revision = stored.revision, "stored request spec");
        self.notify(WatchEvent::Applied(stored.clone()));
        Ok(stored)
    }

    /// delete a request.
    pub async fn remove(&self, key: &RequestKey) -> Result<()> {
        let mut requests = self.inner.requests.write().await;
        if requests.remove(key).is_none() {
            return Err(HubError::NotFound(key.clone()));
        }
        self.notify(WatchEvent::Deleted(key.clone()));
        Ok(())
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStore for MemoryHub {
    async fn get(&self, key: &RequestKey) -> Result<Option<Request>> {
        Ok(self.inner.requests.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Request>> {
        Ok(self.inner.requests.read().await.values().cloned().collect())
    }

    async fn update_status(&self, original: &Request, status: RequestStatus) -> Result<Request> {
        let key = original.key();
        let mut requests = self.inner.requests.write().await;
        let stored = requests
            .get_mut(&key)
            .ok_or_else(|| HubError::NotFound(key.clone()))?;
        if stored.revision != original.revision {
            tracing::debug!(
                request = %key,
                stored = stored.revision,
                snapshot = original.revision,
                "status update lost the revision race"
            );
            return Err(HubError::Conflict(key));
        }
        stored.status = status;
        stored.revision = self.next_revision();
        stored.updated_at = Utc::now();
        let updated = stored.clone();
        self.notify(WatchEvent::Applied(updated.clone()));
        Ok(updated)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch.subscribe()
    }
}
