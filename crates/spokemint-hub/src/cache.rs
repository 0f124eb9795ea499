//! local read-through view of hub requests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use spokemint_types::{Request, RequestKey};

/// shared in-memory view of the hub's requests.
///
/// the controller keeps it populated from an initial list plus the watch
/// stream; reconcile reads from here instead of round-tripping to the hub.
/// reads hand out clones, so callers never mutate through the cache and the
/// lock is held only for the copy.
#[derive(Debug, Clone, Default)]
pub struct RequestCache {
    inner: Arc<RwLock<HashMap<RequestKey, Request>>>,
}

impl RequestCache {
    /// create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// fetch a clone of the cached request, if present.
    pub fn get(&self, key: &RequestKey) -> Option<Request> {
        self.inner
            .read()
            .expect("request cache lock poisoned")
            .get(key)
            .cloned()
    }

    /// insert or replace a request under its own key.
    pub fn insert(&self, request: Request) {
        self.inner
            .write()
            .expect("request cache lock poisoned")
            .insert(request.key(), request);
    }

    /// drop a request from the cache, returning the evicted copy.
    pub fn remove(&self, key: &RequestKey) -> Option<Request> {
        self.inner
            .write()
            .expect("request cache lock poisoned")
            .remove(key)
    }

    /// replace the entire cache contents with a fresh listing.
    pub fn replace_all(&self, requests: Vec<Request>) {
        let fresh: HashMap<_, _> = requests
            .into_iter()
            .map(|request| (request.key(), request))
            .collect();
        *self.inner.write().expect("request cache lock poisoned") = fresh;
    }

    /// keys of every cached request.
    pub fn keys(&self) -> Vec<RequestKey> {
        self.inner
            .read()
            .expect("request cache lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// number of cached requests.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("request cache lock poisoned")
            .len()
    }

    /// whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
