//! end-to-end rotation scenarios through the controller.
//!
//! each test wires a real controller over the in-memory hub and spoke and
//! observes effects the way an operator would: through the hub's stored
//! requests and the spoke's identity table.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spokemint::{Controller, RotationPolicy, TokenRotator};
use spokemint_hub::{MemoryHub, RequestCache, RequestStore};
use spokemint_spoke::{MemorySpoke, TrustAnchor};
use spokemint_types::{
    ControllerConfig, DEFAULT_VALIDITY_SECS, MANAGED_BY_LABEL, Request, RequestKey, RequestStatus,
    RotationConfig, Token,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SPOKE_NAMESPACE: &str = "spokemint-managed";

struct Harness {
    hub: MemoryHub,
    spoke: MemorySpoke,
    cache: RequestCache,
    shutdown: watch::Sender<bool>,
    controller: JoinHandle<Result<(), spokemint_hub::HubError>>,
}

impl Harness {
    /// start a controller with test-friendly timings.
    fn start() -> Self {
        Self::start_on(MemoryHub::new())
    }

    /// start a controller over an existing hub, so tests can stage requests
    /// and statuses before the initial list runs.
    fn start_on(hub: MemoryHub) -> Self {
        let spoke = MemorySpoke::new(DEFAULT_VALIDITY_SECS * 2);
        let cache = RequestCache::new();
        let rotator = Arc::new(TokenRotator::new(
            cache.clone(),
            hub.clone(),
            Arc::new(spoke.clone()),
            TrustAnchor::inline(spoke.ca_certificate()),
            SPOKE_NAMESPACE,
            RotationPolicy::from_config(&RotationConfig::default()),
            Duration::from_secs(5),
        ));
        let config = ControllerConfig {
            resync_interval_secs: 1,
            retry_initial_delay_ms: 10,
            retry_max_delay_secs: 1,
            remote_timeout_secs: 5,
        };
        let (shutdown, shutdown_rx) = watch::channel(false);
        let controller = Controller::new(hub.clone(), cache.clone(), rotator, config, shutdown_rx);
        let controller = tokio::spawn(controller.run());
        Harness {
            hub,
            spoke,
            cache,
            shutdown,
            controller,
        }
    }

    async fn stop(self) {
        self.shutdown.send(true).expect("controller already gone");
        self.controller
            .await
            .expect("controller task panicked")
            .expect("controller exited with error");
    }

    /// poll the hub until the request's status holds a token.
    async fn wait_for_issued(&self, key: &RequestKey) -> Request {
        let deadline = Duration::from_secs(5);
        let hub = self.hub.clone();
        let task_key = key.clone();
        tokio::time::timeout(deadline, async move {
            loop {
                if let Some(request) = hub.get(&task_key).await.unwrap()
                    && request.status.is_issued()
                {
                    return request;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {key} to hold a token"))
    }
}

#[tokio::test]
async fn new_request_gets_identity_token_and_ca() {
    let harness = Harness::start();
    let key = RequestKey::new("default", "agent-a");
    harness
        .hub
        .upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();

    let issued = harness.wait_for_issued(&key).await;

    // status fully populated in one write
    let token = issued.status.token.as_ref().unwrap();
    assert!(token.as_str().starts_with("smt-"));
    assert!(issued.status.expires_at.unwrap() > Utc::now());
    assert_eq!(
        issued.status.ca_certificate.as_deref(),
        Some(harness.spoke.ca_certificate().as_slice())
    );

    // identity registered under the managed label
    let identity = harness.spoke.identity(SPOKE_NAMESPACE, "agent-a").unwrap();
    assert!(identity.labels.contains_key(MANAGED_BY_LABEL));

    harness.stop().await;
}

#[tokio::test]
async fn fresh_token_is_not_reissued() {
    let harness = Harness::start();
    let key = RequestKey::new("default", "agent-a");
    harness
        .hub
        .upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();
    let first = harness.wait_for_issued(&key).await;

    // a spec rewrite triggers another pass against the still-fresh token
    let respec = harness
        .hub
        .upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let after = harness.hub.get(&key).await.unwrap().unwrap();
    assert_eq!(after.status.token, first.status.token, "token must survive");
    assert_eq!(
        after.revision, respec.revision,
        "no status write should have happened"
    );

    harness.stop().await;
}

#[tokio::test]
async fn near_expiry_token_is_rotated() {
    // stage a token inside the refresh window (default threshold is 15 days)
    // before the controller starts, so the first pass finds it there
    let hub = MemoryHub::new();
    let key = RequestKey::new("default", "agent-a");
    let created = hub
        .upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();
    let old_expiry = Utc::now() + chrono::Duration::days(1);
    hub.update_status(
        &created,
        RequestStatus::issued(Token::new("smt-stale"), old_expiry, b"old-ca".to_vec()),
    )
    .await
    .unwrap();

    let harness = Harness::start_on(hub);
    let rotated = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let request = harness.hub.get(&key).await.unwrap().unwrap();
            if let Some(token) = &request.status.token
                && token.as_str() != "smt-stale"
            {
                return request;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("stale token was never replaced");

    assert!(rotated.status.expires_at.unwrap() > old_expiry);
    assert_ne!(
        rotated.status.ca_certificate.as_deref(),
        Some(&b"old-ca"[..]),
        "ca bundle must be republished with the rotation"
    );

    harness.stop().await;
}

#[tokio::test]
async fn deleted_request_stops_rotation_but_not_the_controller() {
    let harness = Harness::start();
    let key = RequestKey::new("default", "agent-a");
    harness
        .hub
        .upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();
    harness.wait_for_issued(&key).await;

    harness.hub.remove(&key).await.unwrap();

    // the local view drops the request
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        while harness.cache.get(&key).is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("cache never dropped the deleted request");

    // the identity stays behind on the spoke; only rotation stops
    assert!(harness.spoke.identity(SPOKE_NAMESPACE, "agent-a").is_some());

    // and the controller keeps serving other requests
    let other = RequestKey::new("default", "agent-b");
    harness
        .hub
        .upsert_spec(Request::new("default", "agent-b", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();
    harness.wait_for_issued(&other).await;

    harness.stop().await;
}

#[tokio::test]
async fn requests_present_before_startup_are_rotated() {
    // seed first, start second: the initial list must cover what the watch
    // never saw
    let hub = MemoryHub::new();
    hub.upsert_spec(Request::new("default", "agent-a", DEFAULT_VALIDITY_SECS))
        .await
        .unwrap();

    let harness = Harness::start_on(hub);
    harness
        .wait_for_issued(&RequestKey::new("default", "agent-a"))
        .await;
    harness.stop().await;
}
