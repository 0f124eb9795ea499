//! watch-driven scheduling, one worker per request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use spokemint_hub::{HubError, RequestCache, RequestStore, WatchEvent};
use spokemint_types::{ControllerConfig, RequestKey};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::reconcile::TokenRotator;

/// exponential backoff for failed passes.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// delay before the next attempt, doubling up to the cap.
    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// drives one worker task per request key.
///
/// watch events are routed to the owning worker, so passes for the same
/// request never run concurrently while different requests proceed in
/// parallel. each worker's trigger channel has capacity one: a worker that
/// is mid-pass picks up at most one queued trigger, which coalesces event
/// bursts into a single follow-up pass.
pub struct Controller<H: RequestStore> {
    hub: H,
    cache: RequestCache,
    rotator: Arc<TokenRotator<H>>,
    config: ControllerConfig,
    shutdown: watch::Receiver<bool>,
    // relay the loop flips before draining; workers park on this one, so
    // every exit path reaches them, not just the external signal
    worker_shutdown: watch::Sender<bool>,
    workers: HashMap<RequestKey, Worker>,
}

struct Worker {
    trigger: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl<H> Controller<H>
where
    H: RequestStore + Clone + Send + Sync + 'static,
{
    /// create a controller. nothing runs until [`Controller::run`].
    pub fn new(
        hub: H,
        cache: RequestCache,
        rotator: Arc<TokenRotator<H>>,
        config: ControllerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (worker_shutdown, _) = watch::channel(false);
        Self {
            hub,
            cache,
            rotator,
            config,
            shutdown,
            worker_shutdown,
            workers: HashMap::new(),
        }
    }

    /// run until the shutdown signal flips to true.
    ///
    /// subscribes to the watch stream before the initial list, so no change
    /// can fall between the two. after startup the loop reacts to watch
    /// events and re-lists on a fixed interval as a safety net; only the
    /// initial list is allowed to fail the controller.
    pub async fn run(mut self) -> Result<(), HubError> {
        let mut events = self.hub.watch();
        self.resync().await?;
        info!(requests = self.cache.len(), "controller started");

        let mut resync_timer =
            tokio::time::interval(Duration::from_secs(self.config.resync_interval_secs));
        resync_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately; the initial resync already ran
        resync_timer.tick().await;

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("controller shutting down");
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(WatchEvent::Applied(request)) => {
                        let key = request.key();
                        debug!(request = %key, revision = request.revision, "watch: applied");
                        self.cache.insert(request);
                        self.dispatch(&key);
                    }
                    Ok(WatchEvent::Deleted(key)) => {
                        debug!(request = %key, "watch: deleted");
                        self.cache.remove(&key);
                        if let Some(worker) = self.workers.remove(&key) {
                            worker.handle.abort();
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "watch stream lagged, re-listing");
                        if let Err(err) = self.resync().await {
                            warn!(error = %err, "re-list after lag failed, retrying on next interval");
                        }
                    }
                    Err(RecvError::Closed) => {
                        warn!("watch stream closed, stopping controller");
                        break;
                    }
                },
                _ = resync_timer.tick() => {
                    if let Err(err) = self.resync().await {
                        warn!(error = %err, "periodic resync failed, retrying on next interval");
                    }
                }
            }
        }

        self.drain().await;
        Ok(())
    }

    /// rebuild the cache from a full listing and trigger every live key.
    async fn resync(&mut self) -> Result<(), HubError> {
        let requests = self.hub.list().await?;
        debug!(count = requests.len(), "resync");
        self.cache.replace_all(requests);

        let live: HashSet<RequestKey> = self.cache.keys().into_iter().collect();
        self.workers.retain(|key, worker| {
            let keep = live.contains(key);
            if !keep {
                worker.handle.abort();
            }
            keep
        });
        for key in live {
            self.dispatch(&key);
        }
        Ok(())
    }

    /// hand `key` to its worker, spawning one on first sight.
    fn dispatch(&mut self, key: &RequestKey) {
        if let Some(worker) = self.workers.get(key) {
            if !worker.handle.is_finished() {
                // a full channel means a pass is already queued behind the
                // running one; dropping the trigger is the coalescing
                let _ = worker.trigger.try_send(());
                return;
            }
            // a finished worker only happens after a panic; start fresh
            error!(request = %key, "worker task died, respawning");
        }
        let worker = self.spawn_worker(key.clone());
        let _ = worker.trigger.try_send(());
        self.workers.insert(key.clone(), worker);
    }

    fn spawn_worker(&self, key: RequestKey) -> Worker {
        let (trigger, mut triggers) = mpsc::channel(1);
        let rotator = Arc::clone(&self.rotator);
        let mut shutdown = self.worker_shutdown.subscribe();
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.retry_initial_delay_ms),
            Duration::from_secs(self.config.retry_max_delay_secs),
        );
        let conflict_delay = Duration::from_millis(self.config.retry_initial_delay_ms);

        let handle = tokio::spawn(async move {
            // outer loop waits for a trigger, inner loop retries the pass
            // until it lands or shutdown wins the race
            while triggers.recv().await.is_some() {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        result = rotator.reconcile(&key) => match result {
                            Ok(outcome) => {
                                backoff.reset();
                                debug!(request = %key, outcome = ?outcome, "pass finished");
                                break;
                            }
                            Err(err) if err.is_conflict() => {
                                // give the cache a beat to catch up with
                                // whoever won the revision race, no backoff
                                debug!(request = %key, "conflict, retrying against fresh state");
                                tokio::select! {
                                    _ = shutdown.changed() => return,
                                    _ = tokio::time::sleep(conflict_delay) => {}
                                }
                            }
                            Err(err) => {
                                let delay = backoff.next_delay();
                                warn!(
                                    request = %key,
                                    error = %err,
                                    delay_ms = delay.as_millis() as u64,
                                    "pass failed, backing off"
                                );
                                tokio::select! {
                                    _ = shutdown.changed() => return,
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                        }
                    }
                }
            }
        });

        Worker { trigger, handle }
    }

    /// stop feeding workers and wait for the running passes to finish.
    async fn drain(&mut self) {
        // dropping the trigger only stops idle workers; the relay pulls the
        // rest out of their retry delays
        let _ = self.worker_shutdown.send(true);
        for (key, worker) in self.workers.drain() {
            drop(worker.trigger);
            if let Err(err) = worker.handle.await
                && err.is_panic()
            {
                error!(request = %key, "worker panicked during shutdown");
            }
        }
    }
}
