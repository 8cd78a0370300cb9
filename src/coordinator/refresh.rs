//! Scheduled refresh with fallback
//!
//! A [`Coordinator`] owns one source. Each refresh runs the chain
//!
//! ```text
//! fetch ──ok──> cache.save ──> normalize ──ok──> publish + schedule next wake
//!   │                              │
//!   └─err─> cache.load ──ok────────┤
//!              │                   └─err─> held snapshot (stale) or reference
//!              └─err─> reference prayers, else unavailable + short retry
//! ```
//!
//! Concurrent refresh requests share one in-flight run.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;

use super::config::CoordinatorConfig;
use super::events::{CoordinatorEvent, SnapshotObserver};
use super::health::{HealthStatus, SourceHealth};
use super::reference::ReferenceSource;
use crate::cache::SnapshotCache;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, RawPayload};
use crate::models::{NormalizedSnapshot, SnapshotOrigin};
use crate::parser::{NormalizeContext, Normalizer};
use crate::scheduler::{Scheduler, WakeState};
use crate::utils::error::CoordinatorError;

/// Outcome of one refresh
pub type RefreshResult = std::result::Result<Arc<NormalizedSnapshot>, CoordinatorError>;

type InflightRefresh = Shared<BoxFuture<'static, RefreshResult>>;

const EVENT_CAPACITY: usize = 64;

/// Point-in-time view of a coordinator
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: String,
    pub policy: &'static str,
    pub state: WakeState,
    pub health: HealthStatus,
    pub origin: Option<SnapshotOrigin>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub next_wake: Option<DateTime<Utc>>,
    pub values: usize,
    #[serde(flatten)]
    pub stats: SourceHealth,
}

/// Refresh coordinator for one source
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    fetcher: Arc<dyn Fetcher>,
    normalizer: Arc<dyn Normalizer>,
    cache: Option<SnapshotCache>,
    reference: Option<Arc<dyn ReferenceSource>>,
    scheduler: Scheduler,
    snapshot: RwLock<Option<Arc<NormalizedSnapshot>>>,
    inflight: Mutex<Option<InflightRefresh>>,
    observers: RwLock<Vec<Arc<dyn SnapshotObserver>>>,
    events: broadcast::Sender<CoordinatorEvent>,
    health: Mutex<SourceHealth>,
    stopped: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Why a refresh could not produce a fresh snapshot
enum Failure {
    /// Neither the source nor the cache produced a payload
    Unavailable(String),
    /// A payload was found but could not be normalized
    Parse(String),
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.inner.config.name)
            .field("fetcher", &self.inner.fetcher.describe())
            .field("normalizer", &self.inner.normalizer.label())
            .finish()
    }
}

impl Coordinator {
    /// Start building a coordinator
    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            fetcher: None,
            normalizer: None,
            cache: None,
            reference: None,
        }
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Latest published snapshot
    pub fn latest(&self) -> Option<Arc<NormalizedSnapshot>> {
        read(&self.inner.snapshot)
    }

    /// Register an observer for future snapshots
    pub fn subscribe(&self, observer: impl SnapshotObserver + 'static) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Receiver for refresh events
    pub fn events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    /// Next arranged wake, if any
    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.inner.scheduler.next_wake()
    }

    /// Perform the initial refresh, which also arms the first wake
    pub async fn start(&self) -> RefreshResult {
        self.inner.stopped.store(false, Ordering::SeqCst);
        tracing::info!(
            source = %self.name(),
            fetcher = %self.inner.fetcher.describe(),
            policy = self.inner.config.policy.name(),
            "Starting coordinator"
        );
        self.refresh().await
    }

    /// Refresh now
    ///
    /// Joins the running refresh if there is one, so callers arriving while a
    /// fetch is outstanding all get the same result.
    pub async fn refresh(&self) -> RefreshResult {
        let refresh = {
            let mut inflight = lock(&self.inner.inflight);
            match inflight.as_ref() {
                Some(running) => {
                    tracing::debug!(source = %self.name(), "Joining in-flight refresh");
                    running.clone()
                }
                None => {
                    let refresh = self.spawn_refresh();
                    *inflight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn spawn_refresh(&self) -> InflightRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = Arc::clone(&inner).run().await;
            *lock(&inner.inflight) = None;
            result
        });

        let weak = Arc::downgrade(&self.inner);
        let name = self.inner.config.name.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    if let Some(inner) = weak.upgrade() {
                        *lock(&inner.inflight) = None;
                    }
                    tracing::error!(source = %name, error = %e, "Refresh task failed");
                    Err(CoordinatorError::unavailable(name, format!("refresh task failed: {e}")))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Cancel the pending wake and stop rescheduling
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if self.inner.scheduler.cancel_pending() {
            tracing::info!(source = %self.name(), "Cancelled pending wake");
        }
    }

    /// Whether shutdown has been requested
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Current status
    pub fn status(&self) -> SourceStatus {
        let snapshot = self.latest();
        let stats = lock(&self.inner.health).clone();
        let origin = snapshot.as_ref().map(|s| s.origin);

        SourceStatus {
            name: self.inner.config.name.clone(),
            kind: self.inner.config.kind.clone(),
            policy: self.inner.config.policy.name(),
            state: self.inner.scheduler.state(),
            health: stats.status(origin),
            origin,
            fetched_at: snapshot.as_ref().map(|s| s.fetched_at),
            next_wake: self.next_wake(),
            values: snapshot.as_ref().map_or(0, |s| s.len()),
            stats,
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>) -> RefreshResult {
        let name = self.config.name.clone();
        let mut ctx = NormalizeContext::new(name.clone(), self.config.timezone, Utc::now());

        if self.normalizer.needs_reference() {
            if let Some(reference) = &self.reference {
                let times = reference.reference_or_default(ctx.today).await;
                ctx = ctx.with_reference(times);
            }
        }

        let mut errors = Vec::new();
        let payload = match self.fetcher.fetch().await {
            Ok(payload) => {
                self.save_cache(&payload).await;
                Some((payload, SnapshotOrigin::Live))
            }
            Err(e) => {
                tracing::warn!(
                    source = %name,
                    endpoint = %self.fetcher.describe(),
                    error = %e,
                    "Fetch failed, trying cache"
                );
                errors.push(e.to_string());
                self.load_cache(&mut errors)
                    .await
                    .map(|payload| (payload, SnapshotOrigin::Cache))
            }
        };

        let outcome = match payload {
            Some((payload, origin)) => match self.normalizer.normalize(&payload, &ctx) {
                Ok(snapshot) => Ok(snapshot.with_origin(origin)),
                Err(e) => {
                    tracing::warn!(
                        source = %name,
                        normalizer = self.normalizer.label(),
                        origin = origin.as_str(),
                        error = %e,
                        "Failed to normalize payload"
                    );
                    errors.push(e.to_string());
                    Err(Failure::Parse(e.to_string()))
                }
            },
            None => Err(Failure::Unavailable(errors.join("; "))),
        };

        if !errors.is_empty() {
            lock(&self.health).record_failure(errors.join("; "), Utc::now());
        }

        match outcome {
            Ok(snapshot) => Ok(self.publish(snapshot)),
            Err(Failure::Parse(reason)) => {
                if let Some(stale) = self.mark_stale(&reason) {
                    return Ok(stale);
                }
                self.fall_back_to_reference(&ctx, reason)
            }
            Err(Failure::Unavailable(reason)) => self.fall_back_to_reference(&ctx, reason),
        }
    }

    async fn save_cache(&self, payload: &RawPayload) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(payload).await {
                tracing::warn!(source = %self.config.name, error = %e, "Failed to update cache");
            }
        }
    }

    async fn load_cache(&self, errors: &mut Vec<String>) -> Option<RawPayload> {
        let cache = self.cache.as_ref()?;
        match cache.load().await {
            Ok(payload) => {
                tracing::info!(
                    source = %self.config.name,
                    path = %cache.path().display(),
                    "Serving cached payload"
                );
                Some(payload)
            }
            Err(e) => {
                tracing::warn!(source = %self.config.name, error = %e, "Cache unavailable");
                errors.push(e.to_string());
                None
            }
        }
    }

    /// Re-serve the held snapshot marked stale; observers are not notified
    fn mark_stale(self: &Arc<Self>, reason: &str) -> Option<Arc<NormalizedSnapshot>> {
        let held = read(&self.snapshot)?;
        let stale = Arc::new((*held).clone().with_origin(SnapshotOrigin::Stale));
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&stale));

        let retry_at = self.schedule_retry_after(self.config.stale_retry_delay);
        tracing::warn!(
            source = %self.config.name,
            retry_at = ?retry_at,
            "Keeping stale snapshot"
        );
        let _ = self.events.send(CoordinatorEvent::Failed {
            source: self.config.name.clone(),
            reason: reason.to_string(),
            retry_at,
        });
        Some(stale)
    }

    fn fall_back_to_reference(
        self: &Arc<Self>,
        ctx: &NormalizeContext,
        reason: String,
    ) -> RefreshResult {
        let fallback = ctx
            .reference
            .as_ref()
            .filter(|reference| reference.has_prayers())
            .and_then(|reference| reference.to_snapshot(ctx).ok());

        match fallback {
            Some(snapshot) => {
                tracing::info!(source = %self.config.name, "Serving calculated reference times");
                Ok(self.publish(snapshot.with_origin(SnapshotOrigin::Reference)))
            }
            None => Err(self.fail(reason)),
        }
    }

    fn fail(self: &Arc<Self>, reason: String) -> CoordinatorError {
        let retry_at = self.schedule_retry();
        tracing::error!(
            source = %self.config.name,
            reason = %reason,
            retry_at = ?retry_at,
            "Source unavailable"
        );
        let _ = self.events.send(CoordinatorEvent::Failed {
            source: self.config.name.clone(),
            reason: reason.clone(),
            retry_at,
        });
        CoordinatorError::unavailable(self.config.name.clone(), reason)
    }

    fn publish(self: &Arc<Self>, snapshot: NormalizedSnapshot) -> Arc<NormalizedSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        lock(&self.health).record_success(snapshot.origin, Utc::now());

        let next_wake = self.schedule_next(&snapshot);

        let observers = read(&self.observers);
        for observer in &observers {
            observer.on_snapshot(&self.config.name, &snapshot);
        }

        tracing::info!(
            source = %self.config.name,
            origin = snapshot.origin.as_str(),
            date = %snapshot.date,
            values = snapshot.len(),
            next_wake = ?next_wake,
            "Published snapshot"
        );
        let _ = self.events.send(CoordinatorEvent::Refreshed {
            source: self.config.name.clone(),
            origin: snapshot.origin,
            fetched_at: snapshot.fetched_at,
            next_wake,
        });

        snapshot
    }

    fn schedule_next(self: &Arc<Self>, snapshot: &NormalizedSnapshot) -> Option<DateTime<Utc>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }

        match self
            .config
            .policy
            .next_wake(Some(snapshot), Utc::now(), &self.config.timezone)
        {
            Ok(at) => Some(self.arm(at)),
            Err(e) => {
                tracing::warn!(source = %self.config.name, error = %e, "Could not compute next wake");
                self.schedule_retry()
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>) -> Option<DateTime<Utc>> {
        self.schedule_retry_after(self.config.retry_delay)
    }

    fn schedule_retry_after(self: &Arc<Self>, delay: std::time::Duration) -> Option<DateTime<Utc>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
        Some(self.arm(Utc::now() + delay))
    }

    fn arm(self: &Arc<Self>, at: DateTime<Utc>) -> DateTime<Utc> {
        let weak: Weak<Inner> = Arc::downgrade(self);
        self.scheduler.schedule_at(at, move || async move {
            if let Some(inner) = weak.upgrade() {
                let coordinator = Coordinator { inner };
                if let Err(e) = coordinator.refresh().await {
                    tracing::debug!(source = %coordinator.name(), error = %e, "Scheduled refresh failed");
                }
            }
        });
        at
    }
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    normalizer: Option<Arc<dyn Normalizer>>,
    cache: Option<SnapshotCache>,
    reference: Option<Arc<dyn ReferenceSource>>,
}

impl CoordinatorBuilder {
    /// Set the fetcher
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set a shared fetcher
    pub fn shared_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the normalizer
    pub fn normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Some(Arc::new(normalizer));
        self
    }

    /// Set the payload cache
    pub fn cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the reference time source
    pub fn reference(mut self, reference: Arc<dyn ReferenceSource>) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<Coordinator> {
        self.config.validate()?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| Error::config(format!("{}: fetcher is required", self.config.name)))?;
        let normalizer = self
            .normalizer
            .ok_or_else(|| Error::config(format!("{}: normalizer is required", self.config.name)))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let scheduler = Scheduler::new(self.config.name.clone());

        Ok(Coordinator {
            inner: Arc::new(Inner {
                config: self.config,
                fetcher,
                normalizer,
                cache: self.cache,
                reference: self.reference,
                scheduler,
                snapshot: RwLock::new(None),
                inflight: Mutex::new(None),
                observers: RwLock::new(Vec::new()),
                events,
                health: Mutex::new(SourceHealth::default()),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}
