//! One-shot wake scheduling
//!
//! Every coordinator owns one [`Scheduler`]. It holds at most one pending
//! wake: arranging a new wake replaces the old one, and a generation counter
//! checked under the same lock guarantees a replaced timer can never fire.
//!
//! # State machine
//!
//! ```text
//!   Idle ──schedule_at──▶ Pending ──timer──▶ Fired ──callback done──▶ Idle
//!                           │
//!                           └──cancel──▶ Cancelled
//! ```
//!
//! # Modules
//!
//! - [`policy`] - next-wake computation (calculated midnight, jitter, interval)
//! - [`error`] - scheduler error types
//!
//! # Example
//!
//! ```ignore
//! use waqt::scheduler::Scheduler;
//!
//! let scheduler = Scheduler::new("hicc");
//! let handle = scheduler.schedule_at(wake, move || async move {
//!     coordinator.refresh().await.ok();
//! });
//! scheduler.cancel(&handle);
//! ```

pub mod error;
pub mod policy;

pub use error::{SchedulerError, SchedulerResult};
pub use policy::{calculated_midnight_wake, start_of_next_local_day, WakePolicy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Lifecycle of the scheduler slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeState {
    /// Nothing arranged
    Idle,
    /// Timer armed
    Pending,
    /// Timer fired, callback running
    Fired,
    /// Timer cancelled before firing
    Cancelled,
}

/// Handle to one arranged wake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeHandle {
    generation: u64,
    at: DateTime<Utc>,
}

impl WakeHandle {
    /// Target instant
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: WakeState,
    target: Option<DateTime<Utc>>,
    task: Option<JoinHandle<()>>,
}

/// Single-slot one-shot timer
#[derive(Debug, Clone)]
pub struct Scheduler {
    name: Arc<str>,
    slot: Arc<Mutex<Slot>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Scheduler {
    /// Create an idle scheduler
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                state: WakeState::Idle,
                target: None,
                task: None,
            })),
        }
    }

    /// Arrange `callback` to run once at `at`, replacing any pending wake
    ///
    /// Instants in the past fire immediately. Must be called from within a
    /// tokio runtime.
    pub fn schedule_at<F, Fut>(&self, at: DateTime<Utc>, callback: F) -> WakeHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        let generation = slot.generation;

        // A fired task is the one running this call; only armed timers are aborted
        if let Some(task) = slot.task.take() {
            if slot.state == WakeState::Pending {
                task.abort();
                tracing::debug!(scheduler = %self.name, "Replaced pending wake");
            }
        }

        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let shared = Arc::clone(&self.slot);
        let name = Arc::clone(&self.name);

        slot.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut slot = lock(&shared);
                if slot.generation != generation || slot.state != WakeState::Pending {
                    return;
                }
                slot.state = WakeState::Fired;
                slot.task = None;
            }

            tracing::debug!(scheduler = %name, "Wake fired");
            callback().await;

            let mut slot = lock(&shared);
            if slot.generation == generation && slot.state == WakeState::Fired {
                slot.state = WakeState::Idle;
                slot.target = None;
            }
        }));

        slot.state = WakeState::Pending;
        slot.target = Some(at);

        tracing::debug!(scheduler = %self.name, at = %at, delay_secs = delay.as_secs(), "Wake scheduled");
        WakeHandle { generation, at }
    }

    /// Cancel a wake if it is still pending
    ///
    /// Idempotent; returns `true` only when a pending timer was disarmed.
    pub fn cancel(&self, handle: &WakeHandle) -> bool {
        let mut slot = lock(&self.slot);
        if slot.generation != handle.generation || slot.state != WakeState::Pending {
            return false;
        }
        Self::disarm(&mut slot);
        tracing::debug!(scheduler = %self.name, at = %handle.at, "Wake cancelled");
        true
    }

    /// Cancel whatever wake is pending
    pub fn cancel_pending(&self) -> bool {
        let mut slot = lock(&self.slot);
        if slot.state != WakeState::Pending {
            return false;
        }
        Self::disarm(&mut slot);
        true
    }

    fn disarm(slot: &mut Slot) {
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.state = WakeState::Cancelled;
        slot.target = None;
    }

    /// Current slot state
    pub fn state(&self) -> WakeState {
        lock(&self.slot).state
    }

    /// Instant of the pending wake, if any
    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        let slot = lock(&self.slot);
        match slot.state {
            WakeState::Pending => slot.target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    fn in_ms(ms: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_fires_once() {
        let scheduler = Scheduler::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.schedule_at(in_ms(20), counter_callback(&fired));
        assert_eq!(scheduler.state(), WakeState::Pending);
        assert_eq!(scheduler.next_wake(), Some(handle.at()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), WakeState::Idle);
        assert!(scheduler.next_wake().is_none());
    }

    #[tokio::test]
    async fn test_replace_prevents_stale_fire() {
        let scheduler = Scheduler::new("test");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_at(in_ms(20), counter_callback(&first));
        scheduler.schedule_at(in_ms(60), counter_callback(&second));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_idempotent() {
        let scheduler = Scheduler::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.schedule_at(in_ms(30), counter_callback(&fired));
        assert!(scheduler.cancel(&handle));
        assert!(!scheduler.cancel(&handle));
        assert_eq!(scheduler.state(), WakeState::Cancelled);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_stale_handle_keeps_new_wake() {
        let scheduler = Scheduler::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        let old = scheduler.schedule_at(in_ms(500), counter_callback(&fired));
        scheduler.schedule_at(in_ms(20), counter_callback(&fired));
        assert!(!scheduler.cancel(&old));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_past_instant_fires_immediately() {
        let scheduler = Scheduler::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_at(in_ms(-1000), counter_callback(&fired));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reschedule_from_callback() {
        let scheduler = Scheduler::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        let inner = scheduler.clone();
        let counter = Arc::clone(&fired);
        scheduler.schedule_at(in_ms(10), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&counter);
            inner.schedule_at(in_ms(10), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.state(), WakeState::Idle);
    }
}
