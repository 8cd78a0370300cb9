//! Snapshot observers and coordinator events

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{NormalizedSnapshot, SnapshotOrigin};

/// Receives every snapshot a coordinator publishes
///
/// Observers are called synchronously, in registration order, right after the
/// snapshot is swapped in. Keep them quick.
pub trait SnapshotObserver: Send + Sync {
    fn on_snapshot(&self, source: &str, snapshot: &Arc<NormalizedSnapshot>);
}

impl<F> SnapshotObserver for F
where
    F: Fn(&str, &Arc<NormalizedSnapshot>) + Send + Sync,
{
    fn on_snapshot(&self, source: &str, snapshot: &Arc<NormalizedSnapshot>) {
        self(source, snapshot)
    }
}

/// Events broadcast after every refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    /// A snapshot was published
    Refreshed {
        source: String,
        origin: SnapshotOrigin,
        fetched_at: DateTime<Utc>,
        next_wake: Option<DateTime<Utc>>,
    },

    /// The refresh failed; a stale snapshot may still be served
    Failed {
        source: String,
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    },
}

impl CoordinatorEvent {
    /// Source the event belongs to
    pub fn source(&self) -> &str {
        match self {
            Self::Refreshed { source, .. } | Self::Failed { source, .. } => source,
        }
    }
}
