//! Source health tracking
//!
//! Every coordinator records the outcome of its refreshes here. The control
//! API folds the per-source results into one service status:
//!
//! - `healthy`: the latest snapshot came live from the source
//! - `degraded`: a snapshot is published but came from a fallback
//! - `unhealthy`: nothing has been published yet

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::SnapshotOrigin;

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Worst status of a set (healthy when empty)
    pub fn worst(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
        statuses
            .into_iter()
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }
}

/// Refresh outcome bookkeeping for one source
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceHealth {
    /// Last refresh that published a snapshot
    pub last_success: Option<DateTime<Utc>>,

    /// Last refresh that failed or fell back
    pub last_failure: Option<DateTime<Utc>>,

    /// Message of the last failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Failures since the last live refresh
    pub consecutive_failures: u32,

    /// Completed refreshes
    pub refresh_count: u64,
}

impl SourceHealth {
    /// Record a published snapshot
    pub fn record_success(&mut self, origin: SnapshotOrigin, at: DateTime<Utc>) {
        self.refresh_count += 1;
        self.last_success = Some(at);
        if origin == SnapshotOrigin::Live {
            self.consecutive_failures = 0;
            self.last_error = None;
        }
    }

    /// Record a failure (including fallbacks)
    pub fn record_failure(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.refresh_count += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(at);
        self.last_error = Some(error.into());
    }

    /// Health given the origin of the currently published snapshot
    pub fn status(&self, origin: Option<SnapshotOrigin>) -> HealthStatus {
        match origin {
            None => HealthStatus::Unhealthy,
            Some(SnapshotOrigin::Live) if self.consecutive_failures == 0 => HealthStatus::Healthy,
            Some(_) => HealthStatus::Degraded,
        }
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
