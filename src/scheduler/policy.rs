//! Wake policies
//!
//! A policy turns the freshly published snapshot and the current time into
//! the instant of the next refresh.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use crate::models::NormalizedSnapshot;

/// Default jitter window after local midnight
pub const DEFAULT_JITTER_WINDOW_SECS: u32 = 3600;

fn default_jitter_window() -> u32 {
    DEFAULT_JITTER_WINDOW_SECS
}

/// How the next wake is chosen after a successful refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WakePolicy {
    /// Wake after the calculated midnight of the published prayer times
    CalculatedMidnight,

    /// Wake at a random instant shortly after the next local midnight
    AfterMidnightJitter {
        #[serde(default = "default_jitter_window")]
        window_secs: u32,
    },

    /// Wake a fixed number of seconds after each refresh
    Interval { secs: u64 },
}

impl WakePolicy {
    /// Jittered wake with the default one hour window
    pub fn after_midnight() -> Self {
        Self::AfterMidnightJitter {
            window_secs: DEFAULT_JITTER_WINDOW_SECS,
        }
    }

    /// Fixed interval wake
    pub fn interval(interval: std::time::Duration) -> Self {
        Self::Interval {
            secs: interval.as_secs(),
        }
    }

    /// Validate policy parameters
    pub fn validate(&self) -> SchedulerResult<()> {
        match self {
            Self::Interval { secs: 0 } => Err(SchedulerError::policy_config(
                "secs",
                "interval must be at least one second",
            )),
            Self::AfterMidnightJitter { window_secs: 0 } => Err(SchedulerError::policy_config(
                "window_secs",
                "jitter window must be at least one second",
            )),
            _ => Ok(()),
        }
    }

    /// Compute the next wake instant
    pub fn next_wake(
        &self,
        snapshot: Option<&NormalizedSnapshot>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> SchedulerResult<DateTime<Utc>> {
        match self {
            Self::CalculatedMidnight => {
                let midnight = snapshot.and_then(NormalizedSnapshot::calculated_midnight);
                calculated_midnight_wake(midnight, now, tz)
            }
            Self::AfterMidnightJitter { window_secs } => {
                after_midnight_jitter(now, tz, *window_secs, &mut rand::thread_rng())
            }
            Self::Interval { secs } => {
                let secs = i64::try_from(*secs)
                    .map_err(|_| SchedulerError::policy_config("secs", "interval too large"))?;
                Ok(now + Duration::seconds(secs))
            }
        }
    }

    /// Short name for logs and the API
    pub fn name(&self) -> &'static str {
        match self {
            Self::CalculatedMidnight => "calculated_midnight",
            Self::AfterMidnightJitter { .. } => "after_midnight_jitter",
            Self::Interval { .. } => "interval",
        }
    }
}

/// Dual midnight rule
///
/// If the calculated midnight `M` has already passed, wake one minute after
/// the same time tomorrow. Otherwise wake at the start of the next local day,
/// when today's times are replaced anyway.
pub fn calculated_midnight_wake(
    midnight: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> SchedulerResult<DateTime<Utc>> {
    match midnight {
        Some(m) if now > m => {
            tracing::debug!(midnight = %m, "Calculated midnight passed, waking after it tomorrow");
            Ok(m + Duration::days(1) + Duration::minutes(1))
        }
        Some(_) => start_of_next_local_day(now, tz),
        None => {
            tracing::debug!("No calculated midnight, waking at the start of the next day");
            start_of_next_local_day(now, tz)
        }
    }
}

/// First existing instant of the local day after `now`
pub fn start_of_next_local_day(now: DateTime<Utc>, tz: &Tz) -> SchedulerResult<DateTime<Utc>> {
    let today = now.with_timezone(tz).date_naive();
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| SchedulerError::invalid_instant(format!("no day after {today}")))?;
    start_of_local_day(tomorrow, tz)
}

/// First existing instant of a local date
///
/// A few zones switch DST at midnight, so the first existing hour is used.
pub fn start_of_local_day(date: NaiveDate, tz: &Tz) -> SchedulerResult<DateTime<Utc>> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| SchedulerError::invalid_instant(format!("no local midnight on {date} in {tz}")))
}

/// Random instant within `window_secs` after the next local midnight
pub fn after_midnight_jitter<R: Rng + ?Sized>(
    now: DateTime<Utc>,
    tz: &Tz,
    window_secs: u32,
    rng: &mut R,
) -> SchedulerResult<DateTime<Utc>> {
    let midnight = start_of_next_local_day(now, tz)?;
    let offset = rng.gen_range(0..=window_secs);
    Ok(midnight + Duration::seconds(i64::from(offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_midnight_already_passed() {
        let now = utc("2024-01-15T23:50:00Z");
        let m = utc("2024-01-15T23:30:00Z");
        let wake = calculated_midnight_wake(Some(m), now, &chrono_tz::UTC).unwrap();
        assert_eq!(wake, utc("2024-01-16T23:31:00Z"));
    }

    #[test]
    fn test_midnight_still_ahead() {
        let now = utc("2024-01-15T23:50:00Z");
        let m = utc("2024-01-16T00:40:00Z");
        let wake = calculated_midnight_wake(Some(m), now, &chrono_tz::UTC).unwrap();
        assert_eq!(wake, utc("2024-01-16T00:00:00Z"));
    }

    #[test]
    fn test_missing_midnight() {
        let now = utc("2024-06-15T10:00:00Z");
        let wake = calculated_midnight_wake(None, now, &chrono_tz::Europe::Dublin).unwrap();
        // Local midnight in IST (UTC+1)
        assert_eq!(wake, utc("2024-06-15T23:00:00Z"));
    }

    #[test]
    fn test_interval() {
        let now = utc("2024-06-15T10:00:00Z");
        let policy = WakePolicy::interval(std::time::Duration::from_secs(30));
        let wake = policy.next_wake(None, now, &chrono_tz::UTC).unwrap();
        assert_eq!(wake, utc("2024-06-15T10:00:30Z"));
    }

    #[test]
    fn test_jitter_within_window() {
        let now = utc("2024-06-15T10:00:00Z");
        let mut rng = StepRng::new(u64::MAX / 2, 1);
        let wake = after_midnight_jitter(now, &chrono_tz::UTC, 3600, &mut rng).unwrap();
        assert!(wake >= utc("2024-06-16T00:00:00Z"));
        assert!(wake <= utc("2024-06-16T01:00:00Z"));

        let policy = WakePolicy::after_midnight();
        for _ in 0..20 {
            let wake = policy.next_wake(None, now, &chrono_tz::UTC).unwrap();
            assert!(wake >= utc("2024-06-16T00:00:00Z"));
            assert!(wake <= utc("2024-06-16T01:00:00Z"));
        }
    }

    #[test]
    fn test_validate() {
        assert!(WakePolicy::Interval { secs: 0 }.validate().is_err());
        assert!(WakePolicy::AfterMidnightJitter { window_secs: 0 }.validate().is_err());
        assert!(WakePolicy::CalculatedMidnight.validate().is_ok());
    }

    #[test]
    fn test_policy_serde() {
        let policy: WakePolicy = serde_json::from_str(r#"{"policy":"interval","secs":10}"#).unwrap();
        assert_eq!(policy, WakePolicy::Interval { secs: 10 });

        let policy: WakePolicy =
            serde_json::from_str(r#"{"policy":"after_midnight_jitter"}"#).unwrap();
        assert_eq!(policy, WakePolicy::after_midnight());
    }
}
