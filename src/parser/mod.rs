//! Payload normalization
//!
//! Each source kind has a normalizer that turns its raw JSON payload into a
//! [`NormalizedSnapshot`]. Time-of-day values are anchored to the local date
//! in the context and stored as UTC instants.
//!
//! - [`offset`] - hour offset correction against a reference Maghrib
//! - [`calculated`] - standard calculated times (`data.timings`)
//! - [`timetable`] - ICCI yearly timetable
//! - [`wordpress`] - Daily Prayer Time plugin, `today` and `year` filters
//! - [`neohub`] - neoHub INFO / ENGINEERS_DATA status
//! - [`speaker`] - remote speaker `/getUpdate` status

pub mod calculated;
pub mod neohub;
pub mod offset;
pub mod speaker;
pub mod timetable;
pub mod wordpress;

pub use calculated::CalculatedNormalizer;
pub use neohub::NeoHubNormalizer;
pub use offset::{format_time, offset_fix};
pub use speaker::SpeakerNormalizer;
pub use timetable::TimetableNormalizer;
pub use wordpress::{WordpressDayListNormalizer, WordpressTodayNormalizer};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::fetcher::RawPayload;
use crate::models::{prayer, NormalizedSnapshot, SnapshotValue};
use crate::utils::error::ParseError;

/// Calculated midnight used when the reference calculation is unavailable
pub const DEFAULT_MIDNIGHT: &str = "00:00";

/// Standard calculated times used to correct and back up timetable sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTimes {
    /// Reference Maghrib as `HH:MM`, if the calculation succeeded
    pub maghrib: Option<String>,

    /// Calculated midnight as `HH:MM`
    pub midnight: String,

    /// Full reference prayer map (`HH:MM` values)
    pub prayers: BTreeMap<String, String>,
}

impl Default for ReferenceTimes {
    fn default() -> Self {
        Self {
            maghrib: None,
            midnight: DEFAULT_MIDNIGHT.to_string(),
            prayers: BTreeMap::new(),
        }
    }
}

impl ReferenceTimes {
    /// Build from a map of prayer name to `HH:MM`
    pub fn from_prayers(prayers: BTreeMap<String, String>) -> Self {
        let maghrib = prayers.get(prayer::MAGHRIB).cloned();
        let midnight = prayers
            .get(prayer::MIDNIGHT)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MIDNIGHT.to_string());

        Self {
            maghrib,
            midnight,
            prayers,
        }
    }

    /// Check if a full prayer map is available for fallback use
    pub fn has_prayers(&self) -> bool {
        !self.prayers.is_empty()
    }

    /// Snapshot built from the reference prayers alone
    pub fn to_snapshot(&self, ctx: &NormalizeContext) -> Result<NormalizedSnapshot, ParseError> {
        let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
        for (key, value) in &self.prayers {
            insert_time(&mut snapshot, key, value, ctx);
        }
        ensure_not_empty(snapshot, "reference prayers")
    }
}

/// Inputs a normalizer needs besides the payload
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// Source name stamped on the snapshot
    pub source: String,

    /// Local calendar date all times are anchored to
    pub today: NaiveDate,

    /// Configured local timezone
    pub tz: Tz,

    /// Reference times, for sources that need correction
    pub reference: Option<ReferenceTimes>,
}

impl NormalizeContext {
    /// Context for the local date of `now` in `tz`
    pub fn new(source: impl Into<String>, tz: Tz, now: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            today: now.with_timezone(&tz).date_naive(),
            tz,
            reference: None,
        }
    }

    /// Attach reference times
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceTimes) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Reference Maghrib, if known
    pub fn reference_maghrib(&self) -> Option<&str> {
        self.reference.as_ref().and_then(|r| r.maghrib.as_deref())
    }

    /// Calculated midnight from the reference, or the default
    pub fn reference_midnight(&self) -> &str {
        self.reference
            .as_ref()
            .map_or(DEFAULT_MIDNIGHT, |r| r.midnight.as_str())
    }
}

/// Converts a raw payload into a normalized snapshot
pub trait Normalizer: Send + Sync {
    /// Cache file label for this source kind
    fn label(&self) -> &'static str;

    /// Whether the normalizer uses reference times
    fn needs_reference(&self) -> bool {
        false
    }

    /// Normalize a payload
    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError>;
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Combine a local date and time in `tz` and convert to UTC
///
/// Returns `None` for local times that do not exist (DST gap). Ambiguous
/// times resolve to the earlier instant.
pub fn anchor_time(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// Parse a time-of-day string and insert it as an instant
///
/// Field-level failures are logged and skipped. Returns whether the value
/// was inserted.
pub fn insert_time(
    snapshot: &mut NormalizedSnapshot,
    key: &str,
    value: &str,
    ctx: &NormalizeContext,
) -> bool {
    let Some(time) = parse_time_of_day(value) else {
        tracing::warn!(source = %ctx.source, field = key, value, "Skipping unparseable time");
        return false;
    };

    match anchor_time(ctx.today, time, &ctx.tz) {
        Some(instant) => {
            snapshot.insert(key, SnapshotValue::Instant(instant));
            true
        }
        None => {
            tracing::warn!(source = %ctx.source, field = key, value, "Skipping time that does not exist locally");
            false
        }
    }
}

/// Reject snapshots with no usable field
pub fn ensure_not_empty(
    snapshot: NormalizedSnapshot,
    what: &str,
) -> Result<NormalizedSnapshot, ParseError> {
    if snapshot.is_empty() {
        return Err(ParseError::NoMatch(format!(
            "{what} on {}",
            snapshot.date.format("%Y-%m-%d")
        )));
    }
    Ok(snapshot)
}

/// Decode a payload as JSON for normalization
pub(crate) fn decode(payload: &RawPayload) -> Result<serde_json::Value, ParseError> {
    payload
        .json()
        .map_err(|e| ParseError::field("payload", e.to_string()))
}

/// First five characters of a time string (`HH:MM:SS` -> `HH:MM`)
pub(crate) fn hhmm(value: &str) -> &str {
    value.get(..5).unwrap_or(value)
}
