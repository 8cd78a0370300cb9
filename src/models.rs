// Core data structures for waqt coordinators

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical prayer keys published by the prayer-time sources
pub mod prayer {
    pub const FAJR: &str = "Fajr";
    pub const SUNRISE: &str = "Sunrise";
    pub const DHUHR: &str = "Dhuhr";
    pub const ASR: &str = "Asr";
    pub const SUNSET: &str = "Sunset";
    pub const MAGHRIB: &str = "Maghrib";
    pub const ISHA: &str = "Isha";
    pub const IMSAK: &str = "Imsak";
    pub const MIDNIGHT: &str = "Midnight";

    /// All keys, in the order a day unfolds
    pub const ALL: [&str; 9] = [
        FAJR, SUNRISE, DHUHR, ASR, SUNSET, MAGHRIB, ISHA, IMSAK, MIDNIGHT,
    ];
}

/// A single published value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SnapshotValue {
    /// Point in time, always UTC
    Instant(DateTime<Utc>),
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<String>),
}

/// Where the data in a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Fetched from the source in this refresh
    Live,
    /// Rebuilt from the on-disk cache record after a failed fetch
    Cache,
    /// Standard calculated times used because the source had nothing
    Reference,
    /// Previous in-memory snapshot kept after a failed normalize
    Stale,
}

impl SnapshotOrigin {
    /// Label used in logs and the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::Reference => "reference",
            Self::Stale => "stale",
        }
    }
}

/// Normalized, immutable set of named values for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSnapshot {
    /// Source name the snapshot belongs to
    pub source: String,

    /// Local calendar date the values are anchored to
    pub date: NaiveDate,

    /// When the snapshot was built
    pub fetched_at: DateTime<Utc>,

    /// Provenance of the values
    pub origin: SnapshotOrigin,

    /// Named values
    pub values: BTreeMap<String, SnapshotValue>,
}

impl NormalizedSnapshot {
    /// Create an empty live snapshot
    pub fn new(source: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            source: source.into(),
            date,
            fetched_at: Utc::now(),
            origin: SnapshotOrigin::Live,
            values: BTreeMap::new(),
        }
    }

    /// Replace the origin
    #[must_use]
    pub fn with_origin(mut self, origin: SnapshotOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: SnapshotValue) {
        self.values.insert(key.into(), value);
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        self.values.get(key)
    }

    /// Get an instant value
    pub fn instant(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.values.get(key) {
            Some(SnapshotValue::Instant(t)) => Some(*t),
            _ => None,
        }
    }

    /// Get a text value
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(SnapshotValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a numeric value
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(SnapshotValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Get a boolean value
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(SnapshotValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the snapshot holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Calculated midnight (end of the Isha window), if present
    pub fn calculated_midnight(&self) -> Option<DateTime<Utc>> {
        self.instant(prayer::MIDNIGHT)
    }
}
