//! Daily Prayer Time WordPress plugin
//!
//! Two endpoint filters are supported:
//!
//! - `filter=today`: a list whose first record holds today's begin times.
//!   These are mapped onto the canonical prayer keys with the DST offset fix.
//! - `filter=year`: a list whose first element is the list of per-day records.
//!   The record whose `d_date` is today is published as-is, one value per
//!   field.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::offset::split_time;
use super::timetable::{day_snapshot, DayTimes};
use super::{decode, ensure_not_empty, hhmm, insert_time, NormalizeContext, Normalizer};
use crate::fetcher::RawPayload;
use crate::models::{NormalizedSnapshot, SnapshotValue};
use crate::utils::error::ParseError;

/// Fields of a `today` record, in timetable order
const TODAY_FIELDS: [&str; 6] = [
    "fajr_begins",
    "sunrise",
    "zuhr_begins",
    "asr_mithl_1",
    "maghrib_begins",
    "isha_begins",
];

/// Field carrying the record's Gregorian date
const DATE_FIELD: &str = "d_date";

/// Field always published as text
const HIJRI_FIELD: &str = "hijri_date";

/// Normalizer for `filter=today`
#[derive(Debug, Clone, Copy, Default)]
pub struct WordpressTodayNormalizer;

impl Normalizer for WordpressTodayNormalizer {
    fn label(&self) -> &'static str {
        "prayertime"
    }

    fn needs_reference(&self) -> bool {
        true
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError> {
        let json = decode(payload)?;
        let record = json
            .get(0)
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::field("[0]", "expected a list of records"))?;

        let mut times: DayTimes = [None; 6];
        for (slot, field) in times.iter_mut().zip(TODAY_FIELDS) {
            let Some(value) = record.get(field).and_then(Value::as_str) else {
                tracing::warn!(source = %ctx.source, field, "Skipping missing field");
                continue;
            };
            *slot = split_time(hhmm(value));
            if slot.is_none() {
                tracing::warn!(source = %ctx.source, field, value, "Skipping field that is not HH:MM");
            }
        }

        day_snapshot(&times, ctx, "WordPress today record")
    }
}

/// Normalizer for `filter=year`
#[derive(Debug, Clone, Copy, Default)]
pub struct WordpressDayListNormalizer;

impl WordpressDayListNormalizer {
    /// Validate the list-of-lists shape and return the day records
    fn records(json: &Value) -> Result<&Vec<Value>, ParseError> {
        let outer = json
            .as_array()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ParseError::field("payload", "expected a non-empty list"))?;
        let days = outer[0]
            .as_array()
            .ok_or_else(|| ParseError::field("[0]", "expected a list of lists"))?;
        if !days.first().is_some_and(Value::is_object) {
            return Err(ParseError::field("[0][0]", "expected a list of records"));
        }
        Ok(days)
    }

    fn find_day<'a>(days: &'a [Value], today: NaiveDate) -> Option<&'a Map<String, Value>> {
        let today = today.format("%Y-%m-%d").to_string();
        days.iter()
            .filter_map(Value::as_object)
            .find(|day| day.get(DATE_FIELD).and_then(Value::as_str) == Some(today.as_str()))
    }
}

impl Normalizer for WordpressDayListNormalizer {
    fn label(&self) -> &'static str {
        "prayer_for_year"
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError> {
        let json = decode(payload)?;
        let days = Self::records(&json)?;
        let day = Self::find_day(days, ctx.today).ok_or_else(|| {
            ParseError::NoMatch(format!("d_date {}", ctx.today.format("%Y-%m-%d")))
        })?;

        tracing::debug!(source = %ctx.source, fields = day.len(), "Found record for today");

        let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
        for (key, value) in day {
            if key == DATE_FIELD {
                continue;
            }
            match value.as_str() {
                Some(text) if key == HIJRI_FIELD => {
                    snapshot.insert(key.as_str(), SnapshotValue::Text(text.to_string()));
                }
                Some(text) if super::parse_time_of_day(text).is_some() => {
                    insert_time(&mut snapshot, key, text, ctx);
                }
                Some(text) => {
                    snapshot.insert(key.as_str(), SnapshotValue::Text(text.to_string()));
                }
                None => {
                    tracing::warn!(source = %ctx.source, field = %key, value = %value, "Skipping non-string field");
                }
            }
        }

        ensure_not_empty(snapshot, "WordPress day record")
    }
}
