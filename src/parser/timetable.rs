//! ICCI yearly timetable
//!
//! The payload carries the whole year: `timetable[<month>][<day>]` (unpadded
//! keys) is a list of `[hour, minute]` pairs for Fajr, Sunrise, Dhuhr, Asr,
//! Maghrib and Isha. The timetable's DST dates are fixed, so the day's times
//! are shifted by [`offset_fix`] against the reference Maghrib.

use chrono::Datelike;
use serde_json::Value;
use std::collections::BTreeMap;

use super::offset::{format_time, offset_fix};
use super::{decode, ensure_not_empty, insert_time, NormalizeContext, Normalizer};
use crate::fetcher::RawPayload;
use crate::models::{prayer, NormalizedSnapshot};
use crate::utils::error::ParseError;

/// Hour/minute pairs in timetable order; `None` for a field that was unusable
pub(crate) type DayTimes = [Option<(i64, i64)>; 6];

/// Canonical keys of the timetable slots other than Maghrib
const SLOT_KEYS: [(&str, usize); 5] = [
    (prayer::FAJR, 0),
    (prayer::SUNRISE, 1),
    (prayer::DHUHR, 2),
    (prayer::ASR, 3),
    (prayer::ISHA, 5),
];

const MAGHRIB_SLOT: usize = 4;

/// Apply the offset fix to one day and expand to the canonical key set
///
/// Sunset and Imsak both take the Maghrib value. Midnight comes from the
/// reference calculation. Maghrib is required since the offset is derived
/// from it; any other missing slot is left out.
pub(crate) fn corrected_day(
    times: &DayTimes,
    ctx: &NormalizeContext,
) -> Result<BTreeMap<String, String>, ParseError> {
    let (maghrib_h, maghrib_m) = times[MAGHRIB_SLOT]
        .ok_or_else(|| ParseError::field(prayer::MAGHRIB, "missing, needed for the offset fix"))?;
    let source_maghrib = format_time(maghrib_h, maghrib_m, 0);
    let offset = offset_fix(&source_maghrib, ctx.reference_maghrib().unwrap_or_default());

    if offset != 0 {
        tracing::info!(source = %ctx.source, offset, maghrib = %source_maghrib, "Applying DST offset fix");
    }

    let mut day: BTreeMap<String, String> = SLOT_KEYS
        .iter()
        .filter_map(|&(key, slot)| {
            times[slot].map(|(h, m)| (key.to_string(), format_time(h, m, offset)))
        })
        .collect();

    let maghrib = format_time(maghrib_h, maghrib_m, offset);
    day.insert(prayer::SUNSET.to_string(), maghrib.clone());
    day.insert(prayer::IMSAK.to_string(), maghrib.clone());
    day.insert(prayer::MAGHRIB.to_string(), maghrib);
    day.insert(prayer::MIDNIGHT.to_string(), ctx.reference_midnight().to_string());
    Ok(day)
}

/// Insert a corrected day into a fresh snapshot
pub(crate) fn day_snapshot(
    times: &DayTimes,
    ctx: &NormalizeContext,
    what: &str,
) -> Result<NormalizedSnapshot, ParseError> {
    let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
    for (key, value) in corrected_day(times, ctx)? {
        insert_time(&mut snapshot, &key, &value, ctx);
    }
    ensure_not_empty(snapshot, what)
}

/// Normalizer for the ICCI timetable
#[derive(Debug, Clone, Copy, Default)]
pub struct TimetableNormalizer;

impl TimetableNormalizer {
    fn pair(entry: &Value, index: usize) -> Result<(i64, i64), ParseError> {
        let field = || format!("prayer[{index}]");
        let pair = entry
            .get(index)
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::field(field(), "missing [hour, minute] pair"))?;

        match (
            pair.first().and_then(Value::as_i64),
            pair.get(1).and_then(Value::as_i64),
        ) {
            (Some(h), Some(m)) => Ok((h, m)),
            _ => Err(ParseError::field(field(), "hour and minute must be integers")),
        }
    }
}

impl Normalizer for TimetableNormalizer {
    fn label(&self) -> &'static str {
        "timetable"
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
        let month = ctx.today.month().to_string();
        let day = ctx.today.day().to_string();

        let timetable = json
            .get("timetable")
            .ok_or_else(|| ParseError::field("timetable", "missing"))?;
        let entry = timetable
            .get(&month)
            .and_then(|m| m.get(&day))
            .ok_or_else(|| ParseError::NoMatch(format!("timetable[{month}][{day}]")))?;

        let mut times: DayTimes = [None; 6];
        for (index, slot) in times.iter_mut().enumerate() {
            match Self::pair(entry, index) {
                Ok(pair) => *slot = Some(pair),
                Err(e) => {
                    tracing::warn!(source = %ctx.source, error = %e, "Skipping timetable field");
                }
            }
        }

        day_snapshot(&times, ctx, "ICCI timetable")
    }
}
