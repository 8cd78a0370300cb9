//! Standard calculated prayer times
//!
//! Payload shape (AlAdhan `timings` endpoint):
//!
//! ```json
//! {"code": 200, "data": {"timings": {"Fajr": "05:12 (GMT)", "Sunrise": "07:01", ...}}}
//! ```

use serde_json::Value;
use std::collections::BTreeMap;

use super::{decode, ensure_not_empty, hhmm, insert_time, NormalizeContext, Normalizer, ReferenceTimes};
use crate::fetcher::RawPayload;
use crate::models::{prayer, NormalizedSnapshot};
use crate::utils::error::ParseError;

/// Normalizer for calculated timings
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatedNormalizer;

/// Extract the `HH:MM` prayer map from a timings payload
pub fn extract_timings(json: &Value) -> Result<BTreeMap<String, String>, ParseError> {
    let timings = json
        .pointer("/data/timings")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::field("data.timings", "missing or not an object"))?;

    let prayers = prayer::ALL
        .iter()
        .filter_map(|&key| {
            let value = timings.get(key).and_then(Value::as_str);
            if value.is_none() {
                tracing::warn!(field = key, "Calculated timings missing field");
            }
            value.map(|v| (key.to_string(), hhmm(v.trim()).to_string()))
        })
        .collect();

    Ok(prayers)
}

/// Build reference times from a timings payload
pub fn reference_from_payload(payload: &RawPayload) -> Result<ReferenceTimes, ParseError> {
    let json = decode(payload)?;
    Ok(ReferenceTimes::from_prayers(extract_timings(&json)?))
}

impl Normalizer for CalculatedNormalizer {
    fn label(&self) -> &'static str {
        "calculated"
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError> {
        let json = decode(payload)?;
        let prayers = extract_timings(&json)?;

        let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
        for (key, value) in &prayers {
            insert_time(&mut snapshot, key, value, ctx);
        }

        ensure_not_empty(snapshot, "calculated timings")
    }
}
