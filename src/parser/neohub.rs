//! neoHub thermostat status
//!
//! Input is the merged payload built by
//! [`NeoHubFetcher`](crate::fetcher::NeoHubFetcher): one object per device
//! name holding the INFO fields plus an optional `engineers_data` object.
//! Every published key is `<device>.<attribute>`.

use serde_json::{Map, Value};

use super::{decode, ensure_not_empty, NormalizeContext, Normalizer};
use crate::fetcher::RawPayload;
use crate::models::{NormalizedSnapshot, SnapshotValue};
use crate::utils::error::ParseError;

/// neoPlug device type; plugs carry no thermostat state
pub const DEVICE_TYPE_PLUG: i64 = 6;

/// Hold time reported when no hold is active
const NO_HOLD_TIME: &str = "00:00";

/// Normalizer for neoHub status
#[derive(Debug, Clone, Copy, Default)]
pub struct NeoHubNormalizer;

/// Read a numeric field that may be encoded as a number or a string
fn number(device: &Map<String, Value>, field: &str) -> Option<f64> {
    let value = match device.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    Some((value * 100.0).round() / 100.0)
}

/// Loose truthiness of a status field
fn truthy(device: &Map<String, Value>, field: &str) -> bool {
    match device.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

impl NeoHubNormalizer {
    fn insert_device(snapshot: &mut NormalizedSnapshot, name: &str, device: &Map<String, Value>) {
        let key = |attr: &str| format!("{name}.{attr}");

        let numbers = [
            ("current_temperature", "CURRENT_TEMPERATURE"),
            ("target_temperature", "CURRENT_SET_TEMPERATURE"),
            ("humidity", "HUMIDITY"),
            ("hold_temperature", "HOLD_TEMPERATURE"),
        ];
        for (attr, field) in numbers {
            if let Some(value) = number(device, field) {
                snapshot.insert(key(attr), SnapshotValue::Number(value));
            }
        }

        let heating = truthy(device, "HEATING");
        let cooling = truthy(device, "COOLING");
        let hold = truthy(device, "TEMP_HOLD");

        let action = if heating {
            "heating"
        } else if cooling {
            "cooling"
        } else {
            "idle"
        };
        let mode = if truthy(device, "COOLING_ENABLED") { "cool" } else { "heat" };
        let unit = match device.get("TEMPERATURE_FORMAT") {
            Some(Value::Bool(false)) => "C",
            Some(Value::String(s)) if s.eq_ignore_ascii_case("c") => "C",
            _ => "F",
        };
        let hold_time = if hold {
            device
                .get("HOLD_TIME")
                .and_then(Value::as_str)
                .unwrap_or(NO_HOLD_TIME)
        } else {
            NO_HOLD_TIME
        };

        snapshot.insert(key("heating"), SnapshotValue::Flag(heating));
        snapshot.insert(key("cooling"), SnapshotValue::Flag(cooling));
        snapshot.insert(key("hvac_action"), SnapshotValue::Text(action.to_string()));
        snapshot.insert(key("hvac_mode"), SnapshotValue::Text(mode.to_string()));
        snapshot.insert(key("temperature_unit"), SnapshotValue::Text(unit.to_string()));
        snapshot.insert(key("hold"), SnapshotValue::Flag(hold));
        snapshot.insert(key("hold_time"), SnapshotValue::Text(hold_time.to_string()));
        snapshot.insert(key("standby"), SnapshotValue::Flag(truthy(device, "STANDBY")));

        if let Some(engineers) = device.get("engineers_data").and_then(Value::as_object) {
            let numbers = [
                ("frost_temperature", "FROST TEMPERATURE"),
                ("switching_differential", "SWITCHING DIFFERENTIAL"),
                ("output_delay", "OUTPUT DELAY"),
            ];
            for (attr, field) in numbers {
                if let Some(value) = number(engineers, field) {
                    snapshot.insert(key(attr), SnapshotValue::Number(value));
                }
            }
        }
    }
}

impl Normalizer for NeoHubNormalizer {
    fn label(&self) -> &'static str {
        "neohub"
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError> {
        let json = decode(payload)?;
        let devices = json
            .as_object()
            .ok_or_else(|| ParseError::field("payload", "expected an object keyed by device"))?;

        let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
        let mut names = Vec::new();

        for (name, device) in devices {
            let Some(device) = device.as_object() else {
                tracing::warn!(source = %ctx.source, device = %name, "Skipping malformed device entry");
                continue;
            };
            if device.get("DEVICE_TYPE").and_then(Value::as_i64) == Some(DEVICE_TYPE_PLUG) {
                tracing::debug!(source = %ctx.source, device = %name, "Skipping neoPlug");
                continue;
            }
            Self::insert_device(&mut snapshot, name, device);
            names.push(name.clone());
        }

        if !names.is_empty() {
            snapshot.insert("devices", SnapshotValue::List(names));
        }

        ensure_not_empty(snapshot, "neoHub thermostats")
    }
}
