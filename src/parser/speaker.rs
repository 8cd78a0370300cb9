//! Remote speaker status (`/getUpdate`)

use serde_json::Value;

use super::{decode, NormalizeContext, Normalizer};
use crate::fetcher::RawPayload;
use crate::models::{NormalizedSnapshot, SnapshotValue};
use crate::utils::error::ParseError;

/// Playback state reported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Idle,
}

impl PlaybackState {
    fn from_status(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("STATE_PLAYING") => Self::Playing,
            Some("STATE_PAUSED") => Self::Paused,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Idle => "idle",
        }
    }

    /// Media duration and position are only meaningful while active
    pub fn has_media(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Normalizer for speaker status
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerNormalizer;

fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Normalizer for SpeakerNormalizer {
    fn label(&self) -> &'static str {
        "speaker"
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        ctx: &NormalizeContext,
    ) -> Result<NormalizedSnapshot, ParseError> {
        let json = decode(payload)?;
        let status = json
            .as_object()
            .ok_or_else(|| ParseError::field("payload", "expected a status object"))?;

        let mut snapshot = NormalizedSnapshot::new(&ctx.source, ctx.today);
        let state = PlaybackState::from_status(status.get("state"));
        snapshot.insert("state", SnapshotValue::Text(state.as_str().to_string()));

        match as_f64(status.get("volume")) {
            Some(volume) => snapshot.insert("volume", SnapshotValue::Number(volume)),
            None => tracing::debug!(source = %ctx.source, "Speaker status has no volume"),
        }

        if let Some(sources) = status.get("sources").and_then(Value::as_array) {
            let mut sources: Vec<String> = sources
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            sources.sort();
            snapshot.insert("sources", SnapshotValue::List(sources));
        }

        if let Some(source) = status.get("current_source").and_then(Value::as_str) {
            snapshot.insert("current_source", SnapshotValue::Text(source.to_string()));
        }

        let priority = match status.get("current_priority") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0".to_string(),
        };
        snapshot.insert("current_priority", SnapshotValue::Text(priority));

        if state.has_media() {
            for field in ["duration", "position"] {
                if let Some(value) = as_f64(status.get(field)) {
                    snapshot.insert(field, SnapshotValue::Number(value));
                }
            }
        }

        Ok(snapshot)
    }
}
