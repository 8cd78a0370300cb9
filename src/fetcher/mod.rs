//! Remote source fetchers
//!
//! A fetcher performs exactly one round trip against a configured source and
//! returns the raw bytes it received. Retry policy lives in the coordinator.
//!
//! - [`http`] - JSON over HTTP GET (prayer timetables, WordPress plugin, speaker)
//! - [`neohub`] - JSON over raw TCP (Heatmiser neoHub)
//! - [`speaker`] - command client for the remote speaker HTTP bridge

pub mod http;
pub mod neohub;
pub mod speaker;

use async_trait::async_trait;
use bytes::Bytes;

use crate::utils::error::FetchError;

pub use http::HttpFetcher;
pub use neohub::{NeoHubClient, NeoHubCommand, NeoHubFetcher};
pub use speaker::{SpeakerClient, SpeakerCommand};

/// Opaque payload received from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    bytes: Bytes,
}

impl RawPayload {
    /// Wrap raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Build a payload from a JSON value
    pub fn from_json(value: &serde_json::Value) -> Result<Self, FetchError> {
        serde_json::to_vec(value)
            .map(Self::new)
            .map_err(|e| FetchError::BadPayload(e.to_string()))
    }

    /// Raw bytes as received
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the payload as JSON
    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        serde_json::from_slice(&self.bytes).map_err(|e| FetchError::BadPayload(e.to_string()))
    }
}

/// One network round trip against a remote source
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human readable description of the endpoint (for logs)
    fn describe(&self) -> String;

    /// Fetch the current payload
    async fn fetch(&self) -> Result<RawPayload, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_payload_json() {
        let payload = RawPayload::new(r#"{"timetable":{}}"#);
        assert_eq!(payload.len(), 16);
        assert!(payload.json().unwrap().get("timetable").is_some());
    }

    #[test]
    fn test_raw_payload_bad_json() {
        let payload = RawPayload::new("<html>");
        assert!(matches!(payload.json(), Err(FetchError::BadPayload(_))));
    }
}
