//! Error types for the refresh pipeline
//!
//! Every stage of a refresh (fetch, cache, normalize, coordinate) has its own
//! error enum so the coordinator can pick a fallback per failure kind.

use thiserror::Error;

/// Errors that can occur while talking to a remote source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, DNS failure or timeout
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-2xx status code
    #[error("Unexpected status code: {0}")]
    BadStatus(u16),

    /// The body could not be decoded
    #[error("Malformed payload: {0}")]
    BadPayload(String),
}

impl FetchError {
    /// Map a reqwest error onto the fetch taxonomy
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::BadStatus(status.as_u16());
        }
        if err.is_decode() || err.is_body() {
            return Self::BadPayload(err.to_string());
        }
        Self::Unreachable(err.to_string())
    }

    /// Check if retrying later might succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::BadStatus(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            Self::BadPayload(_) => false,
        }
    }
}

/// Errors that can occur while normalizing a payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing usable for today was found in the payload
    #[error("No usable entry for {0}")]
    NoMatch(String),

    /// The payload does not have the expected shape
    #[error("Invalid field '{field}': {reason}")]
    FieldError { field: String, reason: String },
}

impl ParseError {
    /// Create a field error
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FieldError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur in the snapshot cache
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No cache record exists for this source
    #[error("No cached payload at {0}")]
    NotFound(String),

    /// The record could not be written
    #[error("Failed to write cache {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// The record exists but could not be read
    #[error("Failed to read cache {path}: {reason}")]
    ReadFailed { path: String, reason: String },
}

/// Errors surfaced by a coordinator refresh
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Neither the source nor any fallback produced a snapshot
    #[error("Source '{source_name}' unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
}

impl CoordinatorError {
    /// Create an unavailable error
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}
