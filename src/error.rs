//! Unified error handling for the waqt crate
//!
//! Each stage of the pipeline has its own error enum (see
//! [`crate::utils::error`] and [`crate::scheduler::error`]). This module
//! wraps them in a single [`Error`] for use across module boundaries.
//!
//! # Architecture
//!
//! - [`WaqtErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use waqt::error::{Error, WaqtErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!("Retrying: {}", err.summary());
//!     } else {
//!         tracing::error!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{CacheError, CoordinatorError, FetchError, ParseError};

/// Common trait for all waqt error types
pub trait WaqtErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later retry may succeed)
    fn is_recoverable(&self) -> bool;

    /// Short user-facing description
    fn summary(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, TCP, timeout)
    Network,
    /// Payload decoding and normalization errors
    Parsing,
    /// Cache file and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Source unavailable after all fallbacks
    Unavailable,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Human readable category name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "parse error",
            Self::Storage => "storage error",
            Self::Config => "configuration error",
            Self::Scheduler => "scheduler error",
            Self::Unavailable => "source unavailable",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the waqt crate
#[derive(Error, Debug)]
pub enum Error {
    /// Remote source errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Normalization errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Snapshot cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Coordinator refresh errors
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Device command rejected before sending
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Unknown source or device name
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl WaqtErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(_) => false,
            Self::Cache(e) => !matches!(e, CacheError::NotFound(_)),
            Self::Coordinator(_) => true, // retried on the short delay
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::InvalidCommand(_) => false,
            Self::NotFound(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Other { context, .. } => context.clone(),
            other => format!("{}: {other}", other.category().as_str()),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Cache(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Coordinator(_) => ErrorCategory::Unavailable,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Config(_) | Self::InvalidCommand(_) => ErrorCategory::Config,
            Self::NotFound(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid command error
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Unreachable("timeout".into()));
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let parse_err = Error::Parse(ParseError::NoMatch("2024-03-01".into()));
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);

        let err = Error::Coordinator(CoordinatorError::unavailable("hicc", "no cache"));
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }

    #[test]
    fn test_is_recoverable() {
        let fetch_err = Error::Fetch(FetchError::Unreachable("refused".into()));
        assert!(fetch_err.is_recoverable());

        let parse_err = Error::Parse(ParseError::field("timetable", "missing"));
        assert!(!parse_err.is_recoverable());

        let cache_err = Error::Cache(CacheError::NotFound("/tmp/x.json".into()));
        assert!(!cache_err.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = FetchError::BadStatus(502).into();
        assert!(matches!(unified, Error::Fetch(FetchError::BadStatus(502))));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("unknown timezone");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
        assert_eq!(err.summary(), "configuration error: Config error: unknown timezone");
    }

    #[test]
    fn test_invalid_command() {
        let err = Error::invalid_command("volume 1.3 outside 0.0-1.0");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("1.3"));
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.summary(), "Something went wrong");
    }
}
