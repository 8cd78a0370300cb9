//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Wake instant could not be computed (e.g. local midnight does not exist)
    InvalidInstant {
        reason: String,
    },

    /// Wake policy configuration error
    PolicyConfigError {
        field: String,
        reason: String,
    },

    /// Invalid timezone
    InvalidTimezone {
        tz: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInstant { reason } => {
                write!(f, "Invalid wake instant: {}", reason)
            }
            Self::PolicyConfigError { field, reason } => {
                write!(f, "Wake policy config error in '{}': {}", field, reason)
            }
            Self::InvalidTimezone { tz } => {
                write!(f, "Invalid timezone: {}", tz)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid instant error
    pub fn invalid_instant(reason: impl Into<String>) -> Self {
        Self::InvalidInstant {
            reason: reason.into(),
        }
    }

    /// Create a policy config error
    pub fn policy_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidInstant { .. })
    }
}
