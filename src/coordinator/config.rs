//! Per-source coordinator configuration

use chrono_tz::Tz;
use std::time::Duration;

use crate::scheduler::WakePolicy;

/// Delay before retrying after an unavailable refresh
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Delay before retrying while a stale snapshot is being served
pub const DEFAULT_STALE_RETRY_DELAY: Duration = Duration::from_secs(30 * 60);

/// Configuration for one coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Source name, unique within the service
    pub name: String,

    /// Source kind label (for status output)
    pub kind: String,

    /// Local timezone used to anchor times and compute "today"
    pub timezone: Tz,

    /// Fixed delay of the short retry
    pub retry_delay: Duration,

    /// Retry delay after a payload that could not be normalized
    pub stale_retry_delay: Duration,

    /// How the next wake is chosen after a successful refresh
    pub policy: WakePolicy,
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder(name: impl Into<String>) -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "name".to_string(),
            });
        }

        if self.retry_delay.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "retry_delay".to_string(),
                reason: "Retry delay must be positive".to_string(),
            });
        }

        if self.stale_retry_delay < self.retry_delay {
            return Err(ConfigError::InvalidValue {
                field: "stale_retry_delay".to_string(),
                reason: "Stale retry delay must not be shorter than the retry delay".to_string(),
            });
        }

        self.policy
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "policy".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Builder for CoordinatorConfig
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    name: String,
    kind: Option<String>,
    timezone: Option<Tz>,
    retry_delay: Option<Duration>,
    stale_retry_delay: Option<Duration>,
    policy: Option<WakePolicy>,
}

impl CoordinatorConfigBuilder {
    /// Set source kind label
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set timezone
    pub fn timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    /// Set timezone from an IANA name
    pub fn timezone_str(mut self, tz: &str) -> Result<Self, ConfigError> {
        self.timezone = Some(tz.parse().map_err(|_| ConfigError::InvalidValue {
            field: "timezone".to_string(),
            reason: format!("Unknown timezone: {}", tz),
        })?);
        Ok(self)
    }

    /// Set retry delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set the retry delay used while serving a stale snapshot
    pub fn stale_retry_delay(mut self, delay: Duration) -> Self {
        self.stale_retry_delay = Some(delay);
        self
    }

    /// Set wake policy
    pub fn policy(mut self, policy: WakePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let config = CoordinatorConfig {
            name: self.name,
            kind: self.kind.unwrap_or_else(|| "custom".to_string()),
            timezone: self.timezone.unwrap_or(chrono_tz::UTC),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            stale_retry_delay: self.stale_retry_delay.unwrap_or(DEFAULT_STALE_RETRY_DELAY),
            policy: self.policy.unwrap_or(WakePolicy::CalculatedMidnight),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
    MissingField { field: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            Self::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
