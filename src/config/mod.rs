//! Configuration management for waqt
//!
//! This module handles loading and validating configuration from a TOML file
//! or environment variables.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::reference::{CalculationMethod, DEFAULT_REFERENCE_URL};
use crate::fetcher::neohub::DEFAULT_NEOHUB_PORT;
use crate::scheduler::WakePolicy;
use crate::utils::{extract_domain, sanitize_filename};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location, storage and refresh settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Control API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Configured sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Settings shared by all sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding one cache file per source
    pub data_dir: PathBuf,

    /// IANA timezone name
    pub timezone: String,

    /// Latitude used for calculated times
    pub latitude: f64,

    /// Longitude used for calculated times
    pub longitude: f64,

    /// Short retry delay in seconds
    pub retry_delay_secs: u64,

    /// Retry delay in seconds while a stale snapshot is served
    pub stale_retry_delay_secs: u64,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Calculation API base URL
    pub reference_url: String,

    /// Calculation method for reference times
    pub reference_method: CalculationMethod,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            timezone: "Europe/Dublin".to_string(),
            latitude: 53.3498,
            longitude: -6.2603,
            retry_delay_secs: 60,
            stale_retry_delay_secs: 30 * 60,
            request_timeout_secs: 10,
            reference_url: DEFAULT_REFERENCE_URL.to_string(),
            reference_method: CalculationMethod::Isna,
        }
    }
}

/// Control API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind
    pub bind_address: String,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Log every request
    pub enable_request_logging: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// One configured source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source name
    pub name: String,

    /// Source kind and its settings
    #[serde(flatten)]
    pub kind: SourceKind,

    /// Wake policy override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake: Option<WakePolicy>,
}

/// Source kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Standard calculated prayer times
    Calculated {
        #[serde(default)]
        method: CalculationMethod,
    },

    /// Month/day timetable with DST correction
    IcciTimetable {
        #[serde(default = "default_icci_url")]
        url: String,
    },

    /// WordPress plugin, today's record
    WordpressToday {
        endpoint: String,
        #[serde(default = "default_wordpress_today_path")]
        api_path: String,
    },

    /// WordPress plugin, full year list
    WordpressYear {
        endpoint: String,
        #[serde(default = "default_wordpress_year_path")]
        api_path: String,
    },

    /// neoHub thermostat hub
    Neohub {
        host: String,
        #[serde(default = "default_neohub_port")]
        port: u16,
        #[serde(default = "default_neohub_interval")]
        interval_secs: u64,
    },

    /// Remote speaker
    Speaker {
        address: String,
        #[serde(default = "default_speaker_interval")]
        interval_secs: u64,
    },
}

fn default_icci_url() -> String {
    "https://islamireland.ie/api/timetable/".to_string()
}

fn default_wordpress_today_path() -> String {
    "wp-json/dpt/v1/prayertime?filter=today".to_string()
}

fn default_wordpress_year_path() -> String {
    "wp-json/dpt/v1/prayertime?filter=year".to_string()
}

fn default_neohub_port() -> u16 {
    DEFAULT_NEOHUB_PORT
}

fn default_neohub_interval() -> u64 {
    30
}

fn default_speaker_interval() -> u64 {
    10
}

impl SourceKind {
    /// Kind label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculated { .. } => "calculated",
            Self::IcciTimetable { .. } => "icci_timetable",
            Self::WordpressToday { .. } => "wordpress_today",
            Self::WordpressYear { .. } => "wordpress_year",
            Self::Neohub { .. } => "neohub",
            Self::Speaker { .. } => "speaker",
        }
    }

    /// Wake policy used when none is configured
    pub fn default_wake(&self) -> WakePolicy {
        match self {
            Self::Calculated { .. } | Self::IcciTimetable { .. } | Self::WordpressToday { .. } => {
                WakePolicy::CalculatedMidnight
            }
            Self::WordpressYear { .. } => WakePolicy::after_midnight(),
            Self::Neohub { interval_secs, .. } | Self::Speaker { interval_secs, .. } => {
                WakePolicy::Interval {
                    secs: *interval_secs,
                }
            }
        }
    }
}

impl SourceConfig {
    /// Effective wake policy
    pub fn wake_policy(&self) -> WakePolicy {
        self.wake.clone().unwrap_or_else(|| self.kind.default_wake())
    }

    /// Key naming this source's cache file: source name plus remote host
    ///
    /// The name keeps sources sharing a host (two calculation methods, two
    /// speakers on one address) from reading each other's record.
    pub fn cache_key(&self, general: &GeneralConfig) -> Result<String> {
        let host = match &self.kind {
            SourceKind::Calculated { .. } => extract_domain(&general.reference_url),
            SourceKind::IcciTimetable { url } => extract_domain(url),
            SourceKind::WordpressToday { endpoint, .. }
            | SourceKind::WordpressYear { endpoint, .. } => extract_domain(endpoint),
            SourceKind::Neohub { host, .. } => Ok(host.clone()),
            SourceKind::Speaker { address, .. } => extract_domain(address),
        }
        .with_context(|| format!("Source '{}' has no usable host", self.name))?;

        Ok(format!("{}-{host}", self.name))
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Sources cannot be described through the environment; a single
    /// calculated source is configured.
    pub fn from_env() -> Result<Self> {
        let defaults = GeneralConfig::default();

        let data_dir = std::env::var("WAQT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let timezone = std::env::var("WAQT_TIMEZONE").unwrap_or(defaults.timezone);

        let latitude = std::env::var("WAQT_LATITUDE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults.latitude);

        let longitude = std::env::var("WAQT_LONGITUDE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults.longitude);

        let retry_delay_secs = std::env::var("WAQT_RETRY_DELAY")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.retry_delay_secs);

        let stale_retry_delay_secs = std::env::var("WAQT_STALE_RETRY_DELAY")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.stale_retry_delay_secs);

        let request_timeout_secs = std::env::var("WAQT_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let reference_url =
            std::env::var("WAQT_REFERENCE_URL").unwrap_or(defaults.reference_url);

        let bind_address = std::env::var("WAQT_BIND_ADDRESS")
            .unwrap_or_else(|_| String::from("127.0.0.1:8080"));

        let log_level = std::env::var("WAQT_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format = std::env::var("WAQT_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let config = Self {
            general: GeneralConfig {
                data_dir,
                timezone,
                latitude,
                longitude,
                retry_delay_secs,
                stale_retry_delay_secs,
                request_timeout_secs,
                reference_url,
                reference_method: defaults.reference_method,
            },
            api: ApiConfig {
                bind_address,
                ..ApiConfig::default()
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
            sources: vec![default_source()],
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;

        if !(-90.0..=90.0).contains(&self.general.latitude) {
            anyhow::bail!("latitude must be between -90 and 90");
        }

        if !(-180.0..=180.0).contains(&self.general.longitude) {
            anyhow::bail!("longitude must be between -180 and 180");
        }

        if self.general.retry_delay_secs == 0 {
            anyhow::bail!("retry_delay_secs must be greater than 0");
        }

        if self.general.stale_retry_delay_secs < self.general.retry_delay_secs {
            anyhow::bail!("stale_retry_delay_secs must not be shorter than retry_delay_secs");
        }

        if self.general.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging format must be 'text' or 'json'");
        }

        let mut names = HashSet::new();
        let mut cache_files = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                anyhow::bail!("source name must not be empty");
            }
            if !names.insert(source.name.as_str()) {
                anyhow::bail!("duplicate source name: {}", source.name);
            }
            source
                .wake_policy()
                .validate()
                .with_context(|| format!("Invalid wake policy for source '{}'", source.name))?;
            let cache_file = sanitize_filename(&source.cache_key(&self.general)?);
            if !cache_files.insert(cache_file.clone()) {
                anyhow::bail!(
                    "source '{}' would share cache file '{cache_file}' with another source",
                    source.name
                );
            }
        }

        Ok(())
    }

    /// Parsed timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.general
            .timezone
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("Unknown timezone: {}", self.general.timezone))
    }

    /// Get retry delay as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.general.retry_delay_secs)
    }

    /// Get the retry delay used while serving a stale snapshot
    pub fn stale_retry_delay(&self) -> Duration {
        Duration::from_secs(self.general.stale_retry_delay_secs)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_secs)
    }

    /// Find a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

fn default_source() -> SourceConfig {
    SourceConfig {
        name: "prayer_times".to_string(),
        kind: SourceKind::Calculated {
            method: CalculationMethod::Isna,
        },
        wake: None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            sources: vec![default_source()],
        }
    }
}
