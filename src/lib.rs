//! waqt - scheduled-refresh coordinators for prayer times and home devices
//!
//! Polls remote sources on a computed schedule, caches the last good payload
//! and falls back to it when a source is down.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`fetcher`] - HTTP and neoHub TCP clients producing raw payloads
//! - [`cache`] - One file-backed payload record per source
//! - [`parser`] - Source-specific normalizers and the DST offset fix
//! - [`models`] - Normalized snapshot types
//! - [`scheduler`] - One-shot wake timer and wake policies
//! - [`coordinator`] - Refresh orchestration, registry and control API
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use waqt::config::Config;
//! use waqt::coordinator::SourceRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let registry = SourceRegistry::from_config(&config)?;
//!     registry.start_all().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod scheduler;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, SourceConfig, SourceKind};
    pub use crate::coordinator::{Coordinator, CoordinatorConfig, CoordinatorEvent, SourceRegistry};
    pub use crate::error::{Error, ErrorCategory, Result, WaqtErrorTrait};
    pub use crate::fetcher::{Fetcher, RawPayload};
    pub use crate::models::{NormalizedSnapshot, SnapshotOrigin, SnapshotValue};
    pub use crate::parser::{NormalizeContext, Normalizer};
    pub use crate::scheduler::{Scheduler, WakePolicy};
}

// Direct re-exports for convenience
pub use models::{NormalizedSnapshot, SnapshotOrigin, SnapshotValue};
