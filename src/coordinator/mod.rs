//! Refresh coordination and the control API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 WaqtServer                    │
//! │                                               │
//! │  ┌────────────────────────────────────────┐  │
//! │  │            SourceRegistry              │  │
//! │  │  name -> Coordinator                   │  │
//! │  │  name -> NeoHubClient / SpeakerClient  │  │
//! │  └────────────────────────────────────────┘  │
//! │                                               │
//! │  ┌────────────────────────────────────────┐  │
//! │  │  Coordinator (one per source)          │  │
//! │  │  Fetcher -> SnapshotCache -> Normalizer│  │
//! │  │  WakePolicy -> Scheduler               │  │
//! │  │  observers + broadcast events          │  │
//! │  └────────────────────────────────────────┘  │
//! │                                               │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        REST API (axum)                 │  │
//! │  │  GET  /api/health                      │  │
//! │  │  GET  /api/sources                     │  │
//! │  │  GET  /api/sources/{name}/snapshot     │  │
//! │  │  POST /api/sources/{name}/refresh      │  │
//! │  │  POST /api/neohub/{name}/command       │  │
//! │  │  POST /api/speaker/{name}/command      │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use waqt::config::Config;
//! use waqt::coordinator::{SourceRegistry, WaqtServer};
//!
//! let config = Config::from_file("waqt.toml".as_ref())?;
//! let registry = SourceRegistry::from_config(&config)?;
//! let server = WaqtServer::new(config.api.clone(), registry)?;
//! server.start_with_shutdown(shutdown).await?;
//! ```

pub mod api;
pub mod config;
pub mod events;
pub mod health;
pub mod reference;
pub mod refresh;
pub mod registry;
pub mod server;

// Re-export main types
pub use config::{ConfigError, CoordinatorConfig};
pub use events::{CoordinatorEvent, SnapshotObserver};
pub use health::{HealthStatus, SourceHealth};
pub use reference::{CalculationMethod, ReferenceCalculator, ReferenceSource};
pub use refresh::{Coordinator, CoordinatorBuilder, RefreshResult, SourceStatus};
pub use registry::SourceRegistry;
pub use server::{AppState, ServerError, WaqtServer};
