//! Source registry
//!
//! Holds the named coordinators and device clients built from the
//! configuration. The control API routes requests through it.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::CoordinatorConfig;
use super::health::HealthStatus;
use super::reference::{ReferenceCalculator, ReferenceSource};
use super::refresh::{Coordinator, SourceStatus};
use crate::cache::SnapshotCache;
use crate::config::{Config, SourceConfig, SourceKind};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, HttpFetcher, NeoHubClient, NeoHubFetcher, SpeakerClient};
use crate::parser::{
    CalculatedNormalizer, NeoHubNormalizer, Normalizer, SpeakerNormalizer, TimetableNormalizer,
    WordpressDayListNormalizer, WordpressTodayNormalizer,
};
use crate::utils::join_url;

// ============================================================================
// Registry
// ============================================================================

/// Named coordinators and device clients
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    coordinators: BTreeMap<String, Coordinator>,
    hubs: BTreeMap<String, Arc<NeoHubClient>>,
    speakers: BTreeMap<String, SpeakerClient>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured source
    pub fn from_config(config: &Config) -> Result<Self> {
        let tz = config.timezone()?;
        let general = &config.general;

        let reference: Arc<dyn ReferenceSource> = Arc::new(ReferenceCalculator::new(
            general.reference_url.clone(),
            general.latitude,
            general.longitude,
            general.reference_method,
            tz,
        )?);

        let mut registry = Self::new();
        for source in &config.sources {
            let coordinator_config = CoordinatorConfig::builder(source.name.clone())
                .kind(source.kind.as_str())
                .timezone(tz)
                .retry_delay(config.retry_delay())
                .stale_retry_delay(config.stale_retry_delay())
                .policy(source.wake_policy())
                .build()?;

            let builder = SourceBuilder {
                config,
                source,
                coordinator: coordinator_config,
            };

            let coordinator = match &source.kind {
                SourceKind::Calculated { method } => {
                    let fetcher = ReferenceCalculator::new(
                        general.reference_url.clone(),
                        general.latitude,
                        general.longitude,
                        *method,
                        tz,
                    )?;
                    builder.build(Arc::new(fetcher), CalculatedNormalizer, None)?
                }
                SourceKind::IcciTimetable { url } => {
                    let fetcher = HttpFetcher::with_timeout(url.clone(), config.request_timeout())?;
                    builder.build(Arc::new(fetcher), TimetableNormalizer, Some(&reference))?
                }
                SourceKind::WordpressToday { endpoint, api_path } => {
                    let fetcher = HttpFetcher::with_timeout(
                        join_url(endpoint, api_path),
                        config.request_timeout(),
                    )?;
                    builder.build(Arc::new(fetcher), WordpressTodayNormalizer, Some(&reference))?
                }
                SourceKind::WordpressYear { endpoint, api_path } => {
                    let fetcher = HttpFetcher::with_timeout(
                        join_url(endpoint, api_path),
                        config.request_timeout(),
                    )?;
                    builder.build(Arc::new(fetcher), WordpressDayListNormalizer, None)?
                }
                SourceKind::Neohub { host, port, .. } => {
                    let client = Arc::new(NeoHubClient::new(host.clone(), *port));
                    registry.insert_hub(&source.name, Arc::clone(&client));
                    builder.build(Arc::new(NeoHubFetcher::new(client)), NeoHubNormalizer, None)?
                }
                SourceKind::Speaker { address, .. } => {
                    let client = SpeakerClient::new(address.clone())?;
                    let fetcher = client.status_fetcher();
                    registry.insert_speaker(&source.name, client);
                    builder.build(Arc::new(fetcher), SpeakerNormalizer, None)?
                }
            };

            registry.insert(coordinator)?;
        }

        tracing::info!(sources = registry.len(), "Source registry built");
        Ok(registry)
    }

    /// Register a coordinator under its own name
    pub fn insert(&mut self, coordinator: Coordinator) -> Result<()> {
        let name = coordinator.name().to_string();
        if self.coordinators.contains_key(&name) {
            return Err(Error::config(format!("duplicate source name: {name}")));
        }
        self.coordinators.insert(name, coordinator);
        Ok(())
    }

    /// Register a neoHub client
    pub fn insert_hub(&mut self, name: impl Into<String>, client: Arc<NeoHubClient>) {
        self.hubs.insert(name.into(), client);
    }

    /// Register a speaker client
    pub fn insert_speaker(&mut self, name: impl Into<String>, client: SpeakerClient) {
        self.speakers.insert(name.into(), client);
    }

    /// Coordinator by source name
    pub fn get(&self, name: &str) -> Option<&Coordinator> {
        self.coordinators.get(name)
    }

    /// neoHub client by source name
    pub fn hub(&self, name: &str) -> Option<&Arc<NeoHubClient>> {
        self.hubs.get(name)
    }

    /// Speaker client by source name
    pub fn speaker(&self, name: &str) -> Option<&SpeakerClient> {
        self.speakers.get(name)
    }

    /// Source names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.coordinators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Iterate over coordinators
    pub fn iter(&self) -> impl Iterator<Item = &Coordinator> {
        self.coordinators.values()
    }

    /// Start every coordinator concurrently
    ///
    /// Returns the number that published an initial snapshot. Failed sources
    /// keep retrying on their own.
    pub async fn start_all(&self) -> usize {
        let results = join_all(self.coordinators.values().map(|c| c.start())).await;

        let mut started = 0;
        for (name, result) in self.coordinators.keys().zip(results) {
            match result {
                Ok(snapshot) => {
                    started += 1;
                    tracing::info!(
                        source = %name,
                        origin = snapshot.origin.as_str(),
                        "Initial refresh complete"
                    );
                }
                Err(e) => tracing::warn!(source = %name, error = %e, "Initial refresh failed"),
            }
        }
        started
    }

    /// Cancel every pending wake
    pub fn shutdown_all(&self) {
        for coordinator in self.coordinators.values() {
            coordinator.shutdown();
        }
        tracing::info!(sources = self.len(), "All coordinators stopped");
    }

    /// Status of every source
    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.coordinators.values().map(Coordinator::status).collect()
    }

    /// Overall health
    pub fn health(&self) -> HealthStatus {
        HealthStatus::worst(self.statuses().into_iter().map(|s| s.health))
    }
}

// ============================================================================
// Per-source construction
// ============================================================================

struct SourceBuilder<'a> {
    config: &'a Config,
    source: &'a SourceConfig,
    coordinator: CoordinatorConfig,
}

impl SourceBuilder<'_> {
    fn build(
        self,
        fetcher: Arc<dyn Fetcher>,
        normalizer: impl Normalizer + 'static,
        reference: Option<&Arc<dyn ReferenceSource>>,
    ) -> Result<Coordinator> {
        let key = self.source.cache_key(&self.config.general)?;
        let cache = SnapshotCache::new(&self.config.general.data_dir, &key, normalizer.label());

        tracing::debug!(
            source = %self.source.name,
            kind = self.source.kind.as_str(),
            cache = %cache.path().display(),
            "Building coordinator"
        );

        let mut builder = Coordinator::builder(self.coordinator)
            .shared_fetcher(fetcher)
            .normalizer(normalizer)
            .cache(cache);
        if let Some(reference) = reference {
            builder = builder.reference(Arc::clone(reference));
        }
        builder.build()
    }
}
