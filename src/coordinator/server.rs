//! Control API server
//!
//! Owns the source registry, starts every coordinator and serves the REST
//! API until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;

use super::api::create_router;
use super::registry::SourceRegistry;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Named coordinators and device clients
    pub registry: Arc<SourceRegistry>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Control API server
pub struct WaqtServer {
    config: ApiConfig,
    bind_address: SocketAddr,
    state: AppState,
}

impl WaqtServer {
    /// Create a server over a built registry
    pub fn new(config: ApiConfig, registry: SourceRegistry) -> Result<Self, ServerError> {
        let bind_address = config
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ServerError::ConfigError(format!("bind_address: {e}")))?;

        Ok(Self {
            config,
            bind_address,
            state: AppState::new(registry),
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start coordinators and serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        let registry = Arc::clone(&self.state.registry);
        let started = registry.start_all().await;
        tracing::info!(
            started,
            total = registry.len(),
            "Starting control API on {}",
            addr
        );

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()));

        registry.shutdown_all();
        tracing::info!("Server shutdown complete");
        result
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.bind_address,
            sources: self.state.registry.len(),
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub sources: usize,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Server errors
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error during operation
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::BindError(msg) => write!(f, "Failed to bind: {msg}"),
            Self::ServeError(msg) => write!(f, "Server error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = WaqtServer::new(ApiConfig::default(), SourceRegistry::new()).unwrap();
        let info = server.info();

        assert_eq!(info.bind_address.port(), 8080);
        assert_eq!(info.sources, 0);
        assert!(info.cors_enabled);
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ApiConfig {
            bind_address: "not-an-address".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            WaqtServer::new(config, SourceRegistry::new()),
            Err(ServerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::BindError("address in use".to_string());
        assert_eq!(err.to_string(), "Failed to bind: address in use");
    }
}
