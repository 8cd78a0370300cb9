//! REST API handlers for the control server
//!
//! Routes:
//!
//! - `GET  /api/health`
//! - `GET  /api/sources`
//! - `GET  /api/sources/{name}/snapshot`
//! - `POST /api/sources/{name}/refresh`
//! - `POST /api/neohub/{name}/command`
//! - `POST /api/speaker/{name}/command`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::Error;
use crate::fetcher::neohub::DEFAULT_CANCEL_HOLD_TEMPERATURE;
use crate::fetcher::{NeoHubCommand, SpeakerCommand};
use crate::models::NormalizedSnapshot;

use super::health::ComponentHealth;
use super::refresh::{Coordinator, SourceStatus};
use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sources: Vec<ComponentHealth>,
}

/// Source list response
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceStatus>,
}

/// Result of a device command
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub source: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<NormalizedSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

fn not_found(what: &str, name: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Unknown {what}: {name}"))
}

fn command_error(err: &Error) -> Response {
    let status = match err {
        Error::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        Error::Fetch(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/sources", get(list_sources))
        .route("/api/sources/{name}/snapshot", get(get_snapshot))
        .route("/api/sources/{name}/refresh", post(refresh_source))
        .route("/api/neohub/{name}/command", post(neohub_command))
        .route("/api/speaker/{name}/command", post(speaker_command))
        .with_state(state)
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Response {
    let statuses = state.registry.statuses();
    let overall = state.registry.health();

    let sources = statuses
        .into_iter()
        .map(|s| ComponentHealth {
            name: s.name,
            status: s.health,
            message: s.stats.last_error,
        })
        .collect();

    let body = HealthResponse {
        status: overall.as_str().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sources,
    };

    (overall.status_code(), Json(ApiResponse::success(body))).into_response()
}

// ============================================================================
// Source Handlers
// ============================================================================

/// List sources with their refresh state
async fn list_sources(State(state): State<AppState>) -> Response {
    Json(ApiResponse::success(SourcesResponse {
        sources: state.registry.statuses(),
    }))
    .into_response()
}

/// Latest snapshot of one source
async fn get_snapshot(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(coordinator) = state.registry.get(&name) else {
        return not_found("source", &name);
    };

    match coordinator.latest() {
        Some(snapshot) => Json(ApiResponse::success(snapshot.as_ref())).into_response(),
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("No snapshot published yet for {name}"),
        ),
    }
}

/// Refresh one source now
async fn refresh_source(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(coordinator) = state.registry.get(&name) else {
        return not_found("source", &name);
    };

    tracing::info!(source = %name, "Refresh requested");
    match coordinator.refresh().await {
        Ok(snapshot) => Json(ApiResponse::success(snapshot.as_ref())).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

// ============================================================================
// Device Handlers
// ============================================================================

/// Send a thermostat command, then refresh the hub source
async fn neohub_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(command): Json<NeoHubCommand>,
) -> Response {
    let (Some(client), Some(coordinator)) = (state.registry.hub(&name), state.registry.get(&name))
    else {
        return not_found("neohub", &name);
    };

    let command = with_hold_temperature(command, coordinator);
    if let Err(e) = client.send_command(&command).await {
        tracing::warn!(source = %name, error = %e, "neoHub command failed");
        return command_error(&e);
    }

    after_command(coordinator, &name, format!("{command:?}")).await
}

/// Send a speaker command, then refresh the speaker source
async fn speaker_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(command): Json<SpeakerCommand>,
) -> Response {
    let (Some(client), Some(coordinator)) =
        (state.registry.speaker(&name), state.registry.get(&name))
    else {
        return not_found("speaker", &name);
    };

    if let Err(e) = client.send_command(&command).await {
        tracing::warn!(source = %name, error = %e, "Speaker command failed");
        return command_error(&e);
    }

    after_command(coordinator, &name, format!("{command:?}")).await
}

/// Cancel-hold resets to the device's current hold temperature
fn with_hold_temperature(command: NeoHubCommand, coordinator: &Coordinator) -> NeoHubCommand {
    match command {
        NeoHubCommand::CancelHold {
            device,
            temperature: None,
        } => {
            let temperature = coordinator
                .latest()
                .and_then(|s| s.number(&format!("{device}.hold_temperature")))
                .unwrap_or(DEFAULT_CANCEL_HOLD_TEMPERATURE);
            NeoHubCommand::CancelHold {
                device,
                temperature: Some(temperature),
            }
        }
        other => other,
    }
}

async fn after_command(coordinator: &Coordinator, name: &str, command: String) -> Response {
    let (snapshot, refresh_error) = match coordinator.refresh().await {
        Ok(snapshot) => (Some(snapshot.as_ref().clone()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Json(ApiResponse::success(CommandResponse {
        source: name.to_string(),
        command,
        snapshot,
        refresh_error,
    }))
    .into_response()
}
