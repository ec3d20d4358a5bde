// netval-server/src/routes/mod.rs
// ============================================================================
// Module: HTTP Surface
// Description: Router assembly, shared state, and handler helpers.
// Purpose: Wire the REST contract under /api/v1 and the WebSocket upgrades.
// Dependencies: netval-core, axum, tower-http
// ============================================================================

//! ## Overview
//! The router serves REST under `/api/v1` on the local loopback port with
//! CORS restricted to the UI origins, plus `/health` at the root and
//! WebSocket upgrades under `/ws/*`. Handlers never block: store and vault
//! calls dispatch onto blocking worker threads, and device I/O goes through
//! the SSH pool.

pub mod ai;
pub mod configs;
pub mod devices;
pub mod links;
pub mod projects;
pub mod remediation;
pub mod simulation;
pub mod ssh;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::routing::get;
use axum::routing::post;
use chrono::Utc;
use netval_core::interfaces::CredentialVault;
use netval_core::interfaces::StoreError;
use netval_core::interfaces::TopologyStore;
use netval_core::model::AuditLogEntry;
use netval_core::model::DeviceId;
use netval_core::model::ProjectId;
use netval_ssh::SshPool;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::AiBridge;
use crate::config::Settings;
use crate::error::ApiError;
use crate::jobs::JobManager;
use crate::ws;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Actor recorded on audit entries; the single local user.
pub const LOCAL_ACTOR: &str = "local";

/// Shared application state.
pub struct AppState {
    /// Durable topology store.
    pub store: Arc<dyn TopologyStore>,
    /// Credential vault.
    pub vault: Arc<dyn CredentialVault>,
    /// Bounded SSH worker pool.
    pub ssh: SshPool,
    /// Job lifecycle manager and event multiplexer.
    pub jobs: JobManager,
    /// AI capability bridge.
    pub ai: AiBridge,
    /// Runtime settings.
    pub settings: Settings,
}

/// Shared state alias used by every handler.
pub type SharedState = Arc<AppState>;

// ============================================================================
// SECTION: Handler Helpers
// ============================================================================

/// Runs one store operation on a blocking worker thread.
pub async fn with_store<T, F>(state: &AppState, body: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn TopologyStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || body(store.as_ref()))
        .await
        .map_err(|err| ApiError::Storage(format!("store task failed: {err}")))?
        .map_err(ApiError::from)
}

/// Appends an audit trail entry; persistence failures are logged, not
/// surfaced, so audit writes never fail a completed mutation.
pub async fn audit(
    state: &AppState,
    project: &ProjectId,
    device: Option<&DeviceId>,
    action: &str,
    detail: String,
) {
    let entry = AuditLogEntry {
        id: 0,
        project_id: project.clone(),
        device_id: device.cloned(),
        actor: LOCAL_ACTOR.to_string(),
        action: action.to_string(),
        detail,
        timestamp: Utc::now(),
    };
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || store.append_audit(&entry)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "audit append failed"),
        Err(err) => tracing::warn!(error = %err, "audit task failed"),
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full application router.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    // One parameter name per path position: the router rejects sibling
    // parameters with different names. List routes read `:id` as a project
    // id; detail routes read it as the entity id.
    let api = Router::new()
        .route("/projects", post(projects::create).get(projects::list))
        .route("/projects/:id", get(projects::fetch).delete(projects::remove))
        .route("/projects/:id/devices", post(devices::create))
        .route("/devices/detail/:id", get(devices::fetch))
        .route("/devices/:id", get(devices::list).delete(devices::remove))
        .route("/projects/:id/links", post(links::create))
        .route("/links/:id", get(links::list).delete(links::remove))
        .route("/devices/:id/upload-config", post(configs::upload_multipart))
        .route("/configs/:id", post(configs::store_manual))
        .route("/configs/:id/latest", get(configs::latest))
        .route("/projects/:id/validate", post(simulation::validate))
        .route("/jobs/:id", get(simulation::job_status))
        .route("/projects/:id/generate-cli", post(simulation::generate_cli))
        .route("/devices/:id/ssh-connect", post(ssh::connect_probe))
        .route("/devices/:id/ingest", post(ssh::ingest))
        .route(
            "/devices/:id/credentials",
            post(ssh::store_credentials).delete(ssh::delete_credentials),
        )
        .route("/projects/:id/remediate", post(remediation::build))
        .route("/plans/:id/latest", get(remediation::latest))
        .route("/plans/:id/approve", post(remediation::approve))
        .route("/projects/:id/apply", post(remediation::apply))
        .route("/projects/:id/rollback", post(remediation::rollback))
        .route("/ai/settings", get(ai::get_settings).post(ai::update_settings))
        .route("/ai/models/:provider", get(ai::list_models))
        .route("/ai/test", post(ai::test_connection));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .route("/ws/simulation/:job_id", get(ws::simulation_stream))
        .route("/ws/remediation/:job_id", get(ws::remediation_stream))
        .route("/ws/ingestion/:job_id", get(ws::ingestion_stream))
        .layer(cors_layer(&state.settings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the CORS layer restricted to the local UI origins.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .ui_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

/// Liveness plus AI availability. The AI probe is bounded and its failure
/// never propagates to the response status.
async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let ollama_available = state.ai.ollama_available().await;
    Json(json!({
        "status": "ok",
        "ollama_available": ollama_available,
    }))
}
