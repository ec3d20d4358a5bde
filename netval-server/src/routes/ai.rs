// netval-server/src/routes/ai.rs
// ============================================================================
// Module: AI Routes
// Description: AI bridge settings, model catalogs, and connectivity tests.
// Purpose: Expose the capability flag surface to the UI.
// Dependencies: crate::routes, axum
// ============================================================================

//! ## Overview
//! The AI routes never gate any other functionality: an unreachable provider
//! surfaces as `success: false` or an empty catalog, not as an HTTP error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::config::AiSettings;
use crate::routes::SharedState;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Connection test request.
#[derive(Debug, Deserialize)]
pub struct AiTestRequest {
    /// Provider keyword.
    pub provider: String,
    /// Optional base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Optional API key.
    #[serde(default)]
    pub api_key: Option<String>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// GET /ai/settings — current provider settings.
pub async fn get_settings(State(state): State<SharedState>) -> Json<AiSettings> {
    Json(state.ai.settings())
}

/// POST /ai/settings — replace provider settings in memory.
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(settings): Json<AiSettings>,
) -> Json<AiSettings> {
    state.ai.update_settings(settings.clone());
    Json(settings)
}

/// GET /ai/models/{provider} — model catalog for a provider.
pub async fn list_models(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
) -> Json<serde_json::Value> {
    let models = state.ai.models(&provider).await;
    Json(json!({"models": models}))
}

/// POST /ai/test — test connectivity to a provider.
pub async fn test_connection(
    State(state): State<SharedState>,
    Json(request): Json<AiTestRequest>,
) -> Json<serde_json::Value> {
    let (success, message) = state
        .ai
        .test_connection(&request.provider, request.base_url.as_deref(), request.api_key.as_deref())
        .await;
    Json(json!({"success": success, "message": message}))
}
