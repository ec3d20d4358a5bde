// netval-server/src/routes/configs.rs
// ============================================================================
// Module: Configuration Routes
// Description: Snapshot upload, manual store, and latest fetch.
// Purpose: Persist immutable snapshots and refresh the device sub-model.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! Every accepted configuration becomes an immutable snapshot; parsing runs
//! on a blocking worker and its warnings attach to the response rather than
//! failing it. The device sub-model (interfaces and VLAN database) is
//! replaced from the parse so validation always sees the newest import.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use netval_core::model::ConfigSnapshot;
use netval_core::model::DeviceId;
use netval_core::model::SnapshotSource;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::with_store;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Manual snapshot payload.
#[derive(Debug, Deserialize)]
pub struct ConfigUpload {
    /// Raw configuration text.
    pub content: String,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /devices/{id}/upload-config — multipart upload, parse, snapshot.
pub async fn upload_multipart(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("multipart read failed: {err}")))?
        .ok_or_else(|| ApiError::Validation("multipart body carries no file".to_string()))?;
    let bytes = field
        .bytes()
        .await
        .map_err(|err| ApiError::Validation(format!("multipart read failed: {err}")))?;
    let content = String::from_utf8(bytes.to_vec())
        .map_err(|_| ApiError::Validation("uploaded config is not valid UTF-8".to_string()))?;
    ingest_config(&state, &device_id, content, SnapshotSource::Upload).await
}

/// POST /configs/{device_id} — store raw config as a manual snapshot.
pub async fn store_manual(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
    Json(upload): Json<ConfigUpload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ingest_config(&state, &device_id, upload.content, SnapshotSource::Manual).await
}

/// GET /configs/{device_id}/latest — newest non-pre-push snapshot.
pub async fn latest(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<ConfigSnapshot>, ApiError> {
    let id = device_id.clone();
    let snapshot = with_store(&state, move |store| store.latest_snapshot(&id, false)).await?;
    snapshot.map(Json).ok_or_else(|| {
        ApiError::NotFound(format!("no configuration found for device {device_id}"))
    })
}

// ============================================================================
// SECTION: Shared Flow
// ============================================================================

/// Persists a snapshot, parses it, and replaces the device sub-model.
async fn ingest_config(
    state: &SharedState,
    device_id: &DeviceId,
    content: String,
    source: SnapshotSource,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = device_id.clone();
    let (snapshot, warnings, project_id) = with_store(state, move |store| {
        let device = store.get_device(&id)?;
        let snapshot = store.insert_snapshot(&id, &content, source)?;
        // CPU-heavy parse runs on this worker thread, off the request path.
        let parsed = netval_core::parser::parse_running_config(&content);
        let warnings = parsed.warnings.clone();
        store.replace_device_model(&id, &parsed)?;
        Ok((snapshot, warnings, device.project_id))
    })
    .await?;
    audit(
        state,
        &project_id,
        Some(device_id),
        "config.import",
        format!("imported {} snapshot {}", snapshot.source.as_str(), snapshot.id),
    )
    .await;
    Ok(Json(json!({
        "snapshot": snapshot,
        "warnings": warnings,
    })))
}
