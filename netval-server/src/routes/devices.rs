// netval-server/src/routes/devices.rs
// ============================================================================
// Module: Device Routes
// Description: Device CRUD under a project.
// Purpose: Manage devices and their cascading children.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! The list route takes a project id and the detail route takes a device id
//! under a distinct `/devices/detail/` prefix, keeping the two path shapes
//! unambiguous. Device deletion removes interfaces, VLANs, snapshots, and
//! referencing links in one cascade, then revokes the vault entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::NewDevice;
use netval_core::model::ProjectId;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::with_store;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /projects/{id}/devices — create a device under a project.
pub async fn create(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
    Json(new): Json<NewDevice>,
) -> Result<Json<Device>, ApiError> {
    let project = project_id.clone();
    let device = with_store(&state, move |store| store.create_device(&project, &new)).await?;
    audit(
        &state,
        &project_id,
        Some(&device.id),
        "device.create",
        format!("created device {}", device.hostname),
    )
    .await;
    Ok(Json(device))
}

/// GET /devices/{project_id} — list devices under a project.
pub async fn list(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = with_store(&state, move |store| store.list_devices(&project_id)).await?;
    Ok(Json(devices))
}

/// GET /devices/detail/{device_id} — fetch one device.
pub async fn fetch(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<Device>, ApiError> {
    let device = with_store(&state, move |store| store.get_device(&device_id)).await?;
    Ok(Json(device))
}

/// DELETE /devices/{device_id} — cascade delete and revoke credentials.
pub async fn remove(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = device_id.clone();
    let device = with_store(&state, move |store| store.get_device(&id)).await?;
    let id = device_id.clone();
    let orphaned = with_store(&state, move |store| store.delete_device(&id)).await?;
    if let Some(reference) = orphaned {
        let vault = Arc::clone(&state.vault);
        let revocation = tokio::task::spawn_blocking(move || vault.delete(&reference)).await;
        match revocation {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "credential revocation failed"),
            Err(err) => tracing::warn!(error = %err, "credential revocation task failed"),
        }
    }
    audit(
        &state,
        &device.project_id,
        Some(&device_id),
        "device.delete",
        format!("deleted device {}", device.hostname),
    )
    .await;
    Ok(Json(json!({"status": "success"})))
}
