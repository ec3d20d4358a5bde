// netval-server/src/routes/ssh.rs
// ============================================================================
// Module: SSH Routes
// Description: Liveness probe, ingestion jobs, and credential management.
// Purpose: Gate all device I/O behind the pool and the vault.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! SSH failures never surface as HTTP errors: the probe reports them in its
//! response body and ingestion reports them in the job result, with the
//! underlying error class preserved. Credential material moves only between
//! the request body and the vault, never into the store, the logs, or any
//! response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use netval_core::interfaces::CredentialMaterial;
use netval_core::interfaces::SshTarget;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::JobId;
use netval_core::model::JobKind;
use netval_core::model::JobStatus;
use netval_core::model::SnapshotSource;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::with_store;

// ============================================================================
// SECTION: Target Resolution
// ============================================================================

/// Resolves a device into an SSH target by loading its vault material.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] when the device has no management IP or
/// no stored credentials.
pub(crate) async fn resolve_target(
    state: &SharedState,
    device: &Device,
) -> Result<SshTarget, ApiError> {
    let host = device
        .management_ip
        .clone()
        .ok_or_else(|| ApiError::Validation(format!("device {} has no management IP", device.id)))?;
    let reference = device.credential_ref.clone().ok_or_else(|| {
        ApiError::Validation(format!("device {} has no stored credentials", device.id))
    })?;
    let vault = Arc::clone(&state.vault);
    let material = tokio::task::spawn_blocking(move || vault.load(&reference))
        .await
        .map_err(|err| ApiError::Storage(format!("vault task failed: {err}")))??;
    Ok(SshTarget {
        host,
        port: 22,
        material,
    })
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /devices/{id}/ssh-connect — liveness probe over SSH.
pub async fn connect_probe(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = device_id.clone();
    let device = with_store(&state, move |store| store.get_device(&id)).await?;
    let target = resolve_target(&state, &device).await?;
    match state.ssh.probe(target).await {
        Ok(banner) => Ok(Json(json!({"success": true, "message": banner}))),
        Err(err) => Ok(Json(json!({
            "success": false,
            "message": err.to_string(),
            "error": err,
        }))),
    }
}

/// POST /devices/{id}/ingest — pull configuration via SSH as a job.
pub async fn ingest(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = device_id.clone();
    let device = with_store(&state, move |store| store.get_device(&id)).await?;
    let project = device.project_id.clone();
    let job = with_store(&state, move |store| store.create_job(&project, JobKind::Ingestion))
        .await?;
    let job_id = job.id.clone();
    tokio::spawn(run_ingest(Arc::clone(&state), device, job_id));
    Ok(Json(json!({"job_id": job.id})))
}

/// POST /devices/{id}/credentials — store material in the vault.
pub async fn store_credentials(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
    Json(material): Json<CredentialMaterial>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if material.username.trim().is_empty() {
        return Err(ApiError::Validation("credential username must not be empty".to_string()));
    }
    let id = device_id.clone();
    let device = with_store(&state, move |store| store.get_device(&id)).await?;

    let vault = Arc::clone(&state.vault);
    let project = device.project_id.clone();
    let id = device_id.clone();
    let reference = tokio::task::spawn_blocking(move || vault.store(&project, &id, &material))
        .await
        .map_err(|err| ApiError::Storage(format!("vault task failed: {err}")))??;

    // Revoke any previous entry once the new one is in place.
    if let Some(previous) = device.credential_ref.clone() {
        let vault = Arc::clone(&state.vault);
        let revocation = tokio::task::spawn_blocking(move || vault.delete(&previous)).await;
        if !matches!(revocation, Ok(Ok(()))) {
            tracing::warn!(device = %device_id, "previous credential revocation failed");
        }
    }
    let id = device_id.clone();
    let stored = reference.clone();
    with_store(&state, move |store| store.set_device_credential(&id, Some(&stored))).await?;
    audit(
        &state,
        &device.project_id,
        Some(&device_id),
        "credentials.store",
        "stored device credentials".to_string(),
    )
    .await;
    Ok(Json(json!({"status": "stored"})))
}

/// DELETE /devices/{id}/credentials — revoke the vault entry.
pub async fn delete_credentials(
    State(state): State<SharedState>,
    Path(device_id): Path<DeviceId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = device_id.clone();
    let device = with_store(&state, move |store| store.get_device(&id)).await?;
    if let Some(reference) = device.credential_ref.clone() {
        let vault = Arc::clone(&state.vault);
        tokio::task::spawn_blocking(move || vault.delete(&reference))
            .await
            .map_err(|err| ApiError::Storage(format!("vault task failed: {err}")))??;
        let id = device_id.clone();
        with_store(&state, move |store| store.set_device_credential(&id, None)).await?;
    }
    audit(
        &state,
        &device.project_id,
        Some(&device_id),
        "credentials.delete",
        "revoked device credentials".to_string(),
    )
    .await;
    Ok(Json(json!({"status": "deleted"})))
}

// ============================================================================
// SECTION: Ingestion Task
// ============================================================================

/// Background body of one ingestion job.
async fn run_ingest(state: SharedState, device: Device, job_id: JobId) {
    let store = Arc::clone(&state.store);
    let id = job_id.clone();
    let started = tokio::task::spawn_blocking(move || store.start_job(&id)).await;
    if !matches!(started, Ok(Ok(()))) {
        state
            .jobs
            .finish(&job_id, JobStatus::Failed, json!({"error": "job could not be started"}))
            .await;
        return;
    }

    let target = match resolve_target(&state, &device).await {
        Ok(target) => target,
        Err(err) => {
            state
                .jobs
                .finish(&job_id, JobStatus::Failed, json!({"error": err.to_string()}))
                .await;
            return;
        }
    };
    let outputs = match state.ssh.ingest(target).await {
        Ok(outputs) => outputs,
        Err(err) => {
            state.jobs.finish(&job_id, JobStatus::Failed, json!({"error": err})).await;
            return;
        }
    };

    let running_config =
        outputs.get("show running-config").cloned().unwrap_or_default();
    let store = Arc::clone(&state.store);
    let device_id = device.id.clone();
    let persisted = tokio::task::spawn_blocking(move || {
        let snapshot = store.insert_snapshot(&device_id, &running_config, SnapshotSource::Ssh)?;
        let parsed = netval_core::parser::parse_running_config(&running_config);
        let warnings = parsed.warnings.len();
        store.replace_device_model(&device_id, &parsed)?;
        Ok::<_, netval_core::interfaces::StoreError>((snapshot, warnings))
    })
    .await;

    match persisted {
        Ok(Ok((snapshot, warnings))) => {
            audit(
                &state,
                &device.project_id,
                Some(&device.id),
                "config.ingest",
                format!("pulled snapshot {} over ssh", snapshot.id),
            )
            .await;
            state
                .jobs
                .finish(
                    &job_id,
                    JobStatus::Complete,
                    json!({
                        "outputs": outputs,
                        "snapshot_id": snapshot.id,
                        "config_hash": snapshot.config_hash,
                        "warnings": warnings,
                    }),
                )
                .await;
        }
        Ok(Err(err)) => {
            state
                .jobs
                .finish(&job_id, JobStatus::Failed, json!({"error": err.to_string()}))
                .await;
        }
        Err(err) => {
            state
                .jobs
                .finish(&job_id, JobStatus::Failed, json!({"error": err.to_string()}))
                .await;
        }
    }
}
