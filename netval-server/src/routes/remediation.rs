// netval-server/src/routes/remediation.rs
// ============================================================================
// Module: Remediation Routes
// Description: Plan building, approval, application, and rollback.
// Purpose: Drive the plan lifecycle with confirmation-gated pushes.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! Apply and rollback are the two destructive operations: both demand
//! `confirm: true` and fail with HTTP 409 before any session opens or any
//! snapshot is written. Every device push captures a `pre_push` snapshot
//! first. A device failure does not stop the remaining devices; the plan
//! ends `failed` with per-device status inside the job result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use chrono::Duration;
use chrono::Utc;
use netval_core::checks::AuditResult;
use netval_core::interfaces::StoreError;
use netval_core::model::DeviceId;
use netval_core::model::JobId;
use netval_core::model::JobKind;
use netval_core::model::JobStatus;
use netval_core::model::PlanId;
use netval_core::model::PlanStatus;
use netval_core::model::ProjectId;
use netval_core::model::RemediationPlan;
use netval_core::model::SnapshotSource;
use netval_core::remediation::build_plan;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::jobs::JobEvent;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::ssh::resolve_target;
use crate::routes::with_store;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// One item approval toggle.
#[derive(Debug, Deserialize)]
pub struct ItemApproval {
    /// Item index within the plan.
    pub index: usize,
    /// New approval value.
    pub approved: bool,
}

/// Approval request body.
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    /// Item toggles applied in order.
    #[serde(default)]
    pub items: Vec<ItemApproval>,
}

/// Confirmation gate for destructive operations.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Must be true for the operation to proceed.
    #[serde(default)]
    pub confirm: bool,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /projects/{id}/remediate — build a plan from the latest audit.
pub async fn build(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<RemediationPlan>, ApiError> {
    let project = project_id.clone();
    let plan = with_store(&state, move |store| {
        let job = store.latest_complete_simulation(&project)?.ok_or_else(|| {
            StoreError::Constraint("no completed validation exists for this project".to_string())
        })?;
        let result = job.result.ok_or_else(|| {
            StoreError::Invalid("completed simulation job carries no result".to_string())
        })?;
        let audit: AuditResult = serde_json::from_value(result).map_err(|err| {
            StoreError::Invalid(format!("stored audit result does not decode: {err}"))
        })?;
        let plan = build_plan(&project, &audit, Utc::now());
        store.save_plan(&plan)?;
        Ok(plan)
    })
    .await?;
    audit(
        &state,
        &project_id,
        None,
        "plan.create",
        format!("built plan {} with {} items", plan.id, plan.items.len()),
    )
    .await;
    Ok(Json(plan))
}

/// GET /plans/{project_id}/latest — newest plan under a project.
pub async fn latest(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<RemediationPlan>, ApiError> {
    let project = project_id.clone();
    let plan = with_store(&state, move |store| store.latest_plan(&project)).await?;
    plan.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no plan exists for project {project_id}")))
}

/// POST /plans/{plan_id}/approve — toggle item approvals and approve.
pub async fn approve(
    State(state): State<SharedState>,
    Path(plan_id): Path<PlanId>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<RemediationPlan>, ApiError> {
    let plan = with_store(&state, move |store| {
        let mut plan = store.get_plan(&plan_id)?;
        for toggle in &request.items {
            plan.set_item_approval(toggle.index, toggle.approved)
                .map_err(|err| StoreError::Constraint(err.to_string()))?;
        }
        if plan.status == PlanStatus::Pending {
            plan.approve().map_err(|err| StoreError::Constraint(err.to_string()))?;
        }
        store.update_plan(&plan)?;
        Ok(plan)
    })
    .await?;
    Ok(Json(plan))
}

/// POST /projects/{id}/apply — execute the approved plan; requires confirm.
pub async fn apply(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
    request: Option<Json<ConfirmRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let confirmed = request.is_some_and(|Json(body)| body.confirm);
    if !confirmed {
        return Err(ApiError::ConfirmationRequired(
            "plan application requires confirm: true".to_string(),
        ));
    }
    let project = project_id.clone();
    let plan = with_store(&state, move |store| {
        let mut plan = store.latest_plan(&project)?.ok_or_else(|| {
            StoreError::Constraint("no plan exists for this project".to_string())
        })?;
        plan.begin_apply().map_err(|err| StoreError::Constraint(err.to_string()))?;
        store.update_plan(&plan)?;
        Ok(plan)
    })
    .await?;
    let project = project_id.clone();
    let job = with_store(&state, move |store| store.create_job(&project, JobKind::Remediation))
        .await?;
    audit(&state, &project_id, None, "plan.apply", format!("applying plan {}", plan.id)).await;
    let job_id = job.id.clone();
    tokio::spawn(run_apply(Arc::clone(&state), plan, job_id));
    Ok(Json(json!({"job_id": job.id})))
}

/// POST /projects/{id}/rollback — reverse an applied plan; requires confirm.
pub async fn rollback(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
    request: Option<Json<ConfirmRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let confirmed = request.is_some_and(|Json(body)| body.confirm);
    if !confirmed {
        return Err(ApiError::ConfirmationRequired(
            "plan rollback requires confirm: true".to_string(),
        ));
    }
    let retention = Duration::hours(state.settings.plan_retention_hours);
    let project = project_id.clone();
    let plan = with_store(&state, move |store| {
        let plan = store.latest_plan(&project)?.ok_or_else(|| {
            StoreError::Constraint("no plan exists for this project".to_string())
        })?;
        // Eligibility dry-run; the transition persists only after the pushes.
        let mut probe = plan.clone();
        probe
            .roll_back(Utc::now(), retention)
            .map_err(|err| StoreError::Constraint(err.to_string()))?;
        Ok(plan)
    })
    .await?;
    let project = project_id.clone();
    let job = with_store(&state, move |store| store.create_job(&project, JobKind::Remediation))
        .await?;
    audit(&state, &project_id, None, "plan.rollback", format!("rolling back plan {}", plan.id))
        .await;
    let job_id = job.id.clone();
    tokio::spawn(run_rollback(Arc::clone(&state), plan, retention, job_id));
    Ok(Json(json!({"job_id": job.id})))
}

// ============================================================================
// SECTION: Push Tasks
// ============================================================================

/// Owned per-device work list.
type DeviceLines = Vec<(DeviceId, Vec<String>)>;

/// Background body of one plan application.
async fn run_apply(state: SharedState, mut plan: RemediationPlan, job_id: JobId) {
    if !start_job(&state, &job_id).await {
        return;
    }
    let groups: DeviceLines = plan
        .approved_by_device()
        .into_iter()
        .map(|(device, items)| {
            (device, items.into_iter().map(|item| item.cli_patch.clone()).collect())
        })
        .collect();

    let (all_ok, devices) = push_groups(&state, &job_id, groups).await;
    if plan.finish_apply(all_ok, Utc::now()).is_err() {
        tracing::warn!(plan = %plan.id, "plan left applying state unexpectedly");
    }
    persist_plan(&state, &plan).await;
    let status = if all_ok { JobStatus::Complete } else { JobStatus::Failed };
    state
        .jobs
        .finish(
            &job_id,
            status,
            json!({
                "plan_id": plan.id,
                "plan_status": plan.status,
                "devices": devices,
            }),
        )
        .await;
}

/// Background body of one plan rollback. Devices push in reverse apply
/// order; the plan transitions only when every device succeeded.
async fn run_rollback(
    state: SharedState,
    mut plan: RemediationPlan,
    retention: Duration,
    job_id: JobId,
) {
    if !start_job(&state, &job_id).await {
        return;
    }
    let mut groups: DeviceLines = plan
        .approved_by_device()
        .into_iter()
        .map(|(device, items)| {
            (device, items.iter().rev().map(|item| item.rollback_cli.clone()).collect())
        })
        .collect();
    groups.reverse();

    let (all_ok, devices) = push_groups(&state, &job_id, groups).await;
    if all_ok {
        if plan.roll_back(Utc::now(), retention).is_err() {
            tracing::warn!(plan = %plan.id, "plan left applied state unexpectedly");
        }
        persist_plan(&state, &plan).await;
    }
    let status = if all_ok { JobStatus::Complete } else { JobStatus::Failed };
    state
        .jobs
        .finish(
            &job_id,
            status,
            json!({
                "plan_id": plan.id,
                "plan_status": plan.status,
                "devices": devices,
            }),
        )
        .await;
}

/// Marks the job running; finishes it failed when that is impossible.
async fn start_job(state: &SharedState, job_id: &JobId) -> bool {
    let store = Arc::clone(&state.store);
    let id = job_id.clone();
    let started = tokio::task::spawn_blocking(move || store.start_job(&id)).await;
    if matches!(started, Ok(Ok(()))) {
        return true;
    }
    state
        .jobs
        .finish(job_id, JobStatus::Failed, json!({"error": "job could not be started"}))
        .await;
    false
}

/// Pushes each device group in order, streaming progress. Returns overall
/// success plus per-device status.
async fn push_groups(
    state: &SharedState,
    job_id: &JobId,
    groups: DeviceLines,
) -> (bool, BTreeMap<String, serde_json::Value>) {
    let mut all_ok = true;
    let mut devices = BTreeMap::new();
    for (device_id, lines) in groups {
        let outcome = push_to_device(state, job_id, &device_id, lines).await;
        let success = outcome.is_ok();
        state.jobs.publish(
            job_id,
            &JobEvent::PushDeviceComplete {
                device_id: device_id.clone(),
                success,
            },
        );
        let status = match outcome {
            Ok(value) => value,
            Err(value) => {
                all_ok = false;
                value
            }
        };
        devices.insert(device_id.to_string(), status);
    }
    (all_ok, devices)
}

/// Pushes one device's block: pre-push snapshot first, then the lines.
async fn push_to_device(
    state: &SharedState,
    job_id: &JobId,
    device_id: &DeviceId,
    blocks: Vec<String>,
) -> Result<serde_json::Value, serde_json::Value> {
    let store = Arc::clone(&state.store);
    let id = device_id.clone();
    let device = tokio::task::spawn_blocking(move || store.get_device(&id))
        .await
        .map_err(|err| json!({"error": err.to_string()}))?
        .map_err(|err| json!({"error": err.to_string()}))?;
    let target = resolve_target(state, &device)
        .await
        .map_err(|err| json!({"error": err.to_string()}))?;

    // Pre-push snapshot: the rollback target for this push.
    let raw = state
        .ssh
        .fetch_running_config(target.clone())
        .await
        .map_err(|err| json!({"error": err}))?;
    let store = Arc::clone(&state.store);
    let id = device_id.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        store.insert_snapshot(&id, &raw, SnapshotSource::PrePush)
    })
    .await
    .map_err(|err| json!({"error": err.to_string()}))?
    .map_err(|err| json!({"error": err.to_string()}))?;

    let lines: Vec<String> = blocks
        .iter()
        .flat_map(|block| block.lines().map(ToString::to_string))
        .collect();
    for line in &lines {
        state.jobs.publish(
            job_id,
            &JobEvent::PushLine {
                device_id: device_id.clone(),
                line: line.clone(),
            },
        );
    }
    let result =
        state.ssh.push(target, lines).await.map_err(|err| json!({"error": err}))?;
    Ok(json!({
        "pre_push_snapshot": snapshot.id,
        "lines_sent": result.lines_sent.len(),
    }))
}

/// Persists a plan transition, logging failures.
async fn persist_plan(state: &SharedState, plan: &RemediationPlan) {
    let store = Arc::clone(&state.store);
    let plan = plan.clone();
    let result = tokio::task::spawn_blocking(move || store.update_plan(&plan)).await;
    if !matches!(result, Ok(Ok(()))) {
        tracing::warn!("plan state persist failed");
    }
}
