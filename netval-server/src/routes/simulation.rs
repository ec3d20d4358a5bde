// netval-server/src/routes/simulation.rs
// ============================================================================
// Module: Simulation Routes
// Description: Validation job submission, polling, and CLI generation.
// Purpose: Run the check engine off the request path with streamed progress.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! A validation job snapshots its inputs by reading the topology once, so
//! concurrent edits cannot race the result. Assembly and the check pass run
//! on a blocking worker; progress events publish between checks. The request
//! timestamp is pinned at submission so reruns over unchanged inputs hash
//! identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use chrono::Utc;
use netval_core::checks::EngineEvent;
use netval_core::checks::run_audit;
use netval_core::interfaces::StoreError;
use netval_core::interfaces::TopologyStore;
use netval_core::model::JobId;
use netval_core::model::JobKind;
use netval_core::model::JobRecord;
use netval_core::model::JobStatus;
use netval_core::model::ProjectId;
use netval_core::parser::parse_running_config;
use netval_core::render::render_config;
use netval_core::topology::TopologyGraph;
use netval_core::topology::TopologyInput;
use serde_json::json;

use crate::error::ApiError;
use crate::jobs::JobEvent;
use crate::routes::SharedState;
use crate::routes::with_store;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /projects/{id}/validate — enqueue a simulation job.
pub async fn validate(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = project_id.clone();
    let job = with_store(&state, move |store| store.create_job(&project, JobKind::Simulation))
        .await?;
    let job_id = job.id.clone();
    tokio::spawn(run_simulation(Arc::clone(&state), project_id, job_id));
    Ok(Json(json!({"job_id": job.id})))
}

/// GET /jobs/{job_id} — poll job status and result.
pub async fn job_status(
    State(state): State<SharedState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobRecord>, ApiError> {
    let job = with_store(&state, move |store| store.get_job(&job_id)).await?;
    Ok(Json(job))
}

/// POST /projects/{id}/generate-cli — deterministic CLI for all devices.
pub async fn generate_cli(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let configs = with_store(&state, move |store| {
        let devices = store.list_devices(&project_id)?;
        let mut rendered = Vec::new();
        for device in devices {
            let interfaces = store.list_interfaces(&device.id)?;
            let vlans = store.list_device_vlans(&device.id)?;
            let submodel =
                netval_core::parser::device_submodel(&device.hostname, &interfaces, &vlans);
            rendered.push(json!({
                "device_id": device.id,
                "hostname": device.hostname,
                "cli": render_config(&submodel),
            }));
        }
        Ok(rendered)
    })
    .await?;
    Ok(Json(json!({"configs": configs})))
}

// ============================================================================
// SECTION: Simulation Task
// ============================================================================

/// Background body of one simulation job.
async fn run_simulation(state: SharedState, project_id: ProjectId, job_id: JobId) {
    let submitted_at = Utc::now();
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

    let store = Arc::clone(&state.store);
    let manager = state.jobs.clone();
    let project = project_id.clone();
    let id = job_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let input = read_topology_input(store.as_ref(), &project)
            .map_err(|err| format!("topology read failed: {err}"))?;
        let link_ids: Vec<netval_core::model::LinkId> =
            input.links.iter().map(|link| link.id.clone()).collect();
        let graph = TopologyGraph::assemble(input)
            .map_err(|err| format!("topology assembly failed: {err}"))?;
        let audit = run_audit(&graph, &project, submitted_at, &mut |event| {
            manager.publish(&id, &engine_event(event));
        });
        refresh_link_states(store.as_ref(), &link_ids, &audit);
        Ok::<_, String>(audit)
    })
    .await;

    match outcome {
        Ok(Ok(audit)) => {
            let result = serde_json::to_value(&audit)
                .unwrap_or_else(|err| json!({"error": format!("result encode failed: {err}")}));
            state.jobs.finish(&job_id, JobStatus::Complete, result).await;
        }
        Ok(Err(message)) => {
            state.jobs.finish(&job_id, JobStatus::Failed, json!({"error": message})).await;
        }
        Err(err) => {
            state
                .jobs
                .finish(&job_id, JobStatus::Failed, json!({"error": err.to_string()}))
                .await;
        }
    }
}

/// Reads one project's topology in a single pass.
pub(crate) fn read_topology_input(
    store: &dyn TopologyStore,
    project: &ProjectId,
) -> Result<TopologyInput, StoreError> {
    let devices = store.list_devices(project)?;
    let mut interfaces = Vec::new();
    let mut vlans = Vec::new();
    let mut parsed = BTreeMap::new();
    for device in &devices {
        interfaces.extend(store.list_interfaces(&device.id)?);
        vlans.extend(store.list_device_vlans(&device.id)?);
        if let Some(snapshot) = store.latest_snapshot(&device.id, false)? {
            parsed.insert(device.id.clone(), parse_running_config(&snapshot.raw_config));
        }
    }
    let links = store.list_links(project)?;
    Ok(TopologyInput {
        devices,
        interfaces,
        vlans,
        links,
        parsed,
    })
}

/// Refreshes link lifecycle states from the audit: links carrying a failed
/// link-scoped finding become `misconfigured`, the rest `connected`.
/// State refresh is best-effort; the audit result stands regardless.
fn refresh_link_states(
    store: &dyn TopologyStore,
    link_ids: &[netval_core::model::LinkId],
    audit: &netval_core::checks::AuditResult,
) {
    let broken: std::collections::BTreeSet<&netval_core::model::LinkId> = audit
        .results
        .iter()
        .filter(|finding| !finding.passed)
        .filter_map(|finding| finding.link_id.as_ref())
        .collect();
    for link_id in link_ids {
        let state = if broken.contains(link_id) {
            netval_core::model::LinkState::Misconfigured
        } else {
            netval_core::model::LinkState::Connected
        };
        if let Err(err) = store.set_link_state(link_id, state) {
            tracing::warn!(link = %link_id, error = %err, "link state refresh failed");
        }
    }
}

/// Maps engine progress onto the job event stream.
fn engine_event(event: EngineEvent) -> JobEvent {
    match event {
        EngineEvent::CheckStart {
            check_id,
        } => JobEvent::CheckStart {
            check_id,
        },
        EngineEvent::CheckComplete {
            check_id,
            failed,
        } => JobEvent::CheckComplete {
            check_id,
            failed,
        },
    }
}
