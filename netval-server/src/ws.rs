// netval-server/src/ws.rs
// ============================================================================
// Module: WebSocket Streaming
// Description: Job event streams for simulation, remediation, and ingestion.
// Purpose: Deliver events in submission order; late subscribers read the
//          persisted result immediately.
// Dependencies: crate::jobs, axum, netval-core
// ============================================================================

//! ## Overview
//! Each endpoint upgrades, subscribes to the job's event stream, then checks
//! the persisted row: a job that already terminated yields its final result
//! as the only event. Subscribing before the row check closes the race
//! between termination and subscription. The socket closes after the
//! terminal event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::response::Response;
use netval_core::model::JobId;
use netval_core::model::JobKind;
use netval_core::model::JobRecord;
use netval_core::model::JobStatus;
use serde_json::json;

use crate::jobs::JobEvent;
use crate::routes::SharedState;

// ============================================================================
// SECTION: Upgrade Handlers
// ============================================================================

/// GET /ws/simulation/{job_id} — simulation event stream.
pub async fn simulation_stream(
    State(state): State<SharedState>,
    Path(job_id): Path<JobId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_job(state, job_id, JobKind::Simulation, socket))
}

/// GET /ws/remediation/{job_id} — remediation event stream.
pub async fn remediation_stream(
    State(state): State<SharedState>,
    Path(job_id): Path<JobId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_job(state, job_id, JobKind::Remediation, socket))
}

/// GET /ws/ingestion/{job_id} — ingestion event stream.
pub async fn ingestion_stream(
    State(state): State<SharedState>,
    Path(job_id): Path<JobId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_job(state, job_id, JobKind::Ingestion, socket))
}

// ============================================================================
// SECTION: Stream Body
// ============================================================================

/// Streams one job's events to one subscriber.
async fn stream_job(state: SharedState, job_id: JobId, kind: JobKind, mut socket: WebSocket) {
    // Subscribe first so a termination between the row read and the loop
    // still reaches this subscriber.
    let mut receiver = state.jobs.subscribe(&job_id);

    let store = Arc::clone(&state.store);
    let id = job_id.clone();
    let job = tokio::task::spawn_blocking(move || store.get_job(&id)).await;
    let job = match job {
        Ok(Ok(job)) => job,
        Ok(Err(err)) => {
            let event = JobEvent::Failed {
                result: json!({"error": err.to_string()}),
            };
            let _ = send_event(&mut socket, &event).await;
            return;
        }
        Err(err) => {
            let event = JobEvent::Failed {
                result: json!({"error": err.to_string()}),
            };
            let _ = send_event(&mut socket, &event).await;
            return;
        }
    };
    if job.kind != kind {
        let event = JobEvent::Failed {
            result: json!({"error": format!(
                "job {} is a {} job, not {}",
                job.id,
                job.kind.as_str(),
                kind.as_str()
            )}),
        };
        let _ = send_event(&mut socket, &event).await;
        return;
    }
    if job.status.is_terminal() {
        let _ = send_event(&mut socket, &terminal_event(&job)).await;
        return;
    }

    while let Some(event) = receiver.recv().await {
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
        if event.is_terminal() {
            return;
        }
    }
}

/// Serializes and sends one event frame.
async fn send_event(socket: &mut WebSocket, event: &JobEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text)).await
}

/// Builds the terminal event from a persisted job row.
fn terminal_event(job: &JobRecord) -> JobEvent {
    let result = job.result.clone().unwrap_or(serde_json::Value::Null);
    if job.status == JobStatus::Complete {
        JobEvent::Complete {
            result,
        }
    } else {
        JobEvent::Failed {
            result,
        }
    }
}
