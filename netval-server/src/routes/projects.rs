// netval-server/src/routes/projects.rs
// ============================================================================
// Module: Project Routes
// Description: Project CRUD with cascading delete and vault revocation.
// Purpose: Manage the roots of the ownership tree.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! Project deletion cascades through the store and then revokes every
//! orphaned credential reference from the vault; revocation failures are
//! logged and retried-by-hand rather than resurrecting deleted rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use netval_core::model::NewProject;
use netval_core::model::Project;
use netval_core::model::ProjectId;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::with_store;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /projects — create a project.
pub async fn create(
    State(state): State<SharedState>,
    Json(new): Json<NewProject>,
) -> Result<Json<Project>, ApiError> {
    let project = with_store(&state, move |store| store.create_project(&new)).await?;
    audit(&state, &project.id, None, "project.create", format!("created project {}", project.name))
        .await;
    Ok(Json(project))
}

/// GET /projects — list all projects.
pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = with_store(&state, |store| store.list_projects()).await?;
    Ok(Json(projects))
}

/// GET /projects/{id} — fetch one project.
pub async fn fetch(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<Project>, ApiError> {
    let project = with_store(&state, move |store| store.get_project(&project_id)).await?;
    Ok(Json(project))
}

/// DELETE /projects/{id} — cascade delete, then revoke vault entries.
pub async fn remove(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = project_id.clone();
    let orphaned = with_store(&state, move |store| store.delete_project(&id)).await?;
    let vault = Arc::clone(&state.vault);
    let revoked = orphaned.len();
    let revocation = tokio::task::spawn_blocking(move || {
        for reference in &orphaned {
            if let Err(err) = vault.delete(reference) {
                tracing::warn!(error = %err, "credential revocation failed");
            }
        }
    })
    .await;
    if let Err(err) = revocation {
        tracing::warn!(error = %err, "credential revocation task failed");
    }
    audit(
        &state,
        &project_id,
        None,
        "project.delete",
        format!("deleted project, revoked {revoked} credential entries"),
    )
    .await;
    Ok(Json(json!({"status": "success"})))
}
