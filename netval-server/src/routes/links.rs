// netval-server/src/routes/links.rs
// ============================================================================
// Module: Link Routes
// Description: Link CRUD under a project.
// Purpose: Manage undirected links with endpoint validation at write time.
// Dependencies: crate::routes, axum, netval-core
// ============================================================================

//! ## Overview
//! Link creation validates both endpoints against the owning project inside
//! the store transaction, so orphan links cannot be created and a
//! constraint failure surfaces as HTTP 400.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use netval_core::model::Link;
use netval_core::model::LinkId;
use netval_core::model::NewLink;
use netval_core::model::ProjectId;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::SharedState;
use crate::routes::audit;
use crate::routes::with_store;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /projects/{id}/links — create a link.
pub async fn create(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
    Json(new): Json<NewLink>,
) -> Result<Json<Link>, ApiError> {
    let project = project_id.clone();
    let link = with_store(&state, move |store| store.create_link(&project, &new)).await?;
    audit(
        &state,
        &project_id,
        None,
        "link.create",
        format!(
            "linked {}:{} to {}:{}",
            link.source_device_id, link.source_interface, link.target_device_id,
            link.target_interface
        ),
    )
    .await;
    Ok(Json(link))
}

/// GET /links/{project_id} — list links under a project.
pub async fn list(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<Vec<Link>>, ApiError> {
    let links = with_store(&state, move |store| store.list_links(&project_id)).await?;
    Ok(Json(links))
}

/// DELETE /links/{link_id} — delete one link.
pub async fn remove(
    State(state): State<SharedState>,
    Path(link_id): Path<LinkId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_store(&state, move |store| store.delete_link(&link_id)).await?;
    Ok(Json(json!({"status": "success"})))
}
