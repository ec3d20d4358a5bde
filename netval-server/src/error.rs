// netval-server/src/error.rs
// ============================================================================
// Module: API Error Taxonomy
// Description: Stable error codes mapped onto HTTP statuses.
// Purpose: Surface storage and validation failures; keep SSH and parser
//          failures inside job results and sub-models.
// Dependencies: axum, netval-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Only storage and validation failures become HTTP errors. Check-internal
//! errors become findings, SSH errors become job failures, and parser errors
//! become warnings on the produced sub-model. Every error body carries a
//! stable `code` and a human-readable `message`; credential material never
//! appears in any error payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use netval_core::interfaces::StoreError;
use netval_core::interfaces::VaultError;
use netval_core::remediation::PlanError;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Errors that surface as HTTP failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request shape or referential constraint failure.
    #[error("{0}")]
    Validation(String),
    /// Missing identifier.
    #[error("{0}")]
    NotFound(String),
    /// Destructive operation without `confirm: true`.
    #[error("{0}")]
    ConfirmationRequired(String),
    /// Transient storage failure; the caller retries.
    #[error("{0}")]
    Storage(String),
}

impl ApiError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::ConfirmationRequired(_) => "confirmation_required",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Returns the HTTP status for the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConfirmationRequired(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Constraint(message) => Self::Validation(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Db(message)
            | StoreError::Io(message)
            | StoreError::VersionMismatch(message)
            | StoreError::Invalid(message) => Self::Storage(message),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::NotFound => Self::NotFound("credential reference not found".to_string()),
            VaultError::Backend(message) | VaultError::Invalid(message) => Self::Storage(message),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(error: PlanError) -> Self {
        Self::Validation(error.to_string())
    }
}
