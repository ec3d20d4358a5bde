// netval-server/src/lib.rs
// ============================================================================
// Module: NetVal Server Library
// Description: Public surface for the REST and WebSocket server.
// Purpose: Expose router assembly and runtime state for embedding and tests.
// Dependencies: crate::{ai, config, error, jobs, routes, ws}
// ============================================================================

//! ## Overview
//! The server crate wires the NetVal core to its transports: axum REST under
//! `/api/v1`, WebSocket job streams under `/ws/*`, a job manager, the SSH
//! pool, and the AI capability bridge. The router builds from an
//! [`routes::AppState`] so tests drive it in-process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ai;
pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod ws;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ai::AiBridge;
pub use config::AiSettings;
pub use config::Settings;
pub use error::ApiError;
pub use jobs::JobEvent;
pub use jobs::JobManager;
pub use routes::AppState;
pub use routes::SharedState;
pub use routes::build_router;
