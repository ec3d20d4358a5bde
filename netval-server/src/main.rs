// netval-server/src/main.rs
// ============================================================================
// Module: NetVal Server Entry Point
// Description: Process bootstrap for the validation service.
// Purpose: Open the store, build the runtime state, and serve on loopback.
// Dependencies: netval-core, netval-server, netval-ssh, netval-store-sqlite,
//               netval-vault, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! Long-running local service with no CLI surface of its own; the host
//! process manages exit codes. Graceful shutdown marks running jobs failed
//! before the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use netval_core::interfaces::TopologyStore;
use netval_server::AiBridge;
use netval_server::AppState;
use netval_server::JobManager;
use netval_server::Settings;
use netval_server::build_router;
use netval_ssh::Ssh2Connector;
use netval_ssh::SshPool;
use netval_store_sqlite::SqliteStoreConfig;
use netval_store_sqlite::SqliteTopologyStore;
use netval_vault::KeyringVault;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone())),
        )
        .init();

    let store_config = SqliteStoreConfig::at(settings.db_path.clone());
    let store: Arc<dyn TopologyStore> = match SqliteTopologyStore::open(&store_config) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, path = %settings.db_path.display(), "store open failed");
            return ExitCode::FAILURE;
        }
    };
    let vault = Arc::new(KeyringVault::new());
    let ssh = SshPool::new(Arc::new(Ssh2Connector::new()), settings.max_ssh_connections);
    let jobs = JobManager::new(Arc::clone(&store));
    let ai = AiBridge::new(settings.ai.clone());
    let state = Arc::new(AppState {
        store,
        vault,
        ssh,
        jobs,
        ai,
        settings: settings.clone(),
    });

    let app = build_router(Arc::clone(&state));
    let address = SocketAddr::from(([127, 0, 0, 1], settings.port));
    let listener = match tokio::net::TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %address, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%address, "netval server listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    if let Err(err) = serve {
        tracing::error!(error = %err, "server failed");
        state.jobs.fail_open_jobs().await;
        return ExitCode::FAILURE;
    }

    // Graceful shutdown: running jobs become failed, never stuck.
    state.jobs.fail_open_jobs().await;
    ExitCode::SUCCESS
}

/// Resolves when the process receives an interrupt.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
