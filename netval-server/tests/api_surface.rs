// netval-server/tests/api_surface.rs
// ============================================================================
// Module: API Surface Tests
// Description: In-process REST contract and lifecycle coverage.
// Purpose: Exercise CRUD, validation jobs, confirmation gating, and the
//          apply/rollback flow against a scripted device connector.
// Dependencies: netval-server, netval-core, netval-store-sqlite,
//               netval-vault, tempfile, tower
// ============================================================================

//! ## Overview
//! These tests drive the router in-process with `tower::ServiceExt::oneshot`
//! over a real SQLite store, the in-memory vault, and a scripted SSH
//! connector. The AI bridge points at an unroutable port so availability
//! reports false while every other route behaves normally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::http::Request;
use axum::http::StatusCode;
use netval_core::interfaces::DeviceConnector;
use netval_core::interfaces::DeviceSession;
use netval_core::interfaces::PushResult;
use netval_core::interfaces::SshError;
use netval_core::interfaces::SshTarget;
use netval_core::interfaces::TopologyStore;
use netval_core::model::DeviceId;
use netval_core::model::SnapshotSource;
use netval_server::AiBridge;
use netval_server::AppState;
use netval_server::JobManager;
use netval_server::Settings;
use netval_server::build_router;
use netval_ssh::SshPool;
use netval_store_sqlite::SqliteStoreConfig;
use netval_store_sqlite::SqliteTopologyStore;
use netval_vault::MemoryVault;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// SECTION: Scripted Connector
// ============================================================================

/// Connector recording connects and pushed lines.
#[derive(Default)]
struct ScriptedConnector {
    connects: AtomicUsize,
}

struct ScriptedSession {
    pushes: Arc<Mutex<Vec<Vec<String>>>>,
}

/// Shared scripted state visible to assertions.
struct ScriptedState {
    connector: ScriptedConnector,
    push_log: Arc<Mutex<Vec<Vec<String>>>>,
}

impl DeviceConnector for ScriptedState {
    fn connect(&self, _target: &SshTarget) -> Result<Box<dyn DeviceSession>, SshError> {
        self.connector.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            pushes: Arc::clone(&self.push_log),
        }))
    }
}

impl DeviceSession for ScriptedSession {
    fn run_command(&mut self, command: &str) -> Result<String, SshError> {
        if command == "show running-config" {
            return Ok("hostname SW-B\n!\nvlan 10\n!\nvlan 20\n!\nend\n".to_string());
        }
        Ok(format!("output of {command}"))
    }

    fn push_config(&mut self, lines: &[String]) -> Result<PushResult, SshError> {
        self.pushes.lock().unwrap().push(lines.to_vec());
        Ok(PushResult {
            lines_sent: lines.to_vec(),
            transcript: String::new(),
        })
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

struct Harness {
    app: Router,
    store: SqliteTopologyStore,
    scripted: Arc<ScriptedState>,
    _temp: TempDir,
}

fn harness() -> Harness {
    let temp = TempDir::new().expect("tempdir");
    let store =
        SqliteTopologyStore::open(&SqliteStoreConfig::at(temp.path().join("netval.db")))
            .expect("store open");
    let shared: Arc<dyn TopologyStore> = Arc::new(store.clone());
    let scripted = Arc::new(ScriptedState {
        connector: ScriptedConnector::default(),
        push_log: Arc::new(Mutex::new(Vec::new())),
    });
    let mut settings = Settings::default();
    // Unroutable AI endpoint: availability must report false while every
    // other route keeps working.
    settings.ai.base_url = Some("http://127.0.0.1:9".to_string());
    let state = Arc::new(AppState {
        store: Arc::clone(&shared),
        vault: Arc::new(MemoryVault::new()),
        ssh: SshPool::new(Arc::clone(&scripted) as Arc<dyn DeviceConnector>, 2),
        jobs: JobManager::new(shared),
        ai: AiBridge::new(settings.ai.clone()),
        settings,
    });
    Harness {
        app: build_router(state),
        store,
        scripted,
        _temp: temp,
    }
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("router");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn poll_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..200 {
        let (status, job) = send_json(app, "GET", &format!("/api/v1/jobs/{job_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let state = job["status"].as_str().unwrap_or_default().to_string();
        if state == "complete" || state == "failed" {
            return job;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never terminated");
}

const SW_A_CONFIG: &str = "hostname SW-A\n!\nvlan 10\n!\nvlan 20\n!\nvlan 30\n!\nend\n";
const SW_B_CONFIG: &str = "hostname SW-B\n!\nvlan 10\n!\nvlan 20\n!\nend\n";

/// Builds the two-switch VLAN-gap project and returns
/// (project_id, sw_a_id, sw_b_id).
async fn vlan_gap_project(app: &Router) -> (String, String, String) {
    let (status, project) = send_json(
        app,
        "POST",
        "/api/v1/projects",
        Some(json!({"name": "campus", "description": "gap fixture"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let project_id = project["id"].as_str().expect("project id").to_string();

    let mut device_ids = Vec::new();
    for hostname in ["SW-A", "SW-B"] {
        let (status, device) = send_json(
            app,
            "POST",
            &format!("/api/v1/projects/{project_id}/devices"),
            Some(json!({
                "hostname": hostname,
                "role": "switch",
                "management_ip": "198.51.100.20",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        device_ids.push(device["id"].as_str().expect("device id").to_string());
    }

    for (device, config) in device_ids.iter().zip([SW_A_CONFIG, SW_B_CONFIG]) {
        let (status, _) = send_json(
            app,
            "POST",
            &format!("/api/v1/configs/{device}"),
            Some(json!({"content": config})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = send_json(
        app,
        "POST",
        &format!("/api/v1/projects/{project_id}/links"),
        Some(json!({
            "source_device_id": device_ids[0],
            "source_interface": "Gi1/0/24",
            "target_device_id": device_ids[1],
            "target_interface": "Gi1/0/24",
            "vlan_allow_list": [10, 20, 30],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (project_id, device_ids[0].clone(), device_ids[1].clone())
}

// ============================================================================
// SECTION: Health and CRUD
// ============================================================================

#[tokio::test]
async fn health_reports_ai_outage_without_failing() {
    let harness = harness();
    let (status, body) = send_json(&harness.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ollama_available"], false);
}

#[tokio::test]
async fn project_crud_roundtrip() {
    let harness = harness();
    let (status, created) = send_json(
        &harness.app,
        "POST",
        "/api/v1/projects",
        Some(json!({"name": "campus"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().expect("id");

    let (status, listed) = send_json(&harness.app, "GET", "/api/v1/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, _) =
        send_json(&harness.app, "DELETE", &format!("/api/v1/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) =
        send_json(&harness.app, "GET", &format!("/api/v1/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn cross_project_link_is_rejected() {
    let harness = harness();
    let (_, project_a) =
        send_json(&harness.app, "POST", "/api/v1/projects", Some(json!({"name": "a"}))).await;
    let (_, project_b) =
        send_json(&harness.app, "POST", "/api/v1/projects", Some(json!({"name": "b"}))).await;
    let a = project_a["id"].as_str().unwrap();
    let b = project_b["id"].as_str().unwrap();
    let (_, device_a) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{a}/devices"),
        Some(json!({"hostname": "SW-A", "role": "switch"})),
    )
    .await;
    let (_, device_b) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{b}/devices"),
        Some(json!({"hostname": "SW-B", "role": "switch"})),
    )
    .await;
    let (status, body) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{a}/links"),
        Some(json!({
            "source_device_id": device_a["id"],
            "source_interface": "Gi1/0/1",
            "target_device_id": device_b["id"],
            "target_interface": "Gi1/0/1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn device_list_and_detail_routes_are_distinct() {
    let harness = harness();
    let (project_id, sw_a, _) = vlan_gap_project(&harness.app).await;
    let (status, devices) =
        send_json(&harness.app, "GET", &format!("/api/v1/devices/{project_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(devices.as_array().map(Vec::len), Some(2));

    let (status, device) =
        send_json(&harness.app, "GET", &format!("/api/v1/devices/detail/{sw_a}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(device["hostname"], "SW-A");
}

// ============================================================================
// SECTION: CLI Generation
// ============================================================================

#[tokio::test]
async fn generate_cli_is_deterministic() {
    let harness = harness();
    let (project_id, _, _) = vlan_gap_project(&harness.app).await;
    let uri = format!("/api/v1/projects/{project_id}/generate-cli");
    let (status, first) = send_json(&harness.app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send_json(&harness.app, "POST", &uri, None).await;
    assert_eq!(first, second);
    let configs = first["configs"].as_array().expect("configs");
    assert_eq!(configs.len(), 2);
    let sw_a = configs
        .iter()
        .find(|entry| entry["hostname"] == "SW-A")
        .expect("SW-A rendered");
    let rendered = sw_a["cli"].as_str().expect("cli text");
    assert!(rendered.starts_with("hostname SW-A\n"));
    assert!(rendered.contains("vlan 30\n"));
    assert!(rendered.ends_with("end\n"));
}

// ============================================================================
// SECTION: Validation Jobs
// ============================================================================

#[tokio::test]
async fn validation_finds_the_vlan_gap_and_reruns_identically() {
    let harness = harness();
    let (project_id, _, _) = vlan_gap_project(&harness.app).await;

    let (status, submitted) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/validate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = submitted["job_id"].as_str().expect("job id");
    let job = poll_job(&harness.app, job_id).await;
    assert_eq!(job["status"], "complete");

    let result = &job["result"];
    let failures: Vec<&Value> = result["results"]
        .as_array()
        .expect("results")
        .iter()
        .filter(|finding| finding["passed"] == false)
        .collect();
    assert!(
        failures.iter().any(|finding| finding["check_id"] == "VLAN_CONTINUITY"
            && finding["vlan"] == 30
            && finding["hostname"] == "SW-B"),
        "vlan gap finding missing: {failures:?}"
    );
    assert_eq!(result["reachability"]["SW-A"]["SW-B"], true);

    // The gap link carries a failed link-scoped finding.
    let (_, links) =
        send_json(&harness.app, "GET", &format!("/api/v1/links/{project_id}"), None).await;
    assert_eq!(links[0]["state"], "misconfigured");

    let (_, resubmitted) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/validate"),
        None,
    )
    .await;
    let second = poll_job(&harness.app, resubmitted["job_id"].as_str().unwrap()).await;
    assert_eq!(second["result"]["result_hash"], result["result_hash"]);
    assert_eq!(second["result"]["results"], result["results"]);
}

// ============================================================================
// SECTION: Remediation Lifecycle
// ============================================================================

#[tokio::test]
async fn apply_without_confirm_is_rejected_before_any_session() {
    let harness = harness();
    let (project_id, _, _) = vlan_gap_project(&harness.app).await;
    let (_, submitted) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/validate"),
        None,
    )
    .await;
    poll_job(&harness.app, submitted["job_id"].as_str().unwrap()).await;
    let (status, _) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/remediate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/apply"),
        Some(json!({"confirm": false})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "confirmation_required");
    assert_eq!(harness.scripted.connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn apply_with_confirm_snapshots_pushes_and_rolls_back() {
    let harness = harness();
    let (project_id, _, sw_b) = vlan_gap_project(&harness.app).await;

    let (status, _) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/devices/{sw_b}/credentials"),
        Some(json!({"username": "admin", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, submitted) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/validate"),
        None,
    )
    .await;
    poll_job(&harness.app, submitted["job_id"].as_str().unwrap()).await;

    let (status, plan) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/remediate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let plan_id = plan["id"].as_str().expect("plan id");
    assert_eq!(plan["status"], "pending");
    let item_count = plan["items"].as_array().expect("items").len();
    assert!(item_count >= 1);

    let toggles: Vec<Value> = (0..item_count)
        .map(|index| json!({"index": index, "approved": true}))
        .collect();
    let (status, approved) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/plans/{plan_id}/approve"),
        Some(json!({"items": toggles})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    let (status, applied) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/apply"),
        Some(json!({"confirm": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job = poll_job(&harness.app, applied["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "complete", "apply job failed: {job:?}");

    // Pre-push snapshot persisted as the rollback target.
    let pre_push = harness
        .store
        .latest_snapshot(&DeviceId::new(sw_b.clone()), true)
        .expect("snapshot query")
        .expect("snapshot present");
    assert_eq!(pre_push.source, SnapshotSource::PrePush);

    let pushed = harness.scripted.push_log.lock().unwrap().clone();
    assert!(
        pushed.iter().flatten().any(|line| line == "vlan 30"),
        "patch lines missing: {pushed:?}"
    );

    let (_, latest_plan) = send_json(
        &harness.app,
        "GET",
        &format!("/api/v1/plans/{project_id}/latest"),
        None,
    )
    .await;
    assert_eq!(latest_plan["status"], "applied");

    let (status, rollback) = send_json(
        &harness.app,
        "POST",
        &format!("/api/v1/projects/{project_id}/rollback"),
        Some(json!({"confirm": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job = poll_job(&harness.app, rollback["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "complete", "rollback job failed: {job:?}");

    let pushed = harness.scripted.push_log.lock().unwrap().clone();
    assert!(
        pushed.iter().flatten().any(|line| line == "no vlan 30"),
        "rollback lines missing: {pushed:?}"
    );
    let (_, latest_plan) = send_json(
        &harness.app,
        "GET",
        &format!("/api/v1/plans/{project_id}/latest"),
        None,
    )
    .await;
    assert_eq!(latest_plan["status"], "rolled_back");
}
