// netval-core/tests/determinism.rs
// ============================================================================
// Module: Engine Determinism Tests
// Description: Validate reproducible audit results and the matrix.
// Purpose: Ensure reruns over unchanged inputs are byte-identical.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! The audit pipeline must be deterministic: fixed registry order, sorted
//! iteration, lexical path tie-breaks, and a canonical result hash stable
//! across reruns. The reachability matrix is dense over all ordered pairs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::TimeZone;
use chrono::Utc;
use netval_core::checks::run_audit;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::DeviceRole;
use netval_core::model::DeviceVlan;
use netval_core::model::Link;
use netval_core::model::LinkId;
use netval_core::model::LinkMedium;
use netval_core::model::LinkState;
use netval_core::model::ProjectId;
use netval_core::topology::TopologyGraph;
use netval_core::topology::TopologyInput;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn device(id: &str, hostname: &str, role: DeviceRole) -> Device {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Device {
        id: DeviceId::new(id),
        project_id: ProjectId::new("project-1"),
        hostname: hostname.to_string(),
        role,
        vendor: "cisco".to_string(),
        platform: "ios-xe".to_string(),
        management_ip: None,
        canvas_x: 0.0,
        canvas_y: 0.0,
        credential_ref: None,
        config_hash: None,
        created_at: now,
        updated_at: now,
    }
}

fn link(id: &str, source: &str, target: &str, allow: &[u16]) -> Link {
    Link {
        id: LinkId::new(id),
        project_id: ProjectId::new("project-1"),
        source_device_id: DeviceId::new(source),
        source_interface: "Gi1/0/1".to_string(),
        target_device_id: DeviceId::new(target),
        target_interface: "Gi1/0/2".to_string(),
        medium: LinkMedium::Ethernet,
        vlan_allow_list: allow.to_vec(),
        state: LinkState::Pending,
    }
}

fn input() -> TopologyInput {
    TopologyInput {
        devices: vec![
            device("d-a", "SW-A", DeviceRole::Switch),
            device("d-b", "SW-B", DeviceRole::Switch),
            device("d-c", "SW-C", DeviceRole::Switch),
        ],
        interfaces: Vec::new(),
        vlans: vec![
            DeviceVlan {
                device_id: DeviceId::new("d-a"),
                vlan_id: 10,
                name: None,
            },
            DeviceVlan {
                device_id: DeviceId::new("d-b"),
                vlan_id: 10,
                name: None,
            },
        ],
        links: vec![link("l-1", "d-a", "d-b", &[10]), link("l-2", "d-b", "d-c", &[10])],
        parsed: Default::default(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn reruns_are_byte_identical() {
    let pinned = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let project = ProjectId::new("project-1");

    let graph_one = TopologyGraph::assemble(input()).expect("assemble");
    let first = run_audit(&graph_one, &project, pinned, &mut |_| {});
    let graph_two = TopologyGraph::assemble(input()).expect("assemble");
    let second = run_audit(&graph_two, &project, pinned, &mut |_| {});

    let first_json = serde_json::to_string(&first).expect("encode");
    let second_json = serde_json::to_string(&second).expect("encode");
    assert_eq!(first_json, second_json);
    assert_eq!(first.result_hash, second.result_hash);
    assert!(!first.result_hash.is_empty());
}

#[test]
fn result_hash_ignores_request_time() {
    let project = ProjectId::new("project-1");
    let graph = TopologyGraph::assemble(input()).expect("assemble");
    let early = run_audit(
        &graph,
        &project,
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        &mut |_| {},
    );
    let late = run_audit(
        &graph,
        &project,
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        &mut |_| {},
    );
    assert_eq!(early.result_hash, late.result_hash);
}

#[test]
fn progress_events_follow_registry_order() {
    let project = ProjectId::new("project-1");
    let graph = TopologyGraph::assemble(input()).expect("assemble");
    let mut seen = Vec::new();
    let _ = run_audit(&graph, &project, Utc::now(), &mut |event| {
        seen.push(format!("{event:?}"));
    });
    // Two events per registered check, start before complete.
    assert_eq!(seen.len(), netval_core::registry().len() * 2);
    assert!(seen[0].contains("CheckStart") && seen[0].contains("VLAN_CONTINUITY"));
    assert!(seen[1].contains("CheckComplete") && seen[1].contains("VLAN_CONTINUITY"));
}

#[test]
fn reachability_matrix_is_dense_over_ordered_pairs() {
    let project = ProjectId::new("project-1");
    let graph = TopologyGraph::assemble(input()).expect("assemble");
    let audit = run_audit(&graph, &project, Utc::now(), &mut |_| {});
    assert_eq!(audit.reachability.len(), 3);
    for row in audit.reachability.values() {
        assert_eq!(row.len(), 3);
    }
    assert_eq!(audit.reachability["SW-A"]["SW-C"], true);
    assert_eq!(audit.reachability["SW-A"]["SW-A"], true);
}

#[test]
fn disconnected_devices_show_false_without_a_finding() {
    let mut isolated = input();
    isolated.links.pop();
    let project = ProjectId::new("project-1");
    let graph = TopologyGraph::assemble(isolated).expect("assemble");
    let audit = run_audit(&graph, &project, Utc::now(), &mut |_| {});
    assert_eq!(audit.reachability["SW-A"]["SW-C"], false);
    assert_eq!(audit.reachability["SW-C"]["SW-A"], false);
}
