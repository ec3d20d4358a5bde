// netval-core/tests/checks_vlan.rs
// ============================================================================
// Module: VLAN Check Tests
// Description: Validate continuity, orphan SVI, and native VLAN checks.
// Purpose: Ensure layer-2 findings carry the right device, VLAN, and fix.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! Scenario coverage: a VLAN allowed across a trunk but missing from one
//! endpoint's VLAN database must fail `VLAN_CONTINUITY` on that endpoint
//! with the VLAN-creation fix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::Utc;
use netval_core::checks::CheckKind;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::DeviceRole;
use netval_core::model::DeviceVlan;
use netval_core::model::Interface;
use netval_core::model::InterfaceId;
use netval_core::model::InterfaceMode;
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
    let now = Utc::now();
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

fn interface(device: &str, name: &str) -> Interface {
    Interface {
        id: InterfaceId::generate(),
        device_id: DeviceId::new(device),
        name: name.to_string(),
        description: None,
        mode: InterfaceMode::Unknown,
        vlan_access: None,
        vlan_trunk_allowed: Vec::new(),
        vlan_native: None,
        ip_address: None,
        ip_mask: None,
        duplex: netval_core::model::DuplexMode::Auto,
        helper_addresses: Vec::new(),
        state: netval_core::model::PortState::Up,
    }
}

fn vlans_for(device: &str, ids: &[u16]) -> Vec<DeviceVlan> {
    ids.iter()
        .map(|vlan| DeviceVlan {
            device_id: DeviceId::new(device),
            vlan_id: *vlan,
            name: None,
        })
        .collect()
}

fn link(id: &str, source: &str, source_if: &str, target: &str, target_if: &str, allow: &[u16]) -> Link {
    Link {
        id: LinkId::new(id),
        project_id: ProjectId::new("project-1"),
        source_device_id: DeviceId::new(source),
        source_interface: source_if.to_string(),
        target_device_id: DeviceId::new(target),
        target_interface: target_if.to_string(),
        medium: LinkMedium::Ethernet,
        vlan_allow_list: allow.to_vec(),
        state: LinkState::Pending,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn vlan_gap_fails_on_the_missing_endpoint() {
    let input = TopologyInput {
        devices: vec![
            device("d-a", "SW-A", DeviceRole::Switch),
            device("d-b", "SW-B", DeviceRole::Switch),
        ],
        interfaces: Vec::new(),
        vlans: [vlans_for("d-a", &[10, 20, 30]), vlans_for("d-b", &[10, 20])].concat(),
        links: vec![link("l-1", "d-a", "Gi1/0/1", "d-b", "Gi1/0/1", &[10, 20, 30])],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::VlanContinuity.run(&graph);

    let failures: Vec<_> = findings.iter().filter(|finding| !finding.passed).collect();
    assert_eq!(failures.len(), 1);
    let failure = failures[0];
    assert_eq!(failure.check_id, "VLAN_CONTINUITY");
    assert_eq!(failure.hostname.as_deref(), Some("SW-B"));
    assert_eq!(failure.vlan, Some(30));
    assert_eq!(failure.suggested_fix.as_deref(), Some("vlan 30\n name VLAN30"));
}

#[test]
fn continuous_vlans_pass() {
    let input = TopologyInput {
        devices: vec![
            device("d-a", "SW-A", DeviceRole::Switch),
            device("d-b", "SW-B", DeviceRole::Switch),
        ],
        interfaces: Vec::new(),
        vlans: [vlans_for("d-a", &[10, 20]), vlans_for("d-b", &[10, 20])].concat(),
        links: vec![link("l-1", "d-a", "Gi1/0/1", "d-b", "Gi1/0/1", &[10, 20])],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::VlanContinuity.run(&graph);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].passed);
}

#[test]
fn orphan_svi_fails_against_vlan_database() {
    let mut svi = interface("d-a", "Vlan30");
    svi.mode = InterfaceMode::Routed;
    svi.ip_address = Some("10.1.30.1".to_string());
    svi.ip_mask = Some("255.255.255.0".to_string());
    let input = TopologyInput {
        devices: vec![device("d-a", "SW-A", DeviceRole::Switch)],
        interfaces: vec![svi],
        vlans: vlans_for("d-a", &[10, 20]),
        links: Vec::new(),
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::VlanOrphanSvi.run(&graph);
    let failure = findings.iter().find(|finding| !finding.passed).expect("orphan finding");
    assert_eq!(failure.interface.as_deref(), Some("Vlan30"));
    assert_eq!(failure.vlan, Some(30));
    assert_eq!(failure.suggested_fix.as_deref(), Some("vlan 30\n name VLAN30"));
}

#[test]
fn native_vlan_mismatch_fails_with_restore_data() {
    let mut source_if = interface("d-a", "Gi1/0/24");
    source_if.mode = InterfaceMode::Trunk;
    source_if.vlan_native = Some(99);
    let mut target_if = interface("d-b", "Gi1/0/24");
    target_if.mode = InterfaceMode::Trunk;
    target_if.vlan_native = Some(1);

    let input = TopologyInput {
        devices: vec![
            device("d-a", "SW-A", DeviceRole::Switch),
            device("d-b", "SW-B", DeviceRole::Switch),
        ],
        interfaces: vec![source_if, target_if],
        vlans: [vlans_for("d-a", &[99]), vlans_for("d-b", &[99])].concat(),
        links: vec![link("l-1", "d-a", "Gi1/0/24", "d-b", "Gi1/0/24", &[99])],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::TrunkNativeMismatch.run(&graph);
    let failure = findings.iter().find(|finding| !finding.passed).expect("mismatch finding");
    assert_eq!(failure.vlan, Some(99));
    assert_eq!(failure.previous_vlan, Some(1));
    assert_eq!(failure.suggested_fix.as_deref(), Some("switchport trunk native vlan 99"));
}

#[test]
fn implicit_native_vlans_do_not_fire() {
    let mut source_if = interface("d-a", "Gi1/0/24");
    source_if.mode = InterfaceMode::Trunk;
    source_if.vlan_native = Some(99);
    let mut target_if = interface("d-b", "Gi1/0/24");
    target_if.mode = InterfaceMode::Trunk;

    let input = TopologyInput {
        devices: vec![
            device("d-a", "SW-A", DeviceRole::Switch),
            device("d-b", "SW-B", DeviceRole::Switch),
        ],
        interfaces: vec![source_if, target_if],
        vlans: [vlans_for("d-a", &[99]), vlans_for("d-b", &[99])].concat(),
        links: vec![link("l-1", "d-a", "Gi1/0/24", "d-b", "Gi1/0/24", &[99])],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::TrunkNativeMismatch.run(&graph);
    assert!(findings.iter().all(|finding| finding.passed));
}
