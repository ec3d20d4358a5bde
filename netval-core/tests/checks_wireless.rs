// netval-core/tests/checks_wireless.rs
// ============================================================================
// Module: Wireless Join Chain Tests
// Description: Validate AP-to-WLC path and VLAN carriage findings.
// Purpose: Ensure hop numbering, failure detail, and the trunk-add fix.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! Scenario coverage: an AP whose access VLAN is dropped at the last trunk
//! hop must fail at that hop with the `switchport trunk allowed vlan add`
//! fix; a fully carried VLAN yields an info pass per (AP, WLC) pair.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::Utc;
use netval_core::checks::CheckKind;
use netval_core::checks::Severity;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::DeviceRole;
use netval_core::model::DeviceVlan;
use netval_core::model::DuplexMode;
use netval_core::model::Interface;
use netval_core::model::InterfaceId;
use netval_core::model::InterfaceMode;
use netval_core::model::Link;
use netval_core::model::LinkId;
use netval_core::model::LinkMedium;
use netval_core::model::LinkState;
use netval_core::model::PortState;
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

fn access_port(device: &str, name: &str, vlan: u16) -> Interface {
    Interface {
        id: InterfaceId::generate(),
        device_id: DeviceId::new(device),
        name: name.to_string(),
        description: None,
        mode: InterfaceMode::Access,
        vlan_access: Some(vlan),
        vlan_trunk_allowed: Vec::new(),
        vlan_native: None,
        ip_address: None,
        ip_mask: None,
        duplex: DuplexMode::Auto,
        helper_addresses: Vec::new(),
        state: PortState::Up,
    }
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

fn vlans_for(device: &str, ids: &[u16]) -> Vec<DeviceVlan> {
    ids.iter()
        .map(|vlan| DeviceVlan {
            device_id: DeviceId::new(device),
            vlan_id: *vlan,
            name: None,
        })
        .collect()
}

/// AP -> SW-ACCESS -> SW-CORE -> WLC chain; the second trunk's allow-list
/// is parameterized.
fn chain(second_trunk_allow: &[u16]) -> TopologyGraph {
    let input = TopologyInput {
        devices: vec![
            device("d-ap", "AP-01", DeviceRole::Ap),
            device("d-sw-access", "SW-ACCESS", DeviceRole::Switch),
            device("d-sw-core", "SW-CORE", DeviceRole::Switch),
            device("d-wlc", "WLC-01", DeviceRole::Wlc),
        ],
        interfaces: vec![access_port("d-ap", "GigabitEthernet0", 20)],
        vlans: [
            vlans_for("d-sw-access", &[10, 20, 30]),
            vlans_for("d-sw-core", &[10, 20, 30]),
        ]
        .concat(),
        links: vec![
            link("l-1", "d-ap", "GigabitEthernet0", "d-sw-access", "Gi1/0/5", &[]),
            link("l-2", "d-sw-access", "Gi1/0/24", "d-sw-core", "Gi1/0/1", &[10, 20, 30]),
            link("l-3", "d-sw-core", "Gi1/0/2", "d-wlc", "Port1", second_trunk_allow),
        ],
        parsed: Default::default(),
    };
    TopologyGraph::assemble(input).expect("assemble")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn blocked_last_hop_fails_at_hop_two() {
    let graph = chain(&[10, 30]);
    let findings = CheckKind::WlcJoinChain.run(&graph);
    let failure = findings.iter().find(|finding| !finding.passed).expect("blocked hop");
    assert_eq!(failure.check_id, "WLC_JOIN_CHAIN");
    assert_eq!(failure.detail, "AP VLAN 20 missing from trunk at hop 2");
    assert_eq!(failure.suggested_fix.as_deref(), Some("switchport trunk allowed vlan add 20"));
    assert_eq!(failure.hostname.as_deref(), Some("SW-CORE"));
    assert_eq!(failure.vlan, Some(20));
}

#[test]
fn carried_vlan_passes_per_pair() {
    let graph = chain(&[10, 20, 30]);
    let findings = CheckKind::WlcJoinChain.run(&graph);
    assert_eq!(findings.len(), 1);
    let pass = &findings[0];
    assert!(pass.passed);
    assert_eq!(pass.severity, Severity::Info);
    assert!(pass.detail.contains("AP-01"));
    assert!(pass.detail.contains("WLC-01"));
}

#[test]
fn ap_without_access_vlan_fails_with_fixed_detail() {
    let input = TopologyInput {
        devices: vec![
            device("d-ap", "AP-01", DeviceRole::Ap),
            device("d-sw", "SW-01", DeviceRole::Switch),
            device("d-wlc", "WLC-01", DeviceRole::Wlc),
        ],
        interfaces: Vec::new(),
        vlans: Vec::new(),
        links: vec![
            link("l-1", "d-ap", "GigabitEthernet0", "d-sw", "Gi1/0/5", &[]),
            link("l-2", "d-sw", "Gi1/0/24", "d-wlc", "Port1", &[]),
        ],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::WlcJoinChain.run(&graph);
    assert_eq!(findings.len(), 1);
    assert!(!findings[0].passed);
    assert_eq!(findings[0].detail, "AP uplink has no access VLAN.");
}

#[test]
fn disconnected_wlc_reports_no_path() {
    let input = TopologyInput {
        devices: vec![
            device("d-ap", "AP-01", DeviceRole::Ap),
            device("d-sw", "SW-01", DeviceRole::Switch),
            device("d-wlc", "WLC-01", DeviceRole::Wlc),
        ],
        interfaces: vec![access_port("d-ap", "GigabitEthernet0", 20)],
        vlans: vlans_for("d-sw", &[20]),
        links: vec![link("l-1", "d-ap", "GigabitEthernet0", "d-sw", "Gi1/0/5", &[])],
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    let findings = CheckKind::WlcJoinChain.run(&graph);
    assert_eq!(findings.len(), 1);
    assert!(!findings[0].passed);
    assert!(findings[0].detail.contains("no path"));
}

#[test]
fn no_aps_or_wlcs_yields_no_findings() {
    let input = TopologyInput {
        devices: vec![device("d-sw", "SW-01", DeviceRole::Switch)],
        interfaces: Vec::new(),
        vlans: Vec::new(),
        links: Vec::new(),
        parsed: Default::default(),
    };
    let graph = TopologyGraph::assemble(input).expect("assemble");
    assert!(CheckKind::WlcJoinChain.run(&graph).is_empty());
}
