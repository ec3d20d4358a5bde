// netval-core/tests/parser.rs
// ============================================================================
// Module: Parser Tests
// Description: Validate IOS configuration parsing behavior.
// Purpose: Ensure normalization, range expansion, and warning semantics.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! Conformance tests for the configuration parser: mode classification, SVI
//! detection, trunk range expansion with clamping, warning-not-error handling
//! of unknown stanzas, and byte-level determinism.

// ============================================================================
// SECTION: Imports
// ============================================================================

use netval_core::model::DuplexMode;
use netval_core::model::InterfaceMode;
use netval_core::model::PortState;
use netval_core::parser::parse_running_config;

// ============================================================================
// SECTION: Fixture
// ============================================================================

const FIXTURE: &str = "\
hostname SW-ACCESS-01
!
vlan 10
 name USERS
!
vlan 20
 name VOICE
!
interface GigabitEthernet1/0/1
 description user port
 switchport mode access
 switchport access vlan 10
 duplex full
!
interface GigabitEthernet1/0/24
 description uplink to core
 switchport mode trunk
 switchport trunk native vlan 99
 switchport trunk allowed vlan 10,20-22,30
!
interface GigabitEthernet1/0/2
 no switchport
 ip address 10.9.9.1 255.255.255.252
!
interface Vlan10
 ip address 10.1.10.1 255.255.255.0
 ip helper-address 10.1.99.5
!
interface GigabitEthernet1/0/3
 shutdown
!
router ospf 10
 network 10.0.0.0 0.255.255.255 area 0
!
ip route 0.0.0.0 0.0.0.0 10.9.9.2
!
ip dhcp pool USERS
 network 10.1.10.0 255.255.255.0
!
access-list 10 permit 10.1.10.0 0.0.0.255
!
ip access-list extended MGMT
 permit tcp any any eq 22
!
end
";

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn parses_hostname_and_vlans() {
    let parsed = parse_running_config(FIXTURE);
    assert_eq!(parsed.hostname.as_deref(), Some("SW-ACCESS-01"));
    let ids: Vec<u16> = parsed.vlans.iter().map(|vlan| vlan.id).collect();
    assert_eq!(ids, vec![10, 20]);
    assert_eq!(parsed.vlans[0].name.as_deref(), Some("USERS"));
}

#[test]
fn classifies_interface_modes() {
    let parsed = parse_running_config(FIXTURE);
    let access = parsed.interface("GigabitEthernet1/0/1").expect("access port");
    assert_eq!(access.mode, InterfaceMode::Access);
    assert_eq!(access.vlan_access, Some(10));
    assert_eq!(access.duplex, DuplexMode::Full);

    let trunk = parsed.interface("GigabitEthernet1/0/24").expect("trunk port");
    assert_eq!(trunk.mode, InterfaceMode::Trunk);
    assert_eq!(trunk.vlan_native, Some(99));
    assert_eq!(trunk.vlan_trunk_allowed, vec![10, 20, 21, 22, 30]);

    let routed = parsed.interface("GigabitEthernet1/0/2").expect("routed port");
    assert_eq!(routed.mode, InterfaceMode::Routed);
    assert_eq!(routed.ip_address.as_deref(), Some("10.9.9.1"));
    assert!(!routed.is_svi);
}

#[test]
fn flags_svi_interfaces() {
    let parsed = parse_running_config(FIXTURE);
    let svi = parsed.interface("Vlan10").expect("svi");
    assert!(svi.is_svi);
    assert_eq!(svi.svi_vlan(), Some(10));
    assert_eq!(svi.helper_addresses, vec!["10.1.99.5".to_string()]);
}

#[test]
fn shutdown_maps_to_down_state() {
    let parsed = parse_running_config(FIXTURE);
    let down = parsed.interface("GigabitEthernet1/0/3").expect("shut port");
    assert_eq!(down.state, PortState::Down);
    let up = parsed.interface("GigabitEthernet1/0/1").expect("open port");
    assert_eq!(up.state, PortState::Up);
}

#[test]
fn collects_routing_and_services() {
    let parsed = parse_running_config(FIXTURE);
    assert_eq!(parsed.routing_protocols.len(), 1);
    assert_eq!(parsed.routing_protocols[0].protocol, "ospf");
    assert_eq!(parsed.routing_protocols[0].process_id.as_deref(), Some("10"));

    assert_eq!(parsed.static_routes.len(), 1);
    assert_eq!(parsed.static_routes[0].next_hop, "10.9.9.2");

    assert_eq!(parsed.dhcp_pools, vec!["USERS".to_string()]);
    let names: Vec<&str> = parsed.acls.iter().map(|acl| acl.name.as_str()).collect();
    assert_eq!(names, vec!["10", "MGMT"]);
}

#[test]
fn unknown_stanza_warns_but_never_fails() {
    let config = "hostname X\n!\nsnmp-server community public RO\n!\nend\n";
    let parsed = parse_running_config(config);
    assert_eq!(parsed.hostname.as_deref(), Some("X"));
    assert!(parsed.unrecognized.iter().any(|line| line.contains("snmp-server")));
    assert_eq!(parsed.warnings.len(), 1);
}

#[test]
fn out_of_range_vlans_clamp_with_warning() {
    let config = "\
interface GigabitEthernet1/0/5
 switchport mode trunk
 switchport trunk allowed vlan 10,4095
!
vlan 5000
!
end
";
    let parsed = parse_running_config(config);
    let trunk = parsed.interface("GigabitEthernet1/0/5").expect("trunk");
    assert_eq!(trunk.vlan_trunk_allowed, vec![10]);
    assert!(parsed.vlans.is_empty());
    assert_eq!(parsed.warnings.len(), 2);
}

#[test]
fn allowed_vlan_keywords() {
    let config = "\
interface GigabitEthernet1/0/6
 switchport mode trunk
 switchport trunk allowed vlan none
!
interface GigabitEthernet1/0/7
 switchport mode trunk
 switchport trunk allowed vlan all
!
interface GigabitEthernet1/0/8
 switchport mode trunk
 switchport trunk allowed vlan 10
 switchport trunk allowed vlan add 20-21
 switchport trunk allowed vlan remove 10
!
end
";
    let parsed = parse_running_config(config);
    assert!(parsed.interface("GigabitEthernet1/0/6").expect("g6").vlan_trunk_allowed.is_empty());
    assert!(parsed.interface("GigabitEthernet1/0/7").expect("g7").vlan_trunk_allowed.is_empty());
    assert_eq!(
        parsed.interface("GigabitEthernet1/0/8").expect("g8").vlan_trunk_allowed,
        vec![20, 21]
    );
}

#[test]
fn inverted_range_yields_empty_set() {
    let config = "\
interface GigabitEthernet1/0/9
 switchport mode trunk
 switchport trunk allowed vlan 15-12
!
end
";
    let parsed = parse_running_config(config);
    assert!(parsed.interface("GigabitEthernet1/0/9").expect("g9").vlan_trunk_allowed.is_empty());
    assert_eq!(parsed.warnings.len(), 1);
}

#[test]
fn crlf_input_normalizes() {
    let config = "hostname A\r\n!\r\nvlan 10\r\n name X\r\n!\r\nend\r\n";
    let parsed = parse_running_config(config);
    assert_eq!(parsed.hostname.as_deref(), Some("A"));
    assert_eq!(parsed.vlans.len(), 1);
}

#[test]
fn identical_input_yields_identical_output() {
    let first = parse_running_config(FIXTURE);
    let second = parse_running_config(FIXTURE);
    assert_eq!(first, second);
    let first_json = serde_json::to_string(&first).expect("encode");
    let second_json = serde_json::to_string(&second).expect("encode");
    assert_eq!(first_json, second_json);
}
