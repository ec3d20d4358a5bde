// netval-core/tests/render_roundtrip.rs
// ============================================================================
// Module: Renderer Round-Trip Tests
// Description: Validate deterministic rendering and parser inversion.
// Purpose: Ensure render(parse(render(d))) == render(d) on the recognized
//          subset.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! The renderer must be pure and byte-stable, and the parser must recover
//! everything the renderer emits. Round-trip stability holds on the
//! recognized subset.

// ============================================================================
// SECTION: Imports
// ============================================================================

use netval_core::parser::parse_running_config;
use netval_core::render::render_config;

// ============================================================================
// SECTION: Fixture
// ============================================================================

const FIXTURE: &str = "\
hostname SW-CORE-01
!
vlan 20
 name VOICE
!
vlan 10
 name USERS
!
interface GigabitEthernet1/0/10
 switchport mode access
 switchport access vlan 10
!
interface GigabitEthernet1/0/2
 description uplink
 switchport mode trunk
 switchport trunk native vlan 99
 switchport trunk allowed vlan 10,20-22,30
!
interface Vlan10
 ip address 10.1.10.1 255.255.255.0
!
interface GigabitEthernet1/0/1
 no switchport
 ip address 10.9.9.1 255.255.255.252
 shutdown
!
end
";

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn rendering_is_byte_stable() {
    let parsed = parse_running_config(FIXTURE);
    let first = render_config(&parsed);
    let second = render_config(&parsed);
    assert_eq!(first, second);
}

#[test]
fn rendering_sorts_vlans_and_interfaces() {
    let parsed = parse_running_config(FIXTURE);
    let rendered = render_config(&parsed);
    let vlan10 = rendered.find("vlan 10").expect("vlan 10 present");
    let vlan20 = rendered.find("vlan 20").expect("vlan 20 present");
    assert!(vlan10 < vlan20, "vlans must sort by id");
    let gi1 = rendered.find("interface GigabitEthernet1/0/1\n").expect("gi1");
    let gi2 = rendered.find("interface GigabitEthernet1/0/2\n").expect("gi2");
    let gi10 = rendered.find("interface GigabitEthernet1/0/10\n").expect("gi10");
    let svi = rendered.find("interface Vlan10\n").expect("svi");
    assert!(gi1 < gi2 && gi2 < gi10 && gi10 < svi, "interfaces must sort by kind then path");
    assert!(rendered.ends_with("end\n"));
    assert!(!rendered.contains("\n\n"), "no stray blank lines");
}

#[test]
fn trunk_allow_list_renders_compressed() {
    let parsed = parse_running_config(FIXTURE);
    let rendered = render_config(&parsed);
    assert!(rendered.contains(" switchport trunk allowed vlan 10,20-22,30\n"));
}

#[test]
fn round_trip_is_stable() {
    let parsed = parse_running_config(FIXTURE);
    let rendered = render_config(&parsed);
    let reparsed = parse_running_config(&rendered);
    let rerendered = render_config(&reparsed);
    assert_eq!(rendered, rerendered);
}

#[test]
fn round_trip_preserves_submodel() {
    let parsed = parse_running_config(FIXTURE);
    let reparsed = parse_running_config(&render_config(&parsed));
    assert_eq!(parsed.hostname, reparsed.hostname);

    let mut original_vlans: Vec<u16> = parsed.vlans.iter().map(|vlan| vlan.id).collect();
    original_vlans.sort_unstable();
    let reparsed_vlans: Vec<u16> = reparsed.vlans.iter().map(|vlan| vlan.id).collect();
    assert_eq!(original_vlans, reparsed_vlans);

    for iface in &parsed.interfaces {
        let round = reparsed.interface(&iface.name).expect("interface survives round trip");
        assert_eq!(iface.mode, round.mode, "mode of {}", iface.name);
        assert_eq!(iface.vlan_access, round.vlan_access);
        assert_eq!(iface.vlan_trunk_allowed, round.vlan_trunk_allowed);
        assert_eq!(iface.vlan_native, round.vlan_native);
        assert_eq!(iface.ip_address, round.ip_address);
        assert_eq!(iface.state, round.state);
        assert_eq!(iface.is_svi, round.is_svi);
    }
}
