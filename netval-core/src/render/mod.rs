// netval-core/src/render/mod.rs
// ============================================================================
// Module: CLI Renderer
// Description: Canonical device sub-model to deterministic CLI block.
// Purpose: Emit IOS-style configuration text byte-stably for any input.
// Dependencies: crate::model, crate::parser
// ============================================================================

//! ## Overview
//! The renderer is the parser's inverse on the recognized subset. VLANs sort
//! by id, interfaces by (interface-kind order, numeric path), and trunk
//! allow-lists render as compressed numeric ranges. Rendering is pure:
//! equal inputs produce byte-identical output, with no stray blank lines.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::model::InterfaceMode;
use crate::model::PortState;
use crate::parser::ParsedConfig;
use crate::parser::ParsedInterface;
use crate::parser::ranges::compress_vlan_ranges;

// ============================================================================
// SECTION: Interface Ordering
// ============================================================================

/// Sort key for interface names: kind rank, alpha prefix, numeric path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct InterfaceSortKey {
    /// Kind rank: physical ports first, SVIs last.
    rank: u8,
    /// Leading alphabetic prefix of the name.
    prefix: String,
    /// Numeric path components, for example `1/0/12` becomes `[1, 0, 12]`.
    path: Vec<u32>,
    /// Full name as the final tiebreak.
    name: String,
}

/// Computes the deterministic sort key for an interface name.
fn interface_sort_key(name: &str) -> InterfaceSortKey {
    let prefix: String = name.chars().take_while(|ch| ch.is_ascii_alphabetic()).collect();
    let rank = match prefix.as_str() {
        "Ethernet" | "FastEthernet" | "GigabitEthernet" | "TenGigabitEthernet"
        | "TwentyFiveGigE" | "FortyGigabitEthernet" | "HundredGigE" => 0,
        "Port" => 1,
        "Loopback" => 2,
        "Tunnel" => 3,
        "Vlan" => 4,
        _ => 5,
    };
    let mut path = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else if !current.is_empty() {
            path.push(current.parse::<u32>().unwrap_or(u32::MAX));
            current.clear();
        }
    }
    if !current.is_empty() {
        path.push(current.parse::<u32>().unwrap_or(u32::MAX));
    }
    InterfaceSortKey {
        rank,
        prefix,
        path,
        name: name.to_string(),
    }
}

// ============================================================================
// SECTION: Renderer
// ============================================================================

/// Renders a device sub-model as a deterministic CLI block.
#[must_use]
pub fn render_config(config: &ParsedConfig) -> String {
    let mut out = String::new();
    if let Some(hostname) = &config.hostname {
        out.push_str("hostname ");
        out.push_str(hostname);
        out.push_str("\n!\n");
    }
    let mut vlans = config.vlans.clone();
    vlans.sort_by_key(|record| record.id);
    for record in &vlans {
        out.push_str(&format!("vlan {}\n", record.id));
        if let Some(name) = &record.name {
            out.push_str(&format!(" name {name}\n"));
        }
        out.push_str("!\n");
    }
    let mut interfaces: Vec<&ParsedInterface> = config.interfaces.iter().collect();
    interfaces.sort_by_key(|iface| interface_sort_key(&iface.name));
    for iface in interfaces {
        render_interface(&mut out, iface);
    }
    out.push_str("end\n");
    out
}

/// Renders one interface stanza.
fn render_interface(out: &mut String, iface: &ParsedInterface) {
    out.push_str(&format!("interface {}\n", iface.name));
    if let Some(description) = &iface.description {
        out.push_str(&format!(" description {description}\n"));
    }
    match iface.mode {
        InterfaceMode::Access => {
            out.push_str(" switchport mode access\n");
            if let Some(vlan) = iface.vlan_access {
                out.push_str(&format!(" switchport access vlan {vlan}\n"));
            }
        }
        InterfaceMode::Trunk => {
            out.push_str(" switchport mode trunk\n");
            if let Some(native) = iface.vlan_native {
                out.push_str(&format!(" switchport trunk native vlan {native}\n"));
            }
            if !iface.vlan_trunk_allowed.is_empty() {
                out.push_str(&format!(
                    " switchport trunk allowed vlan {}\n",
                    compress_vlan_ranges(&iface.vlan_trunk_allowed)
                ));
            }
        }
        InterfaceMode::Routed => {
            if !iface.is_svi {
                out.push_str(" no switchport\n");
            }
            if let (Some(address), Some(mask)) = (&iface.ip_address, &iface.ip_mask) {
                out.push_str(&format!(" ip address {address} {mask}\n"));
            }
        }
        InterfaceMode::Unknown => {}
    }
    for helper in &iface.helper_addresses {
        out.push_str(&format!(" ip helper-address {helper}\n"));
    }
    if iface.duplex.is_explicit() {
        out.push_str(&format!(" duplex {}\n", iface.duplex.as_str()));
    }
    if iface.state == PortState::Down {
        out.push_str(" shutdown\n");
    }
    out.push_str("!\n");
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::interface_sort_key;

    #[test]
    fn physical_ports_sort_before_svis() {
        let gi = interface_sort_key("GigabitEthernet1/0/1");
        let vlan = interface_sort_key("Vlan10");
        assert!(gi < vlan);
    }

    #[test]
    fn numeric_paths_sort_numerically() {
        let two = interface_sort_key("GigabitEthernet1/0/2");
        let ten = interface_sort_key("GigabitEthernet1/0/10");
        assert!(two < ten);
    }

    #[test]
    fn duplex_auto_is_not_explicit() {
        use crate::model::DuplexMode;
        assert!(!DuplexMode::Auto.is_explicit());
        assert!(DuplexMode::Full.is_explicit());
    }
}
