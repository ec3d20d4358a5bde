// netval-core/src/checks/wireless.rs
// ============================================================================
// Module: Wireless Join Chain Check
// Description: AP to WLC path and VLAN carriage verification.
// Purpose: Verify every AP can join every WLC over its access VLAN.
// Dependencies: crate::checks, crate::topology
// ============================================================================

//! ## Overview
//! For each (AP, WLC) pair the check walks the shortest path and verifies
//! the AP's access VLAN is carried by every trunk hop. Hops are counted over
//! edges with a non-empty allow-list; an empty allow-list means the link is
//! unrestricted and passes. AP and WLC sets iterate in device-id lexical
//! order and path tie-breaks are lexical, so findings are stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::checks::CheckKind;
use crate::checks::CheckResult;
use crate::model::DeviceRole;
use crate::model::InterfaceMode;
use crate::topology::DeviceNode;
use crate::topology::TopologyGraph;

// ============================================================================
// SECTION: Join Chain
// ============================================================================

/// Runs the wireless join-chain verification for every (AP, WLC) pair.
pub(crate) fn wlc_join_chain(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::WlcJoinChain;
    let aps: Vec<&DeviceNode> = graph.nodes_with_role(DeviceRole::Ap).collect();
    let wlcs: Vec<&DeviceNode> = graph.nodes_with_role(DeviceRole::Wlc).collect();
    if aps.is_empty() || wlcs.is_empty() {
        return Vec::new();
    }

    let mut findings = Vec::new();
    for ap in &aps {
        let Some(ap_vlan) = ap_uplink_vlan(graph, ap) else {
            findings.push(
                CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    "AP uplink has no access VLAN.",
                )
                .on_device(&ap.device_id, &ap.hostname),
            );
            continue;
        };
        for wlc in &wlcs {
            let Some(path) = graph.shortest_path(&ap.device_id, &wlc.device_id) else {
                findings.push(
                    CheckResult::fail(
                        check.check_id(),
                        check.severity(),
                        format!("no path from AP {} to WLC {}", ap.hostname, wlc.hostname),
                    )
                    .on_device(&ap.device_id, &ap.hostname),
                );
                continue;
            };
            let mut blocked = false;
            let mut hop_index = 0usize;
            for hop in &path {
                if hop.edge.allow_list.is_empty() {
                    continue;
                }
                hop_index += 1;
                if hop.edge.allow_list.contains(&ap_vlan) {
                    continue;
                }
                blocked = true;
                let (hop_device, hop_interface) = hop_switch(graph, hop);
                let mut finding = CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    format!("AP VLAN {ap_vlan} missing from trunk at hop {hop_index}"),
                )
                .on_link(&hop.edge.link_id)
                .with_vlan(ap_vlan)
                .with_fix(format!("switchport trunk allowed vlan add {ap_vlan}"));
                if let Some(node) = hop_device {
                    finding = finding.on_device(&node.device_id, &node.hostname);
                }
                if let Some(interface) = hop_interface {
                    finding = finding.on_interface(&interface);
                }
                findings.push(finding);
            }
            if !blocked {
                findings.push(CheckResult::pass(
                    check.check_id(),
                    format!(
                        "AP {} reaches WLC {} with VLAN {ap_vlan} carried on every hop",
                        ap.hostname, wlc.hostname
                    ),
                ));
            }
        }
    }
    findings
}

/// Finds the AP uplink access VLAN: the single access-mode port whose link
/// peer is a switch.
fn ap_uplink_vlan(graph: &TopologyGraph, ap: &DeviceNode) -> Option<u16> {
    for edge in graph.edges_of(&ap.device_id) {
        let peer = edge.peer_of(&ap.device_id)?;
        let peer_node = graph.node(peer)?;
        if peer_node.role != DeviceRole::Switch {
            continue;
        }
        let interface_name = edge.interface_on(&ap.device_id)?;
        let Some(interface) = ap.interfaces.get(interface_name) else {
            continue;
        };
        if interface.mode == InterfaceMode::Access {
            if let Some(vlan) = interface.vlan_access {
                return Some(vlan);
            }
        }
    }
    None
}

/// Picks the switch to repair at a failing hop, preferring the side nearer
/// the AP, together with its interface on the edge.
fn hop_switch<'graph>(
    graph: &'graph TopologyGraph,
    hop: &crate::topology::PathHop,
) -> (Option<&'graph DeviceNode>, Option<String>) {
    let near = graph.node(&hop.from);
    let far = graph.node(&hop.to);
    let chosen = match (near, far) {
        (Some(node), _) if node.role == DeviceRole::Switch => Some(node),
        (_, Some(node)) if node.role == DeviceRole::Switch => Some(node),
        (Some(node), _) => Some(node),
        (None, other) => other,
    };
    let interface = chosen
        .and_then(|node| hop.edge.interface_on(&node.device_id))
        .map(ToString::to_string);
    (chosen, interface)
}
