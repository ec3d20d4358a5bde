// netval-core/src/checks/routing.rs
// ============================================================================
// Module: Routing Checks
// Description: Management SSH path and static-route next-hop resolution.
// Purpose: Verify layer-3 reachability assumptions in the design.
// Dependencies: crate::checks, crate::topology
// ============================================================================

//! ## Overview
//! `MGMT_SSH_PATH` designates the lexically-first endpoint-role device as
//! the management source; with no such device the check passes vacuously.
//! `ROUTING_BLACKHOLE` resolves each static-route next hop against the
//! owning device's routed and SVI interface subnets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::checks::CheckKind;
use crate::checks::CheckResult;
use crate::checks::ipv4::in_subnet;
use crate::model::DeviceRole;
use crate::model::InterfaceMode;
use crate::topology::DeviceNode;
use crate::topology::TopologyGraph;

// ============================================================================
// SECTION: Management SSH Path
// ============================================================================

/// Every device's management IP must lie on a VLAN reachable from the
/// designated management source, if one exists.
pub(crate) fn mgmt_ssh_path(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::MgmtSshPath;
    let Some(source) = graph.nodes_with_role(DeviceRole::Endpoint).next() else {
        return vec![CheckResult::pass(
            check.check_id(),
            "no management source designated; check passes vacuously",
        )];
    };

    let mut findings = Vec::new();
    for node in graph.nodes() {
        if node.device_id == source.device_id {
            continue;
        }
        let Some(management_ip) = &node.management_ip else {
            continue;
        };
        let Some(path) = graph.shortest_path(&source.device_id, &node.device_id) else {
            findings.push(
                CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    format!(
                        "no path from management source {} to {}",
                        source.hostname, node.hostname
                    ),
                )
                .on_device(&node.device_id, &node.hostname),
            );
            continue;
        };
        let mut anchored = svi_covering(node, management_ip).is_some();
        if !anchored {
            for hop in &path {
                for device in [&hop.from, &hop.to] {
                    if let Some(hop_node) = graph.node(device) {
                        if svi_covering(hop_node, management_ip).is_some() {
                            anchored = true;
                        }
                    }
                }
            }
        }
        if anchored {
            findings.push(CheckResult::pass(
                check.check_id(),
                format!(
                    "management IP {management_ip} of {} is reachable from {}",
                    node.hostname, source.hostname
                ),
            ));
        } else {
            findings.push(
                CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    format!(
                        "management IP {management_ip} of {} is not anchored on any SVI subnet \
                         along the path from {}",
                        node.hostname, source.hostname
                    ),
                )
                .on_device(&node.device_id, &node.hostname),
            );
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "no devices carry a management IP",
        ));
    }
    findings
}

/// Finds an SVI on the node whose subnet contains the address.
fn svi_covering<'node>(
    node: &'node DeviceNode,
    address: &str,
) -> Option<&'node crate::model::Interface> {
    node.interfaces.values().find(|interface| {
        interface.svi_vlan().is_some()
            && matches!(
                (&interface.ip_address, &interface.ip_mask),
                (Some(network), Some(mask)) if in_subnet(address, network, mask)
            )
    })
}

// ============================================================================
// SECTION: Static Route Resolution
// ============================================================================

/// Static routes on a device must have a next hop resolvable on one of its
/// routed or SVI interfaces.
pub(crate) fn routing_blackhole(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::RoutingBlackhole;
    let mut findings = Vec::new();
    for node in graph.nodes() {
        for route in &node.static_routes {
            let resolvable = node.interfaces.values().any(|interface| {
                if interface.mode != InterfaceMode::Routed && interface.svi_vlan().is_none() {
                    return false;
                }
                matches!(
                    (&interface.ip_address, &interface.ip_mask),
                    (Some(network), Some(mask)) if in_subnet(&route.next_hop, network, mask)
                )
            });
            if !resolvable {
                findings.push(
                    CheckResult::fail(
                        check.check_id(),
                        check.severity(),
                        format!(
                            "static route {} {} via {} on {} has no resolvable next hop on any \
                             routed or SVI interface",
                            route.prefix, route.mask, route.next_hop, node.hostname
                        ),
                    )
                    .on_device(&node.device_id, &node.hostname)
                    .with_fix(format!("no ip route {} {} {}", route.prefix, route.mask, route.next_hop)),
                );
            }
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "every static-route next hop resolves locally",
        ));
    }
    findings
}
