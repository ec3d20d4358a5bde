// netval-core/src/checks/port.rs
// ============================================================================
// Module: Port Checks
// Description: DHCP reachability and duplex agreement.
// Purpose: Verify access-layer serviceability assumptions.
// Dependencies: crate::checks, crate::topology
// ============================================================================

//! ## Overview
//! `DHCP_REACHABILITY` is warning-only: an access-VLAN SVI passes when it
//! carries a helper address, or when a device holding that VLAN declares a
//! DHCP pool and is reachable from the SVI's device. `DUPLEX_MISMATCH`
//! compares endpoints only when both sides forced an explicit duplex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::checks::CheckKind;
use crate::checks::CheckResult;
use crate::topology::TopologyGraph;

// ============================================================================
// SECTION: DHCP Reachability
// ============================================================================

/// For each access-VLAN SVI, a DHCP server declaration must be reachable.
pub(crate) fn dhcp_reachability(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::DhcpReachability;
    let mut findings = Vec::new();
    for node in graph.nodes() {
        for interface in node.interfaces.values() {
            let Some(vlan) = interface.svi_vlan() else {
                continue;
            };
            if !interface.helper_addresses.is_empty() {
                findings.push(CheckResult::pass(
                    check.check_id(),
                    format!(
                        "SVI {} on {} relays DHCP via helper address",
                        interface.name, node.hostname
                    ),
                ));
                continue;
            }
            let served = graph.nodes().any(|candidate| {
                candidate.has_dhcp_pool
                    && candidate.vlans.contains(&vlan)
                    && (candidate.device_id == node.device_id
                        || graph.has_path(&node.device_id, &candidate.device_id))
            });
            if served {
                findings.push(CheckResult::pass(
                    check.check_id(),
                    format!(
                        "SVI {} on {} reaches a DHCP pool serving VLAN {vlan}",
                        interface.name, node.hostname
                    ),
                ));
            } else {
                findings.push(
                    CheckResult::fail(
                        check.check_id(),
                        check.severity(),
                        format!(
                            "no DHCP server declaration reachable for SVI {} (VLAN {vlan}) on {}",
                            interface.name, node.hostname
                        ),
                    )
                    .on_device(&node.device_id, &node.hostname)
                    .on_interface(&interface.name)
                    .with_vlan(vlan),
                );
            }
        }
    }
    findings
}

// ============================================================================
// SECTION: Duplex Agreement
// ============================================================================

/// Interface duplex settings on both endpoints of a link must agree when
/// both are explicit.
pub(crate) fn duplex_mismatch(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::DuplexMismatch;
    let mut findings = Vec::new();
    for (edge, source, target) in graph.edges_sorted() {
        let source_duplex = source
            .interfaces
            .get(&edge.source_interface)
            .map(|interface| interface.duplex)
            .filter(|duplex| duplex.is_explicit());
        let target_duplex = target
            .interfaces
            .get(&edge.target_interface)
            .map(|interface| interface.duplex)
            .filter(|duplex| duplex.is_explicit());
        let (Some(source_duplex), Some(target_duplex)) = (source_duplex, target_duplex) else {
            continue;
        };
        if source_duplex != target_duplex {
            findings.push(
                CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    format!(
                        "duplex mismatch on link {}: {} forces {}, {} forces {}",
                        edge.link_id,
                        source.hostname,
                        source_duplex.as_str(),
                        target.hostname,
                        target_duplex.as_str()
                    ),
                )
                .on_device(&target.device_id, &target.hostname)
                .on_interface(&edge.target_interface)
                .on_link(&edge.link_id)
                .with_fix(format!("duplex {}", source_duplex.as_str())),
            );
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "explicit duplex settings agree on every link",
        ));
    }
    findings
}
