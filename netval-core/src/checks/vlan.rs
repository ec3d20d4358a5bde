// netval-core/src/checks/vlan.rs
// ============================================================================
// Module: VLAN Checks
// Description: VLAN continuity, orphan SVIs, and native-VLAN agreement.
// Purpose: Verify layer-2 segment consistency across the topology.
// Dependencies: crate::checks, crate::topology
// ============================================================================

//! ## Overview
//! Layer-2 checks. Iteration is over edges sorted by link id and VLANs in
//! ascending order, so findings emit in a stable order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::checks::CheckKind;
use crate::checks::CheckResult;
use crate::topology::DeviceNode;
use crate::topology::TopologyGraph;

// ============================================================================
// SECTION: VLAN Continuity
// ============================================================================

/// For every edge, every VLAN on the allow-list must exist in both endpoint
/// VLAN databases.
pub(crate) fn vlan_continuity(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::VlanContinuity;
    let mut findings = Vec::new();
    for (edge, source, target) in graph.edges_sorted() {
        for vlan in &edge.allow_list {
            for node in [source, target] {
                if !node.vlans.contains(vlan) {
                    findings.push(
                        CheckResult::fail(
                            check.check_id(),
                            check.severity(),
                            format!(
                                "VLAN {vlan} allowed on link {} is missing from {}'s VLAN \
                                 database",
                                edge.link_id, node.hostname
                            ),
                        )
                        .on_device(&node.device_id, &node.hostname)
                        .on_link(&edge.link_id)
                        .with_vlan(*vlan)
                        .with_fix(format!("vlan {vlan}\n name VLAN{vlan}")),
                    );
                }
            }
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "every trunk allow-list VLAN is present on both endpoints",
        ));
    }
    findings
}

// ============================================================================
// SECTION: Orphan SVIs
// ============================================================================

/// For every interface named `Vlan<N>` with an IP, VLAN N must exist in the
/// owning device's VLAN database.
pub(crate) fn vlan_orphan_svi(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::VlanOrphanSvi;
    let mut findings = Vec::new();
    for node in graph.nodes() {
        for interface in node.interfaces.values() {
            let Some(vlan) = interface.svi_vlan() else {
                continue;
            };
            if !node.vlans.contains(&vlan) {
                findings.push(
                    CheckResult::fail(
                        check.check_id(),
                        check.severity(),
                        format!(
                            "SVI {} on {} is anchored on VLAN {vlan}, which is absent from the \
                             VLAN database",
                            interface.name, node.hostname
                        ),
                    )
                    .on_device(&node.device_id, &node.hostname)
                    .on_interface(&interface.name)
                    .with_vlan(vlan)
                    .with_fix(format!("vlan {vlan}\n name VLAN{vlan}")),
                );
            }
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "every SVI is anchored in its device's VLAN database",
        ));
    }
    findings
}

// ============================================================================
// SECTION: Native VLAN Agreement
// ============================================================================

/// Native VLANs on both endpoints of a trunk must match when both are
/// explicit.
pub(crate) fn trunk_native_mismatch(graph: &TopologyGraph) -> Vec<CheckResult> {
    let check = CheckKind::TrunkNativeMismatch;
    let mut findings = Vec::new();
    for (edge, source, target) in graph.edges_sorted() {
        let source_native = trunk_native(source, &edge.source_interface);
        let target_native = trunk_native(target, &edge.target_interface);
        let (Some(source_native), Some(target_native)) = (source_native, target_native) else {
            continue;
        };
        if source_native != target_native {
            findings.push(
                CheckResult::fail(
                    check.check_id(),
                    check.severity(),
                    format!(
                        "native VLAN mismatch on link {}: {} uses {source_native}, {} uses \
                         {target_native}",
                        edge.link_id, source.hostname, target.hostname
                    ),
                )
                .on_device(&target.device_id, &target.hostname)
                .on_interface(&edge.target_interface)
                .on_link(&edge.link_id)
                .with_vlan(source_native)
                .with_previous_vlan(target_native)
                .with_fix(format!("switchport trunk native vlan {source_native}")),
            );
        }
    }
    if findings.is_empty() {
        findings.push(CheckResult::pass(
            check.check_id(),
            "native VLANs agree on every trunk",
        ));
    }
    findings
}

/// Returns the explicit native VLAN of a trunk-mode interface.
fn trunk_native(node: &DeviceNode, interface: &str) -> Option<u16> {
    let interface = node.interfaces.get(interface)?;
    if interface.mode != crate::model::InterfaceMode::Trunk {
        return None;
    }
    interface.vlan_native
}
