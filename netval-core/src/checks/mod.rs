// netval-core/src/checks/mod.rs
// ============================================================================
// Module: Validation Check Engine
// Description: Fixed check registry, deterministic scheduler, audit results.
// Purpose: Run registered checks over an assembled topology reproducibly.
// Dependencies: crate::model, crate::topology, serde
// ============================================================================

//! ## Overview
//! The check abstraction is a sum type over a fixed registry rather than
//! open subclassing: each check is a named variant with a pure
//! `run(&TopologyGraph) -> Vec<CheckResult>` function. Registry order is
//! fixed, collections are sorted before iteration, and path tie-breaks are
//! lexical, so two runs over unchanged inputs yield byte-identical audit
//! results. A check that panics or overruns its budget is reported as an
//! `<id>_INTERNAL` error finding; the remaining checks still run.

pub mod ipv4;
mod port;
mod routing;
mod vlan;
mod wireless;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::model::DeviceId;
use crate::model::LinkId;
use crate::model::ProjectId;
use crate::model::hashing::hash_canonical_json;
use crate::topology::TopologyGraph;

// ============================================================================
// SECTION: Check Contract
// ============================================================================

/// Default severity a check reports failures at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The design will not work as deployed.
    Error,
    /// The design is degraded or fragile.
    Warning,
    /// Informational, including pass findings.
    Info,
}

/// One finding produced by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Stable identifier of the producing check.
    pub check_id: String,
    /// Severity of this finding.
    pub severity: Severity,
    /// True when the finding reports a pass.
    pub passed: bool,
    /// Affected device, when device-scoped.
    pub device_id: Option<DeviceId>,
    /// Hostname of the affected device, kept so the result renders without
    /// re-reading the topology.
    pub hostname: Option<String>,
    /// Affected interface name, when interface-scoped.
    pub interface: Option<String>,
    /// Affected link, when link-scoped; drives link-state refresh.
    pub link_id: Option<LinkId>,
    /// Human-readable detail.
    pub detail: String,
    /// Suggested CLI fragment fixing the finding.
    pub suggested_fix: Option<String>,
    /// VLAN the finding refers to, for remediation templates.
    pub vlan: Option<u16>,
    /// Prior VLAN value, for remediation rollback templates.
    pub previous_vlan: Option<u16>,
}

impl CheckResult {
    /// Creates a pass finding for a check.
    #[must_use]
    pub fn pass(check_id: &str, detail: impl Into<String>) -> Self {
        Self {
            check_id: check_id.to_string(),
            severity: Severity::Info,
            passed: true,
            device_id: None,
            hostname: None,
            interface: None,
            link_id: None,
            detail: detail.into(),
            suggested_fix: None,
            vlan: None,
            previous_vlan: None,
        }
    }

    /// Creates a failure finding at the check's default severity.
    #[must_use]
    pub fn fail(check_id: &str, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            check_id: check_id.to_string(),
            severity,
            passed: false,
            device_id: None,
            hostname: None,
            interface: None,
            link_id: None,
            detail: detail.into(),
            suggested_fix: None,
            vlan: None,
            previous_vlan: None,
        }
    }

    /// Attaches the affected device.
    #[must_use]
    pub fn on_device(mut self, device_id: &DeviceId, hostname: &str) -> Self {
        self.device_id = Some(device_id.clone());
        self.hostname = Some(hostname.to_string());
        self
    }

    /// Attaches the affected interface.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    /// Attaches the affected link.
    #[must_use]
    pub fn on_link(mut self, link: &LinkId) -> Self {
        self.link_id = Some(link.clone());
        self
    }

    /// Attaches the suggested fix fragment.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Attaches the VLAN the finding refers to.
    #[must_use]
    pub const fn with_vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    /// Attaches the prior VLAN value for rollback rendering.
    #[must_use]
    pub const fn with_previous_vlan(mut self, vlan: u16) -> Self {
        self.previous_vlan = Some(vlan);
        self
    }
}

// ============================================================================
// SECTION: Check Registry
// ============================================================================

/// The fixed set of registered checks.
///
/// Adding a check is additive to [`registry`] and preserves deterministic
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Every VLAN on an edge allow-list exists in both endpoint databases.
    VlanContinuity,
    /// Every SVI's VLAN exists in the owning device's database.
    VlanOrphanSvi,
    /// Every AP can reach every WLC with its access VLAN carried end to end.
    WlcJoinChain,
    /// Native VLANs agree on both ends of a trunk.
    TrunkNativeMismatch,
    /// Management IPs are reachable from the designated management source.
    MgmtSshPath,
    /// Static-route next hops resolve on a local routed or SVI interface.
    RoutingBlackhole,
    /// Access-VLAN SVIs can reach a DHCP server declaration.
    DhcpReachability,
    /// Explicit duplex settings agree on both ends of a link.
    DuplexMismatch,
}

impl CheckKind {
    /// Returns the stable check identifier.
    #[must_use]
    pub const fn check_id(self) -> &'static str {
        match self {
            Self::VlanContinuity => "VLAN_CONTINUITY",
            Self::VlanOrphanSvi => "VLAN_ORPHAN_SVI",
            Self::WlcJoinChain => "WLC_JOIN_CHAIN",
            Self::TrunkNativeMismatch => "TRUNK_NATIVE_MISMATCH",
            Self::MgmtSshPath => "MGMT_SSH_PATH",
            Self::RoutingBlackhole => "ROUTING_BLACKHOLE",
            Self::DhcpReachability => "DHCP_REACHABILITY",
            Self::DuplexMismatch => "DUPLEX_MISMATCH",
        }
    }

    /// Returns the human-readable check name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VlanContinuity => "VLAN continuity across trunks",
            Self::VlanOrphanSvi => "SVI anchored in VLAN database",
            Self::WlcJoinChain => "AP to WLC join chain",
            Self::TrunkNativeMismatch => "Trunk native VLAN agreement",
            Self::MgmtSshPath => "Management SSH path",
            Self::RoutingBlackhole => "Static route next-hop resolution",
            Self::DhcpReachability => "DHCP reachability for access VLANs",
            Self::DuplexMismatch => "Duplex agreement on links",
        }
    }

    /// Returns the default severity for failures of this check.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::VlanContinuity
            | Self::VlanOrphanSvi
            | Self::WlcJoinChain
            | Self::MgmtSshPath
            | Self::RoutingBlackhole => Severity::Error,
            Self::TrunkNativeMismatch | Self::DhcpReachability | Self::DuplexMismatch => {
                Severity::Warning
            }
        }
    }

    /// Runs the check over an assembled topology.
    #[must_use]
    pub fn run(self, graph: &TopologyGraph) -> Vec<CheckResult> {
        match self {
            Self::VlanContinuity => vlan::vlan_continuity(graph),
            Self::VlanOrphanSvi => vlan::vlan_orphan_svi(graph),
            Self::WlcJoinChain => wireless::wlc_join_chain(graph),
            Self::TrunkNativeMismatch => vlan::trunk_native_mismatch(graph),
            Self::MgmtSshPath => routing::mgmt_ssh_path(graph),
            Self::RoutingBlackhole => routing::routing_blackhole(graph),
            Self::DhcpReachability => port::dhcp_reachability(graph),
            Self::DuplexMismatch => port::duplex_mismatch(graph),
        }
    }
}

/// The registry, in fixed execution order.
#[must_use]
pub const fn registry() -> &'static [CheckKind] {
    &[
        CheckKind::VlanContinuity,
        CheckKind::VlanOrphanSvi,
        CheckKind::WlcJoinChain,
        CheckKind::TrunkNativeMismatch,
        CheckKind::MgmtSshPath,
        CheckKind::RoutingBlackhole,
        CheckKind::DhcpReachability,
        CheckKind::DuplexMismatch,
    ]
}

// ============================================================================
// SECTION: Audit Result
// ============================================================================

/// Aggregate counters over all findings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Total findings.
    pub total: usize,
    /// Pass findings.
    pub passed: usize,
    /// Failure findings.
    pub failed: usize,
    /// Failure findings at error severity.
    pub errors: usize,
    /// Failure findings at warning severity.
    pub warnings: usize,
}

/// Self-describing audit result: renderable without re-reading the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    /// Project the audit ran over.
    pub project_id: ProjectId,
    /// Timestamp the audit was requested, pinned by the job.
    pub generated_at: DateTime<Utc>,
    /// All findings in registry-then-emission order.
    pub results: Vec<CheckResult>,
    /// Aggregate counters.
    pub summary: AuditSummary,
    /// Dense reachability matrix for all ordered device pairs, by hostname.
    pub reachability: BTreeMap<String, BTreeMap<String, bool>>,
    /// Canonical content hash over everything except `generated_at`.
    pub result_hash: String,
}

/// Hash view excluding the request timestamp, so reruns over unchanged
/// inputs produce the same digest.
#[derive(Serialize)]
struct AuditHashView<'a> {
    project_id: &'a ProjectId,
    results: &'a [CheckResult],
    summary: &'a AuditSummary,
    reachability: &'a BTreeMap<String, BTreeMap<String, bool>>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Wall-clock budget one check may spend before being flagged.
const PER_CHECK_BUDGET: Duration = Duration::from_secs(2);

/// Progress events emitted between checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A check is about to run.
    CheckStart {
        /// Stable check identifier.
        check_id: String,
    },
    /// A check finished.
    CheckComplete {
        /// Stable check identifier.
        check_id: String,
        /// Number of failure findings it produced.
        failed: usize,
    },
}

/// Runs every registered check over the graph and aggregates the result.
///
/// `progress` is invoked between checks in submission order. The graph is
/// immutable for the duration of the pass; checks are CPU code and never
/// suspend.
pub fn run_audit(
    graph: &TopologyGraph,
    project_id: &ProjectId,
    generated_at: DateTime<Utc>,
    progress: &mut dyn FnMut(EngineEvent),
) -> AuditResult {
    let mut results = Vec::new();
    for check in registry() {
        let check_id = check.check_id();
        progress(EngineEvent::CheckStart {
            check_id: check_id.to_string(),
        });
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| check.run(graph)));
        let elapsed = started.elapsed();
        let mut produced = match outcome {
            Ok(findings) => findings,
            Err(panic) => vec![internal_finding(check_id, &panic_message(&panic))],
        };
        if elapsed > PER_CHECK_BUDGET {
            produced.push(internal_finding(
                check_id,
                &format!("check exceeded budget after {}ms", elapsed.as_millis()),
            ));
        }
        let failed = produced.iter().filter(|result| !result.passed).count();
        results.extend(produced);
        progress(EngineEvent::CheckComplete {
            check_id: check_id.to_string(),
            failed,
        });
    }

    let summary = summarize(&results);
    let reachability = graph.reachability_matrix();
    let hash_view = AuditHashView {
        project_id,
        results: &results,
        summary: &summary,
        reachability: &reachability,
    };
    let result_hash = hash_canonical_json(&hash_view).unwrap_or_default();
    AuditResult {
        project_id: project_id.clone(),
        generated_at,
        results,
        summary,
        reachability,
        result_hash,
    }
}

/// Builds the `<id>_INTERNAL` error finding for a failed check body.
fn internal_finding(check_id: &str, message: &str) -> CheckResult {
    CheckResult::fail(&format!("{check_id}_INTERNAL"), Severity::Error, message.to_string())
}

/// Extracts a printable message from a panic payload.
fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "check panicked".to_string()
    }
}

/// Computes aggregate counters over all findings.
fn summarize(results: &[CheckResult]) -> AuditSummary {
    let mut summary = AuditSummary::default();
    for result in results {
        summary.total += 1;
        if result.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
            match result.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => {}
            }
        }
    }
    summary
}
