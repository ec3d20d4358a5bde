// netval-core/tests/remediation.rs
// ============================================================================
// Module: Remediation Tests
// Description: Validate plan building, templates, and the state machine.
// Purpose: Ensure patch/rollback pairs invert and transitions are enforced.
// Dependencies: netval-core
// ============================================================================

//! ## Overview
//! Plan items render from per-check templates and group by device; the
//! lifecycle enforces `pending → approved → applying → applied →
//! rolled_back`, item toggles only before applying, and the rollback
//! retention window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use netval_core::checks::AuditResult;
use netval_core::checks::AuditSummary;
use netval_core::checks::CheckResult;
use netval_core::checks::Severity;
use netval_core::model::DeviceId;
use netval_core::model::PlanStatus;
use netval_core::model::ProjectId;
use netval_core::remediation::PlanError;
use netval_core::remediation::build_plan;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn vlan_gap_finding(device: &str, hostname: &str, vlan: u16) -> CheckResult {
    CheckResult::fail(
        "VLAN_CONTINUITY",
        Severity::Error,
        format!("VLAN {vlan} missing from {hostname}"),
    )
    .on_device(&DeviceId::new(device), hostname)
    .with_vlan(vlan)
    .with_fix(format!("vlan {vlan}\n name VLAN{vlan}"))
}

fn audit_with(results: Vec<CheckResult>) -> AuditResult {
    let summary = AuditSummary {
        total: results.len(),
        passed: results.iter().filter(|result| result.passed).count(),
        failed: results.iter().filter(|result| !result.passed).count(),
        errors: results.iter().filter(|result| !result.passed).count(),
        warnings: 0,
    };
    AuditResult {
        project_id: ProjectId::new("project-1"),
        generated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        results,
        summary,
        reachability: Default::default(),
        result_hash: String::new(),
    }
}

// ============================================================================
// SECTION: Planner Tests
// ============================================================================

#[test]
fn vlan_gap_produces_patch_and_inverse() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    assert_eq!(plan.status, PlanStatus::Pending);
    assert_eq!(plan.items.len(), 1);
    let item = &plan.items[0];
    assert_eq!(item.source_check_id, "VLAN_CONTINUITY");
    assert_eq!(item.cli_patch, "vlan 30\n name VLAN30");
    assert_eq!(item.rollback_cli, "no vlan 30");
    assert!(!item.approved);
}

#[test]
fn join_chain_item_wraps_the_interface() {
    let finding = CheckResult::fail(
        "WLC_JOIN_CHAIN",
        Severity::Error,
        "AP VLAN 20 missing from trunk at hop 2",
    )
    .on_device(&DeviceId::new("d-core"), "SW-CORE")
    .on_interface("Gi1/0/2")
    .with_vlan(20)
    .with_fix("switchport trunk allowed vlan add 20");
    let audit = audit_with(vec![finding]);
    let plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    assert_eq!(plan.items.len(), 1);
    assert_eq!(
        plan.items[0].cli_patch,
        "interface Gi1/0/2\n switchport trunk allowed vlan add 20"
    );
    assert_eq!(
        plan.items[0].rollback_cli,
        "interface Gi1/0/2\n switchport trunk allowed vlan remove 20"
    );
}

#[test]
fn passing_and_untemplated_findings_are_skipped() {
    let pass = CheckResult::pass("VLAN_CONTINUITY", "all good");
    let untemplated = CheckResult::fail("MGMT_SSH_PATH", Severity::Error, "no path")
        .on_device(&DeviceId::new("d-a"), "SW-A");
    let audit = audit_with(vec![pass, untemplated]);
    let plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    assert!(plan.items.is_empty());
}

#[test]
fn items_group_by_device_in_order() {
    let audit = audit_with(vec![
        vlan_gap_finding("d-z", "SW-Z", 40),
        vlan_gap_finding("d-a", "SW-A", 30),
        vlan_gap_finding("d-a", "SW-A", 50),
    ]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    for index in 0..plan.items.len() {
        plan.set_item_approval(index, true).expect("toggle");
    }
    let groups = plan.approved_by_device();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0, DeviceId::new("d-a"));
    assert_eq!(groups[0].1.len(), 2);
    assert_eq!(groups[1].0, DeviceId::new("d-z"));
}

// ============================================================================
// SECTION: State Machine Tests
// ============================================================================

#[test]
fn lifecycle_happy_path() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    plan.set_item_approval(0, true).expect("toggle");
    plan.approve().expect("approve");
    assert_eq!(plan.status, PlanStatus::Approved);
    plan.begin_apply().expect("apply");
    assert_eq!(plan.status, PlanStatus::Applying);
    let applied_at = Utc::now();
    plan.finish_apply(true, applied_at).expect("finish");
    assert_eq!(plan.status, PlanStatus::Applied);
    assert_eq!(plan.applied_at, Some(applied_at));
    plan.roll_back(applied_at + Duration::hours(1), Duration::hours(24)).expect("rollback");
    assert_eq!(plan.status, PlanStatus::RolledBack);
}

#[test]
fn apply_requires_approval_and_items() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    assert!(matches!(plan.begin_apply(), Err(PlanError::InvalidTransition { .. })));
    plan.approve().expect("approve");
    assert!(matches!(plan.begin_apply(), Err(PlanError::NoApprovedItems)));
}

#[test]
fn item_toggles_rejected_once_applying() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    plan.set_item_approval(0, true).expect("toggle");
    plan.approve().expect("approve");
    plan.begin_apply().expect("apply");
    assert!(matches!(
        plan.set_item_approval(0, false),
        Err(PlanError::InvalidTransition { .. })
    ));
}

#[test]
fn failed_apply_is_terminal_for_rollback() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    plan.set_item_approval(0, true).expect("toggle");
    plan.approve().expect("approve");
    plan.begin_apply().expect("apply");
    plan.finish_apply(false, Utc::now()).expect("finish");
    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(matches!(
        plan.roll_back(Utc::now(), Duration::hours(24)),
        Err(PlanError::InvalidTransition { .. })
    ));
}

#[test]
fn rollback_respects_retention_window() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    plan.set_item_approval(0, true).expect("toggle");
    plan.approve().expect("approve");
    plan.begin_apply().expect("apply");
    let applied_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    plan.finish_apply(true, applied_at).expect("finish");
    let too_late = applied_at + Duration::hours(25);
    assert!(matches!(
        plan.roll_back(too_late, Duration::hours(24)),
        Err(PlanError::RetentionExpired { .. })
    ));
    assert_eq!(plan.status, PlanStatus::Applied);
}

#[test]
fn item_index_bounds_are_checked() {
    let audit = audit_with(vec![vlan_gap_finding("d-b", "SW-B", 30)]);
    let mut plan = build_plan(&ProjectId::new("project-1"), &audit, Utc::now());
    assert!(matches!(
        plan.set_item_approval(5, true),
        Err(PlanError::ItemOutOfRange { index: 5 })
    ));
}
