// netval-core/src/remediation/mod.rs
// ============================================================================
// Module: Remediation Planner
// Description: Audit findings to CLI patch plans with inverses.
// Purpose: Render per-check patch/rollback templates and drive the plan
//          lifecycle state machine.
// Dependencies: crate::checks, crate::model, chrono
// ============================================================================

//! ## Overview
//! The planner groups failed findings by device and renders a patch and its
//! inverse from per-check templates. Findings without a template produce no
//! item. Plans move through
//! `pending → approved → applying → applied → rolled_back` with `failed` as
//! the apply-error terminal; only `pending` and `approved` accept item-level
//! approval toggles, and `applied` accepts rollback inside a retention
//! window until another successful apply supersedes it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use thiserror::Error;

use crate::checks::AuditResult;
use crate::checks::CheckResult;
use crate::model::PlanId;
use crate::model::PlanStatus;
use crate::model::ProjectId;
use crate::model::RemediationItem;
use crate::model::RemediationPlan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Plan lifecycle errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The requested transition is not legal from the current status.
    #[error("plan in state {from} does not accept {action}")]
    InvalidTransition {
        /// Current plan status string form.
        from: &'static str,
        /// Rejected action verb.
        action: &'static str,
    },
    /// An item index was out of range.
    #[error("item index {index} out of range")]
    ItemOutOfRange {
        /// Offending index.
        index: usize,
    },
    /// Apply requested with no approved items.
    #[error("plan has no approved items")]
    NoApprovedItems,
    /// Rollback requested after the retention window elapsed.
    #[error("rollback retention window of {hours}h has elapsed")]
    RetentionExpired {
        /// Configured retention in hours.
        hours: i64,
    },
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Builds a pending remediation plan from an audit result.
///
/// Failed findings group by device in (device, check, interface) order; each
/// consults its per-check template. Findings without a template are skipped.
#[must_use]
pub fn build_plan(
    project_id: &ProjectId,
    audit: &AuditResult,
    created_at: DateTime<Utc>,
) -> RemediationPlan {
    let mut failed: Vec<&CheckResult> = audit
        .results
        .iter()
        .filter(|result| !result.passed && result.device_id.is_some())
        .collect();
    failed.sort_by(|a, b| {
        a.device_id
            .cmp(&b.device_id)
            .then_with(|| a.check_id.cmp(&b.check_id))
            .then_with(|| a.interface.cmp(&b.interface))
            .then_with(|| a.vlan.cmp(&b.vlan))
    });

    let mut items = Vec::new();
    for finding in failed {
        if let Some(item) = render_item(finding) {
            items.push(item);
        }
    }
    RemediationPlan {
        id: PlanId::generate(),
        project_id: project_id.clone(),
        items,
        status: PlanStatus::Pending,
        created_at,
        applied_at: None,
    }
}

/// Renders the patch/rollback pair for one failed finding, when a template
/// exists for its check.
#[must_use]
pub fn render_item(finding: &CheckResult) -> Option<RemediationItem> {
    let device_id = finding.device_id.clone()?;
    let (cli_patch, rollback_cli) = match finding.check_id.as_str() {
        "VLAN_CONTINUITY" | "VLAN_ORPHAN_SVI" => {
            let vlan = finding.vlan?;
            (format!("vlan {vlan}\n name VLAN{vlan}"), format!("no vlan {vlan}"))
        }
        "WLC_JOIN_CHAIN" => {
            let vlan = finding.vlan?;
            let interface = finding.interface.as_deref()?;
            (
                format!("interface {interface}\n switchport trunk allowed vlan add {vlan}"),
                format!("interface {interface}\n switchport trunk allowed vlan remove {vlan}"),
            )
        }
        "TRUNK_NATIVE_MISMATCH" => {
            let vlan = finding.vlan?;
            let previous = finding.previous_vlan?;
            let interface = finding.interface.as_deref()?;
            (
                format!("interface {interface}\n switchport trunk native vlan {vlan}"),
                format!("interface {interface}\n switchport trunk native vlan {previous}"),
            )
        }
        "DUPLEX_MISMATCH" => {
            let interface = finding.interface.as_deref()?;
            let fix = finding.suggested_fix.as_deref()?;
            (
                format!("interface {interface}\n {fix}"),
                format!("interface {interface}\n duplex auto"),
            )
        }
        _ => return None,
    };
    Some(RemediationItem {
        device_id,
        interface: finding.interface.clone(),
        source_check_id: finding.check_id.clone(),
        cli_patch,
        rollback_cli,
        approved: false,
    })
}

// ============================================================================
// SECTION: State Machine
// ============================================================================

impl RemediationPlan {
    /// Toggles approval on one item. Legal only in `pending` or `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] on an illegal state or index.
    pub fn set_item_approval(&mut self, index: usize, approved: bool) -> Result<(), PlanError> {
        if !matches!(self.status, PlanStatus::Pending | PlanStatus::Approved) {
            return Err(PlanError::InvalidTransition {
                from: self.status.as_str(),
                action: "item approval",
            });
        }
        let item = self.items.get_mut(index).ok_or(PlanError::ItemOutOfRange {
            index,
        })?;
        item.approved = approved;
        Ok(())
    }

    /// Moves `pending → approved`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTransition`] from any other state.
    pub fn approve(&mut self) -> Result<(), PlanError> {
        if self.status != PlanStatus::Pending {
            return Err(PlanError::InvalidTransition {
                from: self.status.as_str(),
                action: "approve",
            });
        }
        self.status = PlanStatus::Approved;
        Ok(())
    }

    /// Moves `approved → applying`. Requires at least one approved item.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] on an illegal state or an empty approval set.
    pub fn begin_apply(&mut self) -> Result<(), PlanError> {
        if self.status != PlanStatus::Approved {
            return Err(PlanError::InvalidTransition {
                from: self.status.as_str(),
                action: "apply",
            });
        }
        if !self.items.iter().any(|item| item.approved) {
            return Err(PlanError::NoApprovedItems);
        }
        self.status = PlanStatus::Applying;
        Ok(())
    }

    /// Terminates an apply: `applying → applied` on success, `applying →
    /// failed` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTransition`] outside `applying`.
    pub fn finish_apply(&mut self, success: bool, at: DateTime<Utc>) -> Result<(), PlanError> {
        if self.status != PlanStatus::Applying {
            return Err(PlanError::InvalidTransition {
                from: self.status.as_str(),
                action: "finish apply",
            });
        }
        if success {
            self.status = PlanStatus::Applied;
            self.applied_at = Some(at);
        } else {
            self.status = PlanStatus::Failed;
        }
        Ok(())
    }

    /// Moves `applied → rolled_back` inside the retention window.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] on an illegal state or an elapsed window.
    pub fn roll_back(&mut self, now: DateTime<Utc>, retention: Duration) -> Result<(), PlanError> {
        if self.status != PlanStatus::Applied {
            return Err(PlanError::InvalidTransition {
                from: self.status.as_str(),
                action: "rollback",
            });
        }
        if let Some(applied_at) = self.applied_at {
            if now - applied_at > retention {
                return Err(PlanError::RetentionExpired {
                    hours: retention.num_hours(),
                });
            }
        }
        self.status = PlanStatus::RolledBack;
        Ok(())
    }

    /// Returns approved items grouped by device in device-id order, each
    /// group keeping item order.
    #[must_use]
    pub fn approved_by_device(&self) -> Vec<(crate::model::DeviceId, Vec<&RemediationItem>)> {
        let mut groups: std::collections::BTreeMap<crate::model::DeviceId, Vec<&RemediationItem>> =
            std::collections::BTreeMap::new();
        for item in self.items.iter().filter(|item| item.approved) {
            groups.entry(item.device_id.clone()).or_default().push(item);
        }
        groups.into_iter().collect()
    }
}
