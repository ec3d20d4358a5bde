// netval-core/src/model/entities.rs
// ============================================================================
// Module: NetVal Entity Model
// Description: Canonical entities for projects, devices, links, and jobs.
// Purpose: Define the graph-shaped data model shared by store and engine.
// Dependencies: crate::model::identifiers, serde, chrono
// ============================================================================

//! ## Overview
//! These types are the canonical topology model. The persistent store reads
//! and writes them; the topology assembler and validation engine consume
//! them. Creation payloads (`New*`) deliberately carry no identifiers: fresh
//! ids are minted server-side.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::CredentialRef;
use crate::model::identifiers::DeviceId;
use crate::model::identifiers::InterfaceId;
use crate::model::identifiers::JobId;
use crate::model::identifiers::LinkId;
use crate::model::identifiers::PlanId;
use crate::model::identifiers::ProjectId;
use crate::model::identifiers::SnapshotId;

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Role a device plays in the campus topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    /// Layer-2/3 switch.
    Switch,
    /// Layer-3 router.
    Router,
    /// Wireless LAN controller.
    Wlc,
    /// Access point.
    Ap,
    /// Firewall appliance.
    Firewall,
    /// End host, including management stations.
    Endpoint,
}

impl DeviceRole {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Router => "router",
            Self::Wlc => "wlc",
            Self::Ap => "ap",
            Self::Firewall => "firewall",
            Self::Endpoint => "endpoint",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "switch" => Some(Self::Switch),
            "router" => Some(Self::Router),
            "wlc" => Some(Self::Wlc),
            "ap" => Some(Self::Ap),
            "firewall" => Some(Self::Firewall),
            "endpoint" => Some(Self::Endpoint),
            _ => None,
        }
    }
}

/// Switchport mode of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceMode {
    /// Untagged access port.
    Access,
    /// 802.1Q trunk port.
    Trunk,
    /// Layer-3 routed port or SVI.
    Routed,
    /// Mode not determined from configuration.
    #[default]
    Unknown,
}

impl InterfaceMode {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Trunk => "trunk",
            Self::Routed => "routed",
            Self::Unknown => "unknown",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "trunk" => Some(Self::Trunk),
            "routed" => Some(Self::Routed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    /// Interface is administratively up.
    Up,
    /// Interface is shut down.
    Down,
    /// State not determined from configuration.
    #[default]
    Unknown,
}

impl PortState {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Duplex setting of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplexMode {
    /// Negotiated duplex (the configuration default).
    #[default]
    Auto,
    /// Forced full duplex.
    Full,
    /// Forced half duplex.
    Half,
}

impl DuplexMode {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Full => "full",
            Self::Half => "half",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "full" => Some(Self::Full),
            "half" => Some(Self::Half),
            _ => None,
        }
    }

    /// Returns true when the duplex was explicitly forced.
    #[must_use]
    pub const fn is_explicit(self) -> bool {
        matches!(self, Self::Full | Self::Half)
    }
}

/// Physical medium of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMedium {
    /// Copper ethernet.
    #[default]
    Ethernet,
    /// Fiber optic.
    Fiber,
}

impl LinkMedium {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Fiber => "fiber",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ethernet" => Some(Self::Ethernet),
            "fiber" => Some(Self::Fiber),
            _ => None,
        }
    }
}

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Drawn on the canvas but not yet validated.
    #[default]
    Pending,
    /// Validated as consistent.
    Connected,
    /// Validation found an inconsistency on this link.
    Misconfigured,
}

impl LinkState {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Misconfigured => "misconfigured",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "connected" => Some(Self::Connected),
            "misconfigured" => Some(Self::Misconfigured),
            _ => None,
        }
    }
}

/// Origin of a configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Typed or pasted into the editor.
    Manual,
    /// Uploaded as a file.
    Upload,
    /// Pulled from the device over SSH.
    Ssh,
    /// Captured immediately before a push; the rollback target.
    PrePush,
}

impl SnapshotSource {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Upload => "upload",
            Self::Ssh => "ssh",
            Self::PrePush => "pre_push",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "upload" => Some(Self::Upload),
            "ssh" => Some(Self::Ssh),
            "pre_push" => Some(Self::PrePush),
            _ => None,
        }
    }
}

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Validation run over an assembled topology.
    Simulation,
    /// SSH configuration pull.
    Ingestion,
    /// Remediation plan application.
    Remediation,
}

impl JobKind {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Ingestion => "ingestion",
            Self::Remediation => "remediation",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simulation" => Some(Self::Simulation),
            "ingestion" => Some(Self::Ingestion),
            "remediation" => Some(Self::Remediation),
            _ => None,
        }
    }
}

/// Lifecycle status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet running.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully; result is final.
    Complete,
    /// Finished unsuccessfully; result carries the error.
    Failed,
}

impl JobStatus {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true when the job can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Lifecycle status of a remediation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Built from an audit; items await approval.
    Pending,
    /// Approved for application.
    Approved,
    /// Push in progress; sticky transient state.
    Applying,
    /// All approved items pushed successfully.
    Applied,
    /// Previously applied plan was reversed.
    RolledBack,
    /// Application ended with at least one device failure.
    Failed,
}

impl PlanStatus {
    /// Returns the stable string form used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "applying" => Some(Self::Applying),
            "applied" => Some(Self::Applied),
            "rolled_back" => Some(Self::RolledBack),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Root of the ownership tree; owns devices, links, jobs, and plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Opaque project identifier.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp, refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A network device owned by one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Opaque device identifier.
    pub id: DeviceId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Configured hostname.
    pub hostname: String,
    /// Topology role.
    pub role: DeviceRole,
    /// Vendor string.
    pub vendor: String,
    /// Platform string.
    pub platform: String,
    /// Management IP address, if assigned.
    pub management_ip: Option<String>,
    /// Canvas X coordinate from the topology editor.
    pub canvas_x: f64,
    /// Canvas Y coordinate from the topology editor.
    pub canvas_y: f64,
    /// Opaque vault reference; never credential material.
    pub credential_ref: Option<CredentialRef>,
    /// Content hash of the newest non-pre-push snapshot.
    pub config_hash: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDevice {
    /// Configured hostname.
    pub hostname: String,
    /// Topology role.
    pub role: DeviceRole,
    /// Vendor string.
    #[serde(default = "default_vendor")]
    pub vendor: String,
    /// Platform string.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Management IP address, if assigned.
    #[serde(default)]
    pub management_ip: Option<String>,
    /// Canvas X coordinate.
    #[serde(default)]
    pub canvas_x: f64,
    /// Canvas Y coordinate.
    #[serde(default)]
    pub canvas_y: f64,
}

/// Returns the default vendor string.
fn default_vendor() -> String {
    "cisco".to_string()
}

/// Returns the default platform string.
fn default_platform() -> String {
    "ios-xe".to_string()
}

/// A physical or logical interface owned by one device.
///
/// Interface names are unique within their device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// Opaque interface identifier.
    pub id: InterfaceId,
    /// Owning device.
    pub device_id: DeviceId,
    /// Interface name, for example `GigabitEthernet1/0/1` or `Vlan10`.
    pub name: String,
    /// Optional description line.
    pub description: Option<String>,
    /// Switchport mode.
    pub mode: InterfaceMode,
    /// Access VLAN when in access mode.
    pub vlan_access: Option<u16>,
    /// Expanded trunk allow-list, sorted ascending.
    pub vlan_trunk_allowed: Vec<u16>,
    /// Explicit native VLAN on a trunk.
    pub vlan_native: Option<u16>,
    /// IPv4 address when routed or SVI.
    pub ip_address: Option<String>,
    /// IPv4 network mask when routed or SVI.
    pub ip_mask: Option<String>,
    /// Duplex setting.
    pub duplex: DuplexMode,
    /// DHCP relay helper addresses.
    pub helper_addresses: Vec<String>,
    /// Administrative state.
    pub state: PortState,
}

impl Interface {
    /// Returns the SVI VLAN id when this interface is named `Vlan<N>` and
    /// carries an IP address.
    #[must_use]
    pub fn svi_vlan(&self) -> Option<u16> {
        if self.ip_address.is_none() {
            return None;
        }
        self.name.strip_prefix("Vlan").and_then(|rest| rest.parse::<u16>().ok())
    }
}

/// Presence of a VLAN in a device's VLAN database. Composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceVlan {
    /// Owning device.
    pub device_id: DeviceId,
    /// 802.1Q VLAN id in 1..=4094.
    pub vlan_id: u16,
    /// VLAN name.
    pub name: Option<String>,
}

/// An undirected link between two device interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Opaque link identifier.
    pub id: LinkId,
    /// Owning project; always matches both endpoints' projects.
    pub project_id: ProjectId,
    /// First endpoint device.
    pub source_device_id: DeviceId,
    /// Interface name on the first endpoint.
    pub source_interface: String,
    /// Second endpoint device.
    pub target_device_id: DeviceId,
    /// Interface name on the second endpoint.
    pub target_interface: String,
    /// Physical medium.
    pub medium: LinkMedium,
    /// VLANs permitted across the link, sorted ascending, each in 1..=4094.
    pub vlan_allow_list: Vec<u16>,
    /// Lifecycle state.
    pub state: LinkState,
}

/// Creation payload for a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLink {
    /// First endpoint device.
    pub source_device_id: DeviceId,
    /// Interface name on the first endpoint.
    pub source_interface: String,
    /// Second endpoint device.
    pub target_device_id: DeviceId,
    /// Interface name on the second endpoint.
    pub target_interface: String,
    /// Physical medium.
    #[serde(default)]
    pub medium: LinkMedium,
    /// VLANs permitted across the link.
    #[serde(default)]
    pub vlan_allow_list: Vec<u16>,
}

/// Immutable copy of a device's full running configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Opaque snapshot identifier.
    pub id: SnapshotId,
    /// Owning device.
    pub device_id: DeviceId,
    /// Raw configuration text.
    pub raw_config: String,
    /// SHA-256 hex digest of the raw bytes.
    pub config_hash: String,
    /// Origin of the snapshot.
    pub source: SnapshotSource,
    /// Capture timestamp.
    pub taken_at: DateTime<Utc>,
}

/// Persisted record of a background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque job identifier.
    pub id: JobId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Job kind.
    pub kind: JobKind,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Terminal result payload; self-describing JSON.
    pub result: Option<serde_json::Value>,
    /// Execution start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Execution end timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single CLI edit with its inverse, awaiting approval and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationItem {
    /// Target device.
    pub device_id: DeviceId,
    /// Target interface when the edit is interface-scoped.
    pub interface: Option<String>,
    /// Identifier of the check that produced this item.
    pub source_check_id: String,
    /// CLI block to push.
    pub cli_patch: String,
    /// CLI block that semantically restores the pre-push stanza.
    pub rollback_cli: String,
    /// Per-item approval flag.
    pub approved: bool,
}

/// A set of per-device CLI patches with inverses and a lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    /// Opaque plan identifier.
    pub id: PlanId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Ordered remediation items.
    pub items: Vec<RemediationItem>,
    /// Lifecycle status.
    pub status: PlanStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful apply.
    pub applied_at: Option<DateTime<Utc>>,
}

/// One append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Monotonic row identifier assigned by the store.
    pub id: i64,
    /// Owning project.
    pub project_id: ProjectId,
    /// Affected device, when device-scoped.
    pub device_id: Option<DeviceId>,
    /// Acting principal; the single local user.
    pub actor: String,
    /// Action verb, for example `device.create`.
    pub action: String,
    /// Human-readable detail.
    pub detail: String,
    /// Entry timestamp.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// SECTION: VLAN Bounds
// ============================================================================

/// Lowest VLAN id legal under IEEE 802.1Q.
pub const VLAN_MIN: u16 = 1;
/// Highest VLAN id legal under IEEE 802.1Q.
pub const VLAN_MAX: u16 = 4094;

/// Returns true when the id is legal under IEEE 802.1Q.
#[must_use]
pub const fn vlan_in_range(vlan: u16) -> bool {
    vlan >= VLAN_MIN && vlan <= VLAN_MAX
}
