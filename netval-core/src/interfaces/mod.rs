// netval-core/src/interfaces/mod.rs
// ============================================================================
// Module: NetVal Interfaces
// Description: Backend-agnostic interfaces for storage, credentials, and SSH.
// Purpose: Define the contract surfaces used by the NetVal server runtime.
// Dependencies: crate::model, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the core integrates with its backends without
//! embedding backend-specific details. Implementations must be deterministic
//! where the contract demands it and fail closed on missing or invalid data.
//! Credential material only ever moves through [`CredentialVault`]; it is
//! never persisted, logged, or embedded in responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::model::AuditLogEntry;
use crate::model::ConfigSnapshot;
use crate::model::CredentialRef;
use crate::model::Device;
use crate::model::DeviceId;
use crate::model::DeviceVlan;
use crate::model::Interface;
use crate::model::JobId;
use crate::model::JobKind;
use crate::model::JobRecord;
use crate::model::JobStatus;
use crate::model::Link;
use crate::model::LinkId;
use crate::model::LinkState;
use crate::model::NewDevice;
use crate::model::NewLink;
use crate::model::NewProject;
use crate::model::PlanId;
use crate::model::Project;
use crate::model::ProjectId;
use crate::model::RemediationPlan;
use crate::model::SnapshotSource;
use crate::parser::ParsedConfig;

// ============================================================================
// SECTION: Topology Store
// ============================================================================

/// Topology store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referential or shape constraint violated; no partial writes occurred.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying database failure; the caller may retry.
    #[error("storage error: {0}")]
    Db(String),
    /// Store I/O failure.
    #[error("storage io error: {0}")]
    Io(String),
    /// Store schema version is incompatible.
    #[error("storage version mismatch: {0}")]
    VersionMismatch(String),
    /// Stored data is invalid.
    #[error("storage invalid data: {0}")]
    Invalid(String),
}

/// Durable store for the topology ownership tree.
///
/// A successful mutation is durable before the call returns; all reads see
/// committed state. Deletes cascade down the ownership tree and surface any
/// orphaned credential references so the caller can revoke them from the
/// vault — the store itself never touches credential material.
pub trait TopologyStore: Send + Sync {
    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Creates a project with a freshly minted identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn create_project(&self, new: &NewProject) -> Result<Project, StoreError>;

    /// Lists all projects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Fetches one project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    fn get_project(&self, id: &ProjectId) -> Result<Project, StoreError>;

    /// Deletes a project and every owned row, returning the credential
    /// references that must be revoked from the vault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    fn delete_project(&self, id: &ProjectId) -> Result<Vec<CredentialRef>, StoreError>;

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    /// Creates a device under a project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    fn create_device(&self, project: &ProjectId, new: &NewDevice) -> Result<Device, StoreError>;

    /// Lists devices under a project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_devices(&self, project: &ProjectId) -> Result<Vec<Device>, StoreError>;

    /// Fetches one device.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the device does not exist.
    fn get_device(&self, id: &DeviceId) -> Result<Device, StoreError>;

    /// Deletes a device, its interfaces, VLANs, snapshots, and any link
    /// referencing it, returning its credential reference when present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the device does not exist.
    fn delete_device(&self, id: &DeviceId) -> Result<Option<CredentialRef>, StoreError>;

    /// Sets or clears the credential reference on a device.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the device does not exist.
    fn set_device_credential(
        &self,
        id: &DeviceId,
        reference: Option<&CredentialRef>,
    ) -> Result<(), StoreError>;

    /// Replaces a device's interfaces and VLAN database from a parsed
    /// configuration, preserving the invariant that interface names are
    /// unique within the device.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the device does not exist.
    fn replace_device_model(
        &self,
        id: &DeviceId,
        parsed: &ParsedConfig,
    ) -> Result<(), StoreError>;

    /// Lists a device's interfaces ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_interfaces(&self, device: &DeviceId) -> Result<Vec<Interface>, StoreError>;

    /// Lists a device's VLAN database ordered by VLAN id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_device_vlans(&self, device: &DeviceId) -> Result<Vec<DeviceVlan>, StoreError>;

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Creates a link under a project.
    ///
    /// Both endpoints must exist and belong to the same project as the link;
    /// orphan link creation is rejected at write time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] when an endpoint is missing or
    /// belongs to another project.
    fn create_link(&self, project: &ProjectId, new: &NewLink) -> Result<Link, StoreError>;

    /// Lists links under a project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_links(&self, project: &ProjectId) -> Result<Vec<Link>, StoreError>;

    /// Deletes one link.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the link does not exist.
    fn delete_link(&self, id: &LinkId) -> Result<(), StoreError>;

    /// Updates one link's lifecycle state after validation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the link does not exist.
    fn set_link_state(&self, id: &LinkId, state: LinkState) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Appends an immutable configuration snapshot. For every source other
    /// than `pre_push`, the owning device's `config_hash` is refreshed to the
    /// snapshot's hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the device does not exist.
    fn insert_snapshot(
        &self,
        device: &DeviceId,
        raw_config: &str,
        source: SnapshotSource,
    ) -> Result<ConfigSnapshot, StoreError>;

    /// Fetches the newest snapshot for a device. When `include_pre_push` is
    /// false, `pre_push` snapshots are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn latest_snapshot(
        &self,
        device: &DeviceId,
        include_pre_push: bool,
    ) -> Result<Option<ConfigSnapshot>, StoreError>;

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Creates a queued job row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    fn create_job(&self, project: &ProjectId, kind: JobKind) -> Result<JobRecord, StoreError>;

    /// Marks a job running and stamps its start time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the job does not exist.
    fn start_job(&self, id: &JobId) -> Result<(), StoreError>;

    /// Terminates a job with a final status and self-describing result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the job does not exist.
    fn finish_job(
        &self,
        id: &JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Fetches one job row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the job does not exist.
    fn get_job(&self, id: &JobId) -> Result<JobRecord, StoreError>;

    /// Lists non-terminal jobs, for shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_open_jobs(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Fetches the newest completed simulation job under a project, the
    /// input for remediation planning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn latest_complete_simulation(
        &self,
        project: &ProjectId,
    ) -> Result<Option<JobRecord>, StoreError>;

    // ------------------------------------------------------------------
    // Remediation plans
    // ------------------------------------------------------------------

    /// Persists a new remediation plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    fn save_plan(&self, plan: &RemediationPlan) -> Result<(), StoreError>;

    /// Rewrites an existing plan after a lifecycle transition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the plan does not exist.
    fn update_plan(&self, plan: &RemediationPlan) -> Result<(), StoreError>;

    /// Fetches one plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the plan does not exist.
    fn get_plan(&self, id: &PlanId) -> Result<RemediationPlan, StoreError>;

    /// Fetches the newest plan under a project, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn latest_plan(&self, project: &ProjectId) -> Result<Option<RemediationPlan>, StoreError>;

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    /// Appends an audit trail entry. The monotonic id in the input is
    /// ignored; the store assigns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    /// Lists audit entries under a project in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_audit(&self, project: &ProjectId) -> Result<Vec<AuditLogEntry>, StoreError>;
}

// ============================================================================
// SECTION: Credential Vault
// ============================================================================

/// Credential material held only by the vault, never by the store.
///
/// This type intentionally has no `Debug` derive exposing secrets: the manual
/// implementation redacts the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMaterial {
    /// Login username.
    pub username: String,
    /// Login password, when password authentication is used.
    #[serde(default)]
    pub password: Option<String>,
    /// Path to a private key file, when key authentication is used.
    #[serde(default)]
    pub key_path: Option<String>,
}

impl std::fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// Credential vault errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No entry exists for the reference.
    #[error("credential reference not found")]
    NotFound,
    /// Underlying secret store failure.
    #[error("credential vault error: {0}")]
    Backend(String),
    /// Stored material could not be decoded.
    #[error("credential vault invalid data: {0}")]
    Invalid(String),
}

/// Isolation layer over the host OS secret store.
pub trait CredentialVault: Send + Sync {
    /// Stores material and returns an opaque reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] when the secret store rejects the write.
    fn store(
        &self,
        project: &ProjectId,
        device: &DeviceId,
        material: &CredentialMaterial,
    ) -> Result<CredentialRef, VaultError>;

    /// Loads material by reference.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] when no entry exists.
    fn load(&self, reference: &CredentialRef) -> Result<CredentialMaterial, VaultError>;

    /// Deletes the entry for a reference. Deleting a missing entry is not an
    /// error: revocation must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] when the secret store rejects the delete.
    fn delete(&self, reference: &CredentialRef) -> Result<(), VaultError>;
}

// ============================================================================
// SECTION: Device Sessions
// ============================================================================

/// Connection target for a device session.
#[derive(Debug, Clone)]
pub struct SshTarget {
    /// Host name or address.
    pub host: String,
    /// TCP port, normally 22.
    pub port: u16,
    /// Credential material resolved from the vault.
    pub material: CredentialMaterial,
}

/// SSH transport errors. The underlying error class name is preserved so job
/// results can report it, mirroring how the device library surfaces failures.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SshError {
    /// TCP or SSH transport could not be established.
    #[error("device unreachable ({class}): {message}")]
    DeviceUnreachable {
        /// Underlying error class name.
        class: String,
        /// Human-readable message.
        message: String,
    },
    /// Authentication was rejected.
    #[error("authentication failed ({class}): {message}")]
    AuthFailure {
        /// Underlying error class name.
        class: String,
        /// Human-readable message.
        message: String,
    },
    /// A configuration push step failed.
    #[error("push failed ({class}): {message}")]
    PushFailure {
        /// Underlying error class name.
        class: String,
        /// Human-readable message.
        message: String,
    },
    /// A command did not complete within its budget.
    #[error("command timed out after {seconds}s")]
    Timeout {
        /// Budget that was exceeded, in seconds.
        seconds: u64,
    },
}

/// Output of a configuration push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    /// Lines sent to the device, in order.
    pub lines_sent: Vec<String>,
    /// Device transcript collected during the push.
    pub transcript: String,
}

/// An open session against one device.
pub trait DeviceSession: Send {
    /// Executes one exec-mode command and returns its output.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when the command fails or times out.
    fn run_command(&mut self, command: &str) -> Result<String, SshError>;

    /// Enters configuration mode, sends each line with a short settle,
    /// then ends with `end` and `write memory`.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::PushFailure`] when any step fails; the caller
    /// leaves rollback available.
    fn push_config(&mut self, lines: &[String]) -> Result<PushResult, SshError>;
}

/// Factory for device sessions; the seam tests substitute.
pub trait DeviceConnector: Send + Sync {
    /// Opens an authenticated session against the target.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::DeviceUnreachable`] or [`SshError::AuthFailure`].
    fn connect(&self, target: &SshTarget) -> Result<Box<dyn DeviceSession>, SshError>;
}

/// Output of an ingest run: command output keyed by command.
pub type IngestOutput = BTreeMap<String, String>;
