// netval-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Topology Store
// Description: Durable TopologyStore backed by SQLite WAL.
// Purpose: Persist the topology ownership tree with cascading deletes.
// Dependencies: netval-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`TopologyStore`] using `SQLite`. WAL
//! journaling with `foreign_keys=ON` and `synchronous=NORMAL` makes every
//! successful mutation durable before the call returns; a single mutex-held
//! connection serializes writers so canvas-editing bursts cannot lose
//! updates. Cascade deletes are enforced by foreign keys from projects down.
//! Credential material never enters this store, only opaque references.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use netval_core::interfaces::StoreError;
use netval_core::interfaces::TopologyStore;
use netval_core::model::AuditLogEntry;
use netval_core::model::ConfigSnapshot;
use netval_core::model::CredentialRef;
use netval_core::model::Device;
use netval_core::model::DeviceId;
use netval_core::model::DeviceRole;
use netval_core::model::DeviceVlan;
use netval_core::model::DuplexMode;
use netval_core::model::Interface;
use netval_core::model::InterfaceId;
use netval_core::model::InterfaceMode;
use netval_core::model::JobId;
use netval_core::model::JobKind;
use netval_core::model::JobRecord;
use netval_core::model::JobStatus;
use netval_core::model::Link;
use netval_core::model::LinkId;
use netval_core::model::LinkMedium;
use netval_core::model::LinkState;
use netval_core::model::NewDevice;
use netval_core::model::NewLink;
use netval_core::model::NewProject;
use netval_core::model::PlanId;
use netval_core::model::PlanStatus;
use netval_core::model::PortState;
use netval_core::model::Project;
use netval_core::model::ProjectId;
use netval_core::model::RemediationItem;
use netval_core::model::RemediationPlan;
use netval_core::model::SnapshotId;
use netval_core::model::SnapshotSource;
use netval_core::model::hashing::hash_bytes;
use netval_core::model::vlan_in_range;
use netval_core::parser::ParsedConfig;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` topology store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Creates a config with the default busy timeout.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Shorthand for mapping rusqlite failures.
fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed topology store with WAL support.
#[derive(Clone)]
pub struct SqliteTopologyStore {
    /// Shared `SQLite` connection guarded by a mutex; the mutex serializes
    /// writers per the store contract.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTopologyStore {
    /// Opens an `SQLite`-backed topology store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs a closure inside one transaction on the locked connection.
    fn with_tx<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| StoreError::Db("connection mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(db_err)?;
        let value = body(&tx)?;
        tx.commit().map_err(db_err)?;
        Ok(value)
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Opens an `SQLite` connection with the durability pragmas the store
/// contract requires.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = wal;
             PRAGMA synchronous = normal;",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(SCHEMA_SQL).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Full schema: one table per entity, cascading foreign keys from projects
/// down, and name uniqueness per device on interfaces.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    hostname TEXT NOT NULL,
    role TEXT NOT NULL,
    vendor TEXT NOT NULL,
    platform TEXT NOT NULL,
    management_ip TEXT,
    canvas_x REAL NOT NULL,
    canvas_y REAL NOT NULL,
    credential_ref TEXT,
    config_hash TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_devices_project ON devices (project_id);
CREATE TABLE IF NOT EXISTS interfaces (
    id TEXT PRIMARY KEY,
    device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    mode TEXT NOT NULL,
    vlan_access INTEGER,
    vlan_trunk_allowed TEXT NOT NULL,
    vlan_native INTEGER,
    ip_address TEXT,
    ip_mask TEXT,
    duplex TEXT NOT NULL,
    helper_addresses TEXT NOT NULL,
    state TEXT NOT NULL,
    UNIQUE (device_id, name)
);
CREATE TABLE IF NOT EXISTS device_vlans (
    device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    vlan_id INTEGER NOT NULL,
    name TEXT,
    PRIMARY KEY (device_id, vlan_id)
);
CREATE TABLE IF NOT EXISTS links (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    source_device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    source_interface TEXT NOT NULL,
    target_device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    target_interface TEXT NOT NULL,
    medium TEXT NOT NULL,
    vlan_allow_list TEXT NOT NULL,
    state TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_links_project ON links (project_id);
CREATE TABLE IF NOT EXISTS config_snapshots (
    id TEXT PRIMARY KEY,
    device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    raw_config TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    source TEXT NOT NULL,
    taken_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_device ON config_snapshots (device_id, taken_at);
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    result_json TEXT,
    started_at TEXT,
    completed_at TEXT
);
CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    items_json TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    applied_at TEXT
);
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    device_id TEXT,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    detail TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
";

// ============================================================================
// SECTION: Row Mapping Helpers
// ============================================================================

/// Formats a timestamp in the stable RFC 3339 storage form.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// Parses a stored RFC 3339 timestamp.
fn parse_time(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| StoreError::Invalid(format!("bad stored timestamp '{text}': {err}")))
}

/// Serializes a VLAN list column.
fn vlans_to_json(vlans: &[u16]) -> String {
    serde_json::to_string(vlans).unwrap_or_else(|_| "[]".to_string())
}

/// Deserializes a VLAN list column.
fn vlans_from_json(text: &str) -> Result<Vec<u16>, StoreError> {
    serde_json::from_str(text)
        .map_err(|err| StoreError::Invalid(format!("bad stored vlan list: {err}")))
}

/// Serializes a string list column.
fn strings_to_json(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Deserializes a string list column.
fn strings_from_json(text: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(text)
        .map_err(|err| StoreError::Invalid(format!("bad stored string list: {err}")))
}

/// Raw project row.
struct ProjectRow {
    id: String,
    name: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project, StoreError> {
        Ok(Project {
            id: ProjectId::new(self.id),
            name: self.name,
            description: self.description,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

/// Raw device row.
struct DeviceRow {
    id: String,
    project_id: String,
    hostname: String,
    role: String,
    vendor: String,
    platform: String,
    management_ip: Option<String>,
    canvas_x: f64,
    canvas_y: f64,
    credential_ref: Option<String>,
    config_hash: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DeviceRow {
    fn into_device(self) -> Result<Device, StoreError> {
        Ok(Device {
            id: DeviceId::new(self.id),
            project_id: ProjectId::new(self.project_id),
            hostname: self.hostname,
            role: DeviceRole::parse(&self.role)
                .ok_or_else(|| StoreError::Invalid(format!("bad stored role '{}'", self.role)))?,
            vendor: self.vendor,
            platform: self.platform,
            management_ip: self.management_ip,
            canvas_x: self.canvas_x,
            canvas_y: self.canvas_y,
            credential_ref: self.credential_ref.map(CredentialRef::new),
            config_hash: self.config_hash,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

/// Raw link row.
struct LinkRow {
    id: String,
    project_id: String,
    source_device_id: String,
    source_interface: String,
    target_device_id: String,
    target_interface: String,
    medium: String,
    vlan_allow_list: String,
    state: String,
}

impl LinkRow {
    fn into_link(self) -> Result<Link, StoreError> {
        Ok(Link {
            id: LinkId::new(self.id),
            project_id: ProjectId::new(self.project_id),
            source_device_id: DeviceId::new(self.source_device_id),
            source_interface: self.source_interface,
            target_device_id: DeviceId::new(self.target_device_id),
            target_interface: self.target_interface,
            medium: LinkMedium::parse(&self.medium).ok_or_else(|| {
                StoreError::Invalid(format!("bad stored medium '{}'", self.medium))
            })?,
            vlan_allow_list: vlans_from_json(&self.vlan_allow_list)?,
            state: LinkState::parse(&self.state)
                .ok_or_else(|| StoreError::Invalid(format!("bad stored state '{}'", self.state)))?,
        })
    }
}

/// Fetches a project row inside a transaction.
fn project_exists(tx: &Transaction<'_>, id: &ProjectId) -> Result<bool, StoreError> {
    tx.query_row("SELECT 1 FROM projects WHERE id = ?1", params![id.as_str()], |_| Ok(()))
        .optional()
        .map_err(db_err)
        .map(|row| row.is_some())
}

/// Refreshes a project's `updated_at` stamp.
fn touch_project(tx: &Transaction<'_>, id: &ProjectId, now: DateTime<Utc>) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE projects SET updated_at = ?2 WHERE id = ?1",
        params![id.as_str(), format_time(now)],
    )
    .map_err(db_err)?;
    Ok(())
}

// ============================================================================
// SECTION: TopologyStore Implementation
// ============================================================================

impl TopologyStore for SqliteTopologyStore {
    fn create_project(&self, new: &NewProject) -> Result<Project, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Constraint("project name must not be empty".to_string()));
        }
        let now = Utc::now();
        let project = Project {
            id: ProjectId::generate(),
            name: new.name.clone(),
            description: new.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO projects (id, name, description, created_at, updated_at) VALUES \
                 (?1, ?2, ?3, ?4, ?5)",
                params![
                    project.id.as_str(),
                    project.name,
                    project.description,
                    format_time(project.created_at),
                    format_time(project.updated_at)
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })?;
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, name, description, created_at, updated_at FROM projects ORDER BY \
                     created_at, id",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![], |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                })
                .map_err(db_err)?;
            let mut projects = Vec::new();
            for row in rows {
                projects.push(row.map_err(db_err)?.into_project()?);
            }
            Ok(projects)
        })
    }

    fn get_project(&self, id: &ProjectId) -> Result<Project, StoreError> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT id, name, description, created_at, updated_at FROM projects WHERE id \
                     = ?1",
                    params![id.as_str()],
                    |row| {
                        Ok(ProjectRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()
                .map_err(db_err)?;
            row.ok_or_else(|| StoreError::NotFound(format!("project {id}")))?.into_project()
        })
    }

    fn delete_project(&self, id: &ProjectId) -> Result<Vec<CredentialRef>, StoreError> {
        self.with_tx(|tx| {
            if !project_exists(tx, id)? {
                return Err(StoreError::NotFound(format!("project {id}")));
            }
            let mut statement = tx
                .prepare(
                    "SELECT credential_ref FROM devices WHERE project_id = ?1 AND credential_ref \
                     IS NOT NULL",
                )
                .map_err(db_err)?;
            let refs = statement
                .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .collect::<Result<Vec<String>, _>>()
                .map_err(db_err)?;
            drop(statement);
            tx.execute("DELETE FROM projects WHERE id = ?1", params![id.as_str()])
                .map_err(db_err)?;
            Ok(refs.into_iter().map(CredentialRef::new).collect())
        })
    }

    fn create_device(&self, project: &ProjectId, new: &NewDevice) -> Result<Device, StoreError> {
        if new.hostname.trim().is_empty() {
            return Err(StoreError::Constraint("device hostname must not be empty".to_string()));
        }
        let now = Utc::now();
        let device = Device {
            id: DeviceId::generate(),
            project_id: project.clone(),
            hostname: new.hostname.clone(),
            role: new.role,
            vendor: new.vendor.clone(),
            platform: new.platform.clone(),
            management_ip: new.management_ip.clone(),
            canvas_x: new.canvas_x,
            canvas_y: new.canvas_y,
            credential_ref: None,
            config_hash: None,
            created_at: now,
            updated_at: now,
        };
        self.with_tx(|tx| {
            if !project_exists(tx, project)? {
                return Err(StoreError::NotFound(format!("project {project}")));
            }
            tx.execute(
                "INSERT INTO devices (id, project_id, hostname, role, vendor, platform, \
                 management_ip, canvas_x, canvas_y, credential_ref, config_hash, created_at, \
                 updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, ?10, ?11)",
                params![
                    device.id.as_str(),
                    project.as_str(),
                    device.hostname,
                    device.role.as_str(),
                    device.vendor,
                    device.platform,
                    device.management_ip,
                    device.canvas_x,
                    device.canvas_y,
                    format_time(device.created_at),
                    format_time(device.updated_at)
                ],
            )
            .map_err(db_err)?;
            touch_project(tx, project, now)
        })?;
        Ok(device)
    }

    fn list_devices(&self, project: &ProjectId) -> Result<Vec<Device>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, project_id, hostname, role, vendor, platform, management_ip, \
                     canvas_x, canvas_y, credential_ref, config_hash, created_at, updated_at \
                     FROM devices WHERE project_id = ?1 ORDER BY id",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![project.as_str()], map_device_row)
                .map_err(db_err)?;
            let mut devices = Vec::new();
            for row in rows {
                devices.push(row.map_err(db_err)?.into_device()?);
            }
            Ok(devices)
        })
    }

    fn get_device(&self, id: &DeviceId) -> Result<Device, StoreError> {
        self.with_tx(|tx| get_device_tx(tx, id))
    }

    fn delete_device(&self, id: &DeviceId) -> Result<Option<CredentialRef>, StoreError> {
        self.with_tx(|tx| {
            let device = get_device_tx(tx, id)?;
            // Links referencing the device cascade via foreign keys.
            tx.execute("DELETE FROM devices WHERE id = ?1", params![id.as_str()])
                .map_err(db_err)?;
            touch_project(tx, &device.project_id, Utc::now())?;
            Ok(device.credential_ref)
        })
    }

    fn set_device_credential(
        &self,
        id: &DeviceId,
        reference: Option<&CredentialRef>,
    ) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE devices SET credential_ref = ?2, updated_at = ?3 WHERE id = ?1",
                    params![
                        id.as_str(),
                        reference.map(CredentialRef::as_str),
                        format_time(Utc::now())
                    ],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("device {id}")));
            }
            Ok(())
        })
    }

    fn replace_device_model(
        &self,
        id: &DeviceId,
        parsed: &ParsedConfig,
    ) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let device = get_device_tx(tx, id)?;
            tx.execute("DELETE FROM interfaces WHERE device_id = ?1", params![id.as_str()])
                .map_err(db_err)?;
            tx.execute("DELETE FROM device_vlans WHERE device_id = ?1", params![id.as_str()])
                .map_err(db_err)?;
            for iface in &parsed.interfaces {
                tx.execute(
                    "INSERT OR REPLACE INTO interfaces (id, device_id, name, description, mode, \
                     vlan_access, vlan_trunk_allowed, vlan_native, ip_address, ip_mask, duplex, \
                     helper_addresses, state) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                     ?11, ?12, ?13)",
                    params![
                        InterfaceId::generate().as_str(),
                        id.as_str(),
                        iface.name,
                        iface.description,
                        iface.mode.as_str(),
                        iface.vlan_access,
                        vlans_to_json(&iface.vlan_trunk_allowed),
                        iface.vlan_native,
                        iface.ip_address,
                        iface.ip_mask,
                        iface.duplex.as_str(),
                        strings_to_json(&iface.helper_addresses),
                        iface.state.as_str()
                    ],
                )
                .map_err(db_err)?;
            }
            for vlan in &parsed.vlans {
                tx.execute(
                    "INSERT OR REPLACE INTO device_vlans (device_id, vlan_id, name) VALUES (?1, \
                     ?2, ?3)",
                    params![id.as_str(), vlan.id, vlan.name],
                )
                .map_err(db_err)?;
            }
            let hostname = parsed.hostname.clone().unwrap_or(device.hostname);
            tx.execute(
                "UPDATE devices SET hostname = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.as_str(), hostname, format_time(Utc::now())],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn list_interfaces(&self, device: &DeviceId) -> Result<Vec<Interface>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, device_id, name, description, mode, vlan_access, \
                     vlan_trunk_allowed, vlan_native, ip_address, ip_mask, duplex, \
                     helper_addresses, state FROM interfaces WHERE device_id = ?1 ORDER BY name",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![device.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<u16>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<u16>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, Option<String>>(9)?,
                        row.get::<_, String>(10)?,
                        row.get::<_, String>(11)?,
                        row.get::<_, String>(12)?,
                    ))
                })
                .map_err(db_err)?;
            let mut interfaces = Vec::new();
            for row in rows {
                let (
                    id,
                    device_id,
                    name,
                    description,
                    mode,
                    vlan_access,
                    vlan_trunk_allowed,
                    vlan_native,
                    ip_address,
                    ip_mask,
                    duplex,
                    helper_addresses,
                    state,
                ) = row.map_err(db_err)?;
                interfaces.push(Interface {
                    id: InterfaceId::new(id),
                    device_id: DeviceId::new(device_id),
                    name,
                    description,
                    mode: InterfaceMode::parse(&mode).ok_or_else(|| {
                        StoreError::Invalid(format!("bad stored mode '{mode}'"))
                    })?,
                    vlan_access,
                    vlan_trunk_allowed: vlans_from_json(&vlan_trunk_allowed)?,
                    vlan_native,
                    ip_address,
                    ip_mask,
                    duplex: DuplexMode::parse(&duplex).ok_or_else(|| {
                        StoreError::Invalid(format!("bad stored duplex '{duplex}'"))
                    })?,
                    helper_addresses: strings_from_json(&helper_addresses)?,
                    state: PortState::parse(&state).ok_or_else(|| {
                        StoreError::Invalid(format!("bad stored state '{state}'"))
                    })?,
                });
            }
            Ok(interfaces)
        })
    }

    fn list_device_vlans(&self, device: &DeviceId) -> Result<Vec<DeviceVlan>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT device_id, vlan_id, name FROM device_vlans WHERE device_id = ?1 \
                     ORDER BY vlan_id",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![device.as_str()], |row| {
                    Ok(DeviceVlan {
                        device_id: DeviceId::new(row.get::<_, String>(0)?),
                        vlan_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                })
                .map_err(db_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
        })
    }

    fn create_link(&self, project: &ProjectId, new: &NewLink) -> Result<Link, StoreError> {
        let mut allow_list = new.vlan_allow_list.clone();
        allow_list.sort_unstable();
        allow_list.dedup();
        if let Some(bad) = allow_list.iter().find(|vlan| !vlan_in_range(**vlan)) {
            return Err(StoreError::Constraint(format!(
                "vlan {bad} in allow list outside 1..4094"
            )));
        }
        let link = Link {
            id: LinkId::generate(),
            project_id: project.clone(),
            source_device_id: new.source_device_id.clone(),
            source_interface: new.source_interface.clone(),
            target_device_id: new.target_device_id.clone(),
            target_interface: new.target_interface.clone(),
            medium: new.medium,
            vlan_allow_list: allow_list,
            state: LinkState::Pending,
        };
        self.with_tx(|tx| {
            if !project_exists(tx, project)? {
                return Err(StoreError::NotFound(format!("project {project}")));
            }
            for endpoint in [&link.source_device_id, &link.target_device_id] {
                let owner: Option<String> = tx
                    .query_row(
                        "SELECT project_id FROM devices WHERE id = ?1",
                        params![endpoint.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(db_err)?;
                match owner {
                    None => {
                        return Err(StoreError::Constraint(format!(
                            "link endpoint device {endpoint} does not exist"
                        )));
                    }
                    Some(owner) if owner != project.as_str() => {
                        return Err(StoreError::Constraint(format!(
                            "link endpoint device {endpoint} belongs to another project"
                        )));
                    }
                    Some(_) => {}
                }
            }
            tx.execute(
                "INSERT INTO links (id, project_id, source_device_id, source_interface, \
                 target_device_id, target_interface, medium, vlan_allow_list, state) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    link.id.as_str(),
                    project.as_str(),
                    link.source_device_id.as_str(),
                    link.source_interface,
                    link.target_device_id.as_str(),
                    link.target_interface,
                    link.medium.as_str(),
                    vlans_to_json(&link.vlan_allow_list),
                    link.state.as_str()
                ],
            )
            .map_err(db_err)?;
            touch_project(tx, project, Utc::now())
        })?;
        Ok(link)
    }

    fn list_links(&self, project: &ProjectId) -> Result<Vec<Link>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, project_id, source_device_id, source_interface, \
                     target_device_id, target_interface, medium, vlan_allow_list, state FROM \
                     links WHERE project_id = ?1 ORDER BY id",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![project.as_str()], |row| {
                    Ok(LinkRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        source_device_id: row.get(2)?,
                        source_interface: row.get(3)?,
                        target_device_id: row.get(4)?,
                        target_interface: row.get(5)?,
                        medium: row.get(6)?,
                        vlan_allow_list: row.get(7)?,
                        state: row.get(8)?,
                    })
                })
                .map_err(db_err)?;
            let mut links = Vec::new();
            for row in rows {
                links.push(row.map_err(db_err)?.into_link()?);
            }
            Ok(links)
        })
    }

    fn delete_link(&self, id: &LinkId) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let deleted = tx
                .execute("DELETE FROM links WHERE id = ?1", params![id.as_str()])
                .map_err(db_err)?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("link {id}")));
            }
            Ok(())
        })
    }

    fn set_link_state(&self, id: &LinkId, state: LinkState) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE links SET state = ?2 WHERE id = ?1",
                    params![id.as_str(), state.as_str()],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("link {id}")));
            }
            Ok(())
        })
    }

    fn insert_snapshot(
        &self,
        device: &DeviceId,
        raw_config: &str,
        source: SnapshotSource,
    ) -> Result<ConfigSnapshot, StoreError> {
        let snapshot = ConfigSnapshot {
            id: SnapshotId::generate(),
            device_id: device.clone(),
            raw_config: raw_config.to_string(),
            config_hash: hash_bytes(raw_config.as_bytes()),
            source,
            taken_at: Utc::now(),
        };
        self.with_tx(|tx| {
            let device_row = get_device_tx(tx, device)?;
            tx.execute(
                "INSERT INTO config_snapshots (id, device_id, raw_config, config_hash, source, \
                 taken_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    snapshot.id.as_str(),
                    device.as_str(),
                    snapshot.raw_config,
                    snapshot.config_hash,
                    snapshot.source.as_str(),
                    format_time(snapshot.taken_at)
                ],
            )
            .map_err(db_err)?;
            if source != SnapshotSource::PrePush {
                tx.execute(
                    "UPDATE devices SET config_hash = ?2, updated_at = ?3 WHERE id = ?1",
                    params![
                        device.as_str(),
                        snapshot.config_hash,
                        format_time(snapshot.taken_at)
                    ],
                )
                .map_err(db_err)?;
            }
            touch_project(tx, &device_row.project_id, snapshot.taken_at)
        })?;
        Ok(snapshot)
    }

    fn latest_snapshot(
        &self,
        device: &DeviceId,
        include_pre_push: bool,
    ) -> Result<Option<ConfigSnapshot>, StoreError> {
        self.with_tx(|tx| {
            let sql = if include_pre_push {
                "SELECT id, device_id, raw_config, config_hash, source, taken_at FROM \
                 config_snapshots WHERE device_id = ?1 ORDER BY taken_at DESC, id DESC LIMIT 1"
            } else {
                "SELECT id, device_id, raw_config, config_hash, source, taken_at FROM \
                 config_snapshots WHERE device_id = ?1 AND source != 'pre_push' ORDER BY \
                 taken_at DESC, id DESC LIMIT 1"
            };
            let row = tx
                .query_row(sql, params![device.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .optional()
                .map_err(db_err)?;
            let Some((id, device_id, raw_config, config_hash, source, taken_at)) = row else {
                return Ok(None);
            };
            Ok(Some(ConfigSnapshot {
                id: SnapshotId::new(id),
                device_id: DeviceId::new(device_id),
                raw_config,
                config_hash,
                source: SnapshotSource::parse(&source).ok_or_else(|| {
                    StoreError::Invalid(format!("bad stored snapshot source '{source}'"))
                })?,
                taken_at: parse_time(&taken_at)?,
            }))
        })
    }

    fn create_job(&self, project: &ProjectId, kind: JobKind) -> Result<JobRecord, StoreError> {
        let job = JobRecord {
            id: JobId::generate(),
            project_id: project.clone(),
            kind,
            status: JobStatus::Queued,
            result: None,
            started_at: None,
            completed_at: None,
        };
        self.with_tx(|tx| {
            if !project_exists(tx, project)? {
                return Err(StoreError::NotFound(format!("project {project}")));
            }
            tx.execute(
                "INSERT INTO jobs (id, project_id, kind, status, result_json, started_at, \
                 completed_at) VALUES (?1, ?2, ?3, ?4, NULL, NULL, NULL)",
                params![job.id.as_str(), project.as_str(), kind.as_str(), job.status.as_str()],
            )
            .map_err(db_err)?;
            Ok(())
        })?;
        Ok(job)
    }

    fn start_job(&self, id: &JobId) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE jobs SET status = 'running', started_at = ?2 WHERE id = ?1",
                    params![id.as_str(), format_time(Utc::now())],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("job {id}")));
            }
            Ok(())
        })
    }

    fn finish_job(
        &self,
        id: &JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Constraint(format!(
                "job terminal status required, got {}",
                status.as_str()
            )));
        }
        self.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE jobs SET status = ?2, result_json = ?3, completed_at = ?4 WHERE id = \
                     ?1",
                    params![
                        id.as_str(),
                        status.as_str(),
                        result.to_string(),
                        format_time(Utc::now())
                    ],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("job {id}")));
            }
            Ok(())
        })
    }

    fn get_job(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT id, project_id, kind, status, result_json, started_at, completed_at \
                     FROM jobs WHERE id = ?1",
                    params![id.as_str()],
                    map_job_row,
                )
                .optional()
                .map_err(db_err)?;
            let raw = row.ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
            job_from_row(raw)
        })
    }

    fn list_open_jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, project_id, kind, status, result_json, started_at, completed_at \
                     FROM jobs WHERE status IN ('queued', 'running') ORDER BY id",
                )
                .map_err(db_err)?;
            let rows = statement.query_map(params![], map_job_row).map_err(db_err)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(job_from_row(row.map_err(db_err)?)?);
            }
            Ok(jobs)
        })
    }

    fn latest_complete_simulation(
        &self,
        project: &ProjectId,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT id, project_id, kind, status, result_json, started_at, completed_at \
                     FROM jobs WHERE project_id = ?1 AND kind = 'simulation' AND status = \
                     'complete' ORDER BY completed_at DESC, id DESC LIMIT 1",
                    params![project.as_str()],
                    map_job_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(job_from_row).transpose()
        })
    }

    fn save_plan(&self, plan: &RemediationPlan) -> Result<(), StoreError> {
        let items_json = serde_json::to_string(&plan.items)
            .map_err(|err| StoreError::Invalid(format!("plan items encode failed: {err}")))?;
        self.with_tx(|tx| {
            if !project_exists(tx, &plan.project_id)? {
                return Err(StoreError::NotFound(format!("project {}", plan.project_id)));
            }
            tx.execute(
                "INSERT INTO plans (id, project_id, items_json, status, created_at, applied_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    plan.id.as_str(),
                    plan.project_id.as_str(),
                    items_json,
                    plan.status.as_str(),
                    format_time(plan.created_at),
                    plan.applied_at.map(format_time)
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn update_plan(&self, plan: &RemediationPlan) -> Result<(), StoreError> {
        let items_json = serde_json::to_string(&plan.items)
            .map_err(|err| StoreError::Invalid(format!("plan items encode failed: {err}")))?;
        self.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE plans SET items_json = ?2, status = ?3, applied_at = ?4 WHERE id = ?1",
                    params![
                        plan.id.as_str(),
                        items_json,
                        plan.status.as_str(),
                        plan.applied_at.map(format_time)
                    ],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("plan {}", plan.id)));
            }
            Ok(())
        })
    }

    fn get_plan(&self, id: &PlanId) -> Result<RemediationPlan, StoreError> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT id, project_id, items_json, status, created_at, applied_at FROM \
                     plans WHERE id = ?1",
                    params![id.as_str()],
                    map_plan_row,
                )
                .optional()
                .map_err(db_err)?;
            let raw = row.ok_or_else(|| StoreError::NotFound(format!("plan {id}")))?;
            plan_from_row(raw)
        })
    }

    fn latest_plan(&self, project: &ProjectId) -> Result<Option<RemediationPlan>, StoreError> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT id, project_id, items_json, status, created_at, applied_at FROM \
                     plans WHERE project_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![project.as_str()],
                    map_plan_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(plan_from_row).transpose()
        })
    }

    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO audit_log (project_id, device_id, actor, action, detail, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.project_id.as_str(),
                    entry.device_id.as_ref().map(DeviceId::as_str),
                    entry.actor,
                    entry.action,
                    entry.detail,
                    format_time(entry.timestamp)
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn list_audit(&self, project: &ProjectId) -> Result<Vec<AuditLogEntry>, StoreError> {
        self.with_tx(|tx| {
            let mut statement = tx
                .prepare(
                    "SELECT id, project_id, device_id, actor, action, detail, timestamp FROM \
                     audit_log WHERE project_id = ?1 ORDER BY id",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map(params![project.as_str()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .map_err(db_err)?;
            let mut entries = Vec::new();
            for row in rows {
                let (id, project_id, device_id, actor, action, detail, timestamp) =
                    row.map_err(db_err)?;
                entries.push(AuditLogEntry {
                    id,
                    project_id: ProjectId::new(project_id),
                    device_id: device_id.map(DeviceId::new),
                    actor,
                    action,
                    detail,
                    timestamp: parse_time(&timestamp)?,
                });
            }
            Ok(entries)
        })
    }
}

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Maps a device row inside a rusqlite closure.
fn map_device_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRow> {
    Ok(DeviceRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        hostname: row.get(2)?,
        role: row.get(3)?,
        vendor: row.get(4)?,
        platform: row.get(5)?,
        management_ip: row.get(6)?,
        canvas_x: row.get(7)?,
        canvas_y: row.get(8)?,
        credential_ref: row.get(9)?,
        config_hash: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Fetches one device inside a transaction.
fn get_device_tx(tx: &Transaction<'_>, id: &DeviceId) -> Result<Device, StoreError> {
    let row = tx
        .query_row(
            "SELECT id, project_id, hostname, role, vendor, platform, management_ip, canvas_x, \
             canvas_y, credential_ref, config_hash, created_at, updated_at FROM devices WHERE id \
             = ?1",
            params![id.as_str()],
            map_device_row,
        )
        .optional()
        .map_err(db_err)?;
    row.ok_or_else(|| StoreError::NotFound(format!("device {id}")))?.into_device()
}

/// Raw job row tuple.
type JobRow = (String, String, String, String, Option<String>, Option<String>, Option<String>);

/// Maps a job row inside a rusqlite closure.
fn map_job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Converts a raw job row into the model type.
fn job_from_row(raw: JobRow) -> Result<JobRecord, StoreError> {
    let (id, project_id, kind, status, result_json, started_at, completed_at) = raw;
    Ok(JobRecord {
        id: JobId::new(id),
        project_id: ProjectId::new(project_id),
        kind: JobKind::parse(&kind)
            .ok_or_else(|| StoreError::Invalid(format!("bad stored job kind '{kind}'")))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| StoreError::Invalid(format!("bad stored job status '{status}'")))?,
        result: result_json
            .map(|text| {
                serde_json::from_str(&text)
                    .map_err(|err| StoreError::Invalid(format!("bad stored job result: {err}")))
            })
            .transpose()?,
        started_at: started_at.as_deref().map(parse_time).transpose()?,
        completed_at: completed_at.as_deref().map(parse_time).transpose()?,
    })
}

/// Raw plan row tuple.
type PlanRow = (String, String, String, String, String, Option<String>);

/// Maps a plan row inside a rusqlite closure.
fn map_plan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Converts a raw plan row into the model type.
fn plan_from_row(raw: PlanRow) -> Result<RemediationPlan, StoreError> {
    let (id, project_id, items_json, status, created_at, applied_at) = raw;
    let items: Vec<RemediationItem> = serde_json::from_str(&items_json)
        .map_err(|err| StoreError::Invalid(format!("bad stored plan items: {err}")))?;
    Ok(RemediationPlan {
        id: PlanId::new(id),
        project_id: ProjectId::new(project_id),
        items,
        status: PlanStatus::parse(&status)
            .ok_or_else(|| StoreError::Invalid(format!("bad stored plan status '{status}'")))?,
        created_at: parse_time(&created_at)?,
        applied_at: applied_at.as_deref().map(parse_time).transpose()?,
    })
}
