// netval-vault/src/lib.rs
// ============================================================================
// Module: NetVal Credential Vault
// Description: CredentialVault implementations over the OS secret store.
// Purpose: Keep credential material out of the topology store entirely.
// Dependencies: netval-core, keyring, serde_json
// ============================================================================

//! ## Overview
//! [`KeyringVault`] stores credential material in the host OS secret store
//! under the `netval-app` service name, keyed by an opaque reference. The
//! topology store only ever sees the reference. [`MemoryVault`] backs tests
//! and headless environments with the same contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use netval_core::interfaces::CredentialMaterial;
use netval_core::interfaces::CredentialVault;
use netval_core::interfaces::VaultError;
use netval_core::model::CredentialRef;
use netval_core::model::DeviceId;
use netval_core::model::ProjectId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name under which entries live in the OS secret store.
pub const SERVICE_NAME: &str = "netval-app";

// ============================================================================
// SECTION: Keyring Vault
// ============================================================================

/// Vault backed by the host OS secret store.
#[derive(Debug, Default)]
pub struct KeyringVault;

impl KeyringVault {
    /// Creates the keyring-backed vault.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the keyring entry for a reference.
    fn entry(reference: &CredentialRef) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(SERVICE_NAME, reference.as_str())
            .map_err(|err| VaultError::Backend(err.to_string()))
    }
}

impl CredentialVault for KeyringVault {
    fn store(
        &self,
        _project: &ProjectId,
        _device: &DeviceId,
        material: &CredentialMaterial,
    ) -> Result<CredentialRef, VaultError> {
        let reference = CredentialRef::generate();
        let payload = serde_json::to_string(material)
            .map_err(|err| VaultError::Invalid(err.to_string()))?;
        Self::entry(&reference)?
            .set_password(&payload)
            .map_err(|err| VaultError::Backend(err.to_string()))?;
        Ok(reference)
    }

    fn load(&self, reference: &CredentialRef) -> Result<CredentialMaterial, VaultError> {
        let payload = match Self::entry(reference)?.get_password() {
            Ok(payload) => payload,
            Err(keyring::Error::NoEntry) => return Err(VaultError::NotFound),
            Err(err) => return Err(VaultError::Backend(err.to_string())),
        };
        serde_json::from_str(&payload).map_err(|err| VaultError::Invalid(err.to_string()))
    }

    fn delete(&self, reference: &CredentialRef) -> Result<(), VaultError> {
        match Self::entry(reference)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(VaultError::Backend(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Memory Vault
// ============================================================================

/// In-memory vault for tests and headless environments.
#[derive(Debug, Default)]
pub struct MemoryVault {
    /// Entries keyed by reference.
    entries: Mutex<HashMap<String, CredentialMaterial>>,
}

impl MemoryVault {
    /// Creates an empty in-memory vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entries, for test assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialVault for MemoryVault {
    fn store(
        &self,
        _project: &ProjectId,
        _device: &DeviceId,
        material: &CredentialMaterial,
    ) -> Result<CredentialRef, VaultError> {
        let reference = CredentialRef::generate();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Backend("vault mutex poisoned".to_string()))?;
        entries.insert(reference.as_str().to_string(), material.clone());
        Ok(reference)
    }

    fn load(&self, reference: &CredentialRef) -> Result<CredentialMaterial, VaultError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Backend("vault mutex poisoned".to_string()))?;
        entries.get(reference.as_str()).cloned().ok_or(VaultError::NotFound)
    }

    fn delete(&self, reference: &CredentialRef) -> Result<(), VaultError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Backend("vault mutex poisoned".to_string()))?;
        entries.remove(reference.as_str());
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use netval_core::interfaces::CredentialMaterial;
    use netval_core::interfaces::CredentialVault;
    use netval_core::interfaces::VaultError;
    use netval_core::model::DeviceId;
    use netval_core::model::ProjectId;

    use super::MemoryVault;

    fn material() -> CredentialMaterial {
        CredentialMaterial {
            username: "admin".to_string(),
            password: Some("secret".to_string()),
            key_path: None,
        }
    }

    #[test]
    fn memory_vault_roundtrip() {
        let vault = MemoryVault::new();
        let reference = vault
            .store(&ProjectId::new("p"), &DeviceId::new("d"), &material())
            .expect("store");
        let loaded = vault.load(&reference).expect("load");
        assert_eq!(loaded, material());
    }

    #[test]
    fn memory_vault_delete_is_idempotent() {
        let vault = MemoryVault::new();
        let reference = vault
            .store(&ProjectId::new("p"), &DeviceId::new("d"), &material())
            .expect("store");
        vault.delete(&reference).expect("first delete");
        vault.delete(&reference).expect("second delete");
        assert!(matches!(vault.load(&reference), Err(VaultError::NotFound)));
    }

    #[test]
    fn debug_output_redacts_password() {
        let text = format!("{:?}", material());
        assert!(!text.contains("secret"));
        assert!(text.contains("<redacted>"));
    }
}
