// CLASSIFICATION: COMMUNITY
// Filename: provision.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Write-side operations used by the setup wizards and the login screen.
//!
//! Every mutation of a tracked key re-seals `CRC` before the namespace is
//! closed, so a record written here always validates.

use thiserror::Error;

use crate::credential;
use crate::record::{
    self, NamespaceRecord, ZapNumberPolicy, KEY_PASSWORD_HASH, KEY_VERSION, KEY_ZAPNUMBER,
    NAMESPACE,
};
use crate::store::{FlashPartition, KeyValueStore, OpenMode, StoreError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("ZapNumber {0:?} does not match the required format")]
    InvalidZapNumber(String),
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("no password has been provisioned")]
    NotProvisioned,
    #[error("record fails CRC (stored 0x{stored:08X}, calculated 0x{calculated:08X}); factory reset required")]
    Tampered { stored: u32, calculated: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Provisioner<'a, P: FlashPartition> {
    store: &'a mut KeyValueStore<P>,
    policy: ZapNumberPolicy,
    version: u32,
}

impl<'a, P: FlashPartition> Provisioner<'a, P> {
    pub fn new(store: &'a mut KeyValueStore<P>) -> Self {
        Self {
            store,
            policy: ZapNumberPolicy::default(),
            version: record::SCHEMA_VERSION,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ZapNumberPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Store a ZapNumber and re-seal.
    pub fn set_zap_number(&mut self, zap_number: &str) -> Result<u32, ProvisionError> {
        if !self.policy.is_valid(zap_number) {
            return Err(ProvisionError::InvalidZapNumber(zap_number.to_string()));
        }
        let crc = self.write_sealed(KEY_ZAPNUMBER, zap_number)?;
        self.store
            .reporter()
            .info(&format!("[provision] ZapNumber saved: {zap_number}"));
        Ok(crc)
    }

    /// Hash and store a password, then re-seal.
    pub fn set_password(&mut self, password: &str) -> Result<u32, ProvisionError> {
        if password.is_empty() {
            return Err(ProvisionError::EmptyPassword);
        }
        let hash = credential::hash(password.as_bytes());
        let crc = self.write_sealed(KEY_PASSWORD_HASH, &hash)?;
        self.store.reporter().info("[provision] password hash saved");
        Ok(crc)
    }

    /// First-time setup: ZapNumber, password, version, CRC.
    pub fn provision(&mut self, zap_number: &str, password: &str) -> Result<u32, ProvisionError> {
        if !self.policy.is_valid(zap_number) {
            return Err(ProvisionError::InvalidZapNumber(zap_number.to_string()));
        }
        if password.is_empty() {
            return Err(ProvisionError::EmptyPassword);
        }
        let mut handle = self.store.open(NAMESPACE, OpenMode::ReadWrite)?;
        handle.put_string(KEY_ZAPNUMBER, zap_number)?;
        handle.put_string(KEY_PASSWORD_HASH, &credential::hash(password.as_bytes()))?;
        handle.put_u32(KEY_VERSION, self.version)?;
        let crc = record::seal(&mut handle)?;
        handle.close()?;
        self.store
            .reporter()
            .info(&format!("[provision] setup complete crc=0x{crc:08X}"));
        Ok(crc)
    }

    /// Check `password` against the stored hash.
    pub fn verify_password(&mut self, password: &str) -> Result<bool, ProvisionError> {
        let handle = self.store.open(NAMESPACE, OpenMode::ReadOnly)?;
        let stored = handle.try_string(KEY_PASSWORD_HASH);
        handle.close()?;
        let stored = stored.ok_or(ProvisionError::NotProvisioned)?;
        let ok = credential::compare(password.as_bytes(), &stored);
        if ok {
            self.store.reporter().info("[login] password accepted");
        } else {
            self.store.reporter().warn("[login] password rejected");
        }
        Ok(ok)
    }

    /// Recompute `CRC` over the current record.
    pub fn reseal(&mut self) -> Result<u32, ProvisionError> {
        let mut handle = self.store.open(NAMESPACE, OpenMode::ReadWrite)?;
        let crc = record::seal(&mut handle)?;
        handle.close()?;
        Ok(crc)
    }

    /// Wipe the namespace and leave a fresh, sealed record at the current version.
    pub fn factory_reset(&mut self) -> Result<(), ProvisionError> {
        let mut handle = self.store.open(NAMESPACE, OpenMode::ReadWrite)?;
        handle.clear()?;
        handle.put_u32(KEY_VERSION, self.version)?;
        record::seal(&mut handle)?;
        handle.close()?;
        self.store.reporter().warn("[provision] factory reset complete");
        Ok(())
    }

    /// Current contents of the namespace.
    pub fn snapshot(&mut self) -> Result<NamespaceRecord, ProvisionError> {
        let handle = self.store.open(NAMESPACE, OpenMode::ReadOnly)?;
        let record = NamespaceRecord::read(&handle);
        handle.close()?;
        Ok(record)
    }

    /// Single-field update. Refuses to re-seal a record whose CRC does not
    /// currently hold, since that would bless the tampered fields.
    fn write_sealed(&mut self, key: &str, value: &str) -> Result<u32, ProvisionError> {
        let mut handle = self.store.open(NAMESPACE, OpenMode::ReadWrite)?;
        let current = NamespaceRecord::read(&handle);
        let calculated = current.checksum();
        if !current.integrity_holds(calculated) {
            handle.close()?;
            self.store
                .reporter()
                .error("[provision] record fails CRC; refusing to re-seal");
            return Err(ProvisionError::Tampered {
                stored: current.crc.unwrap_or(0),
                calculated,
            });
        }
        handle.put_string(key, value)?;
        if !handle.contains(KEY_VERSION) {
            handle.put_u32(KEY_VERSION, self.version)?;
        }
        let crc = record::seal(&mut handle)?;
        handle.close()?;
        Ok(crc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use crate::store::MemoryPartition;
    use crate::validation::{validate, ValidationStatus};

    fn store() -> KeyValueStore<MemoryPartition> {
        KeyValueStore::new(MemoryPartition::new(), MemoryReporter::new())
    }

    #[test]
    fn first_time_setup_validates() {
        let mut store = store();
        Provisioner::new(&mut store)
            .provision("AB1234", "MySecurePassword123")
            .unwrap();
        assert_eq!(validate(&mut store).status, ValidationStatus::Valid);
    }

    #[test]
    fn login_accepts_only_the_right_password() {
        let mut store = store();
        let mut provisioner = Provisioner::new(&mut store);
        provisioner.provision("AB1234", "MySecurePassword123").unwrap();
        assert!(provisioner.verify_password("MySecurePassword123").unwrap());
        assert!(!provisioner.verify_password("WrongPassword").unwrap());
    }

    #[test]
    fn login_before_setup_is_not_provisioned() {
        let mut store = store();
        assert!(matches!(
            Provisioner::new(&mut store).verify_password("x"),
            Err(ProvisionError::NotProvisioned)
        ));
    }

    #[test]
    fn wizard_steps_walk_through_statuses() {
        let mut store = store();
        assert_eq!(validate(&mut store).status, ValidationStatus::MissingZapNumber);
        Provisioner::new(&mut store).set_zap_number("CD5678").unwrap();
        assert_eq!(validate(&mut store).status, ValidationStatus::MissingPassword);
        Provisioner::new(&mut store).set_password("hunter2").unwrap();
        assert_eq!(validate(&mut store).status, ValidationStatus::Valid);
    }

    #[test]
    fn rejects_bad_input() {
        let mut store = store();
        let mut provisioner = Provisioner::new(&mut store);
        assert!(matches!(
            provisioner.set_zap_number("ab12"),
            Err(ProvisionError::InvalidZapNumber(_))
        ));
        assert!(matches!(
            provisioner.set_password(""),
            Err(ProvisionError::EmptyPassword)
        ));
    }

    #[test]
    fn factory_reset_returns_to_setup() {
        let mut store = store();
        Provisioner::new(&mut store)
            .provision("AB1234", "pw")
            .unwrap();
        store
            .partition_mut()
            .poke(NAMESPACE, KEY_ZAPNUMBER, crate::store::StoredValue::Str("ZZ9999".into()));
        assert_eq!(validate(&mut store).status, ValidationStatus::CrcFailed);
        Provisioner::new(&mut store).factory_reset().unwrap();
        assert_eq!(validate(&mut store).status, ValidationStatus::MissingZapNumber);
    }

    #[test]
    fn wizard_steps_refuse_tampered_record() {
        let mut store = store();
        Provisioner::new(&mut store).provision("AB1234", "pw").unwrap();
        store.partition_mut().poke(
            NAMESPACE,
            KEY_ZAPNUMBER,
            crate::store::StoredValue::Str("ZZ9999".into()),
        );
        let mut provisioner = Provisioner::new(&mut store);
        assert!(matches!(
            provisioner.set_password("attacker"),
            Err(ProvisionError::Tampered { .. })
        ));
        assert!(matches!(
            provisioner.set_zap_number("XY0001"),
            Err(ProvisionError::Tampered { .. })
        ));
        let record = provisioner.snapshot().unwrap();
        assert_eq!(record.password_hash.as_deref(), Some(credential::hash(b"pw").as_str()));
        assert_eq!(validate(&mut store).status, ValidationStatus::CrcFailed);
    }

    #[test]
    fn record_from_older_firmware_upgrades() {
        let mut store = store();
        Provisioner::new(&mut store)
            .with_version(1)
            .provision("AB1234", "pw")
            .unwrap();
        let result = validate(&mut store);
        assert_eq!(result.status, ValidationStatus::Upgraded);
        assert_eq!(result.current_version, 1);
    }

    #[test]
    fn reseal_matches_snapshot_checksum() {
        let mut store = store();
        let mut provisioner = Provisioner::new(&mut store);
        provisioner.provision("AB1234", "pw").unwrap();
        let crc = provisioner.reseal().unwrap();
        let record = provisioner.snapshot().unwrap();
        assert_eq!(record.crc, Some(crc));
        assert_eq!(record.checksum(), crc);
    }
}
