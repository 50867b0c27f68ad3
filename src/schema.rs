// CLASSIFICATION: COMMUNITY
// Filename: schema.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Schema version classification and ordered record migration.

use std::fmt;

use serde::Serialize;

use crate::record::{
    self, NamespaceRecord, KEY_CRC, KEY_PASSWORD_HASH, KEY_VERSION, KEY_ZAPNUMBER,
};
use crate::store::{FlashPartition, NamespaceHandle, StoreError};

/// Where the stored version sits relative to the firmware's schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    Uninitialized,
    Current,
    Stale,
    Incompatible,
}

impl SchemaState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Current => "current",
            Self::Stale => "stale",
            Self::Incompatible => "incompatible",
        }
    }
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One version increment: rewrites a record from `from` to `from + 1`.
#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// Version the step upgrades from.
    pub from: u32,
    /// Name used in diagnostics.
    pub name: &'static str,
    /// Rewrites the record in place; the migrator writes and re-seals it.
    pub apply: fn(&mut NamespaceRecord),
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("name", &self.name)
            .finish()
    }
}

/// v1 stored identifiers in whatever case the wizard produced.
fn normalise_identifiers(record: &mut NamespaceRecord) {
    if let Some(zap) = record.zap_number.as_mut() {
        *zap = zap.to_ascii_uppercase();
    }
    if let Some(hash) = record.password_hash.as_mut() {
        *hash = hash.to_ascii_lowercase();
    }
}

/// Steps shipped with this firmware.
pub const BUILTIN_STEPS: &[MigrationStep] = &[MigrationStep {
    from: 1,
    name: "normalise-identifiers",
    apply: normalise_identifiers,
}];

/// Result of a migrator pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Classification of the stored version.
    pub state: SchemaState,
    /// Version found before the pass, 0 when absent.
    pub stored_version: u32,
    /// The record was migrated and re-sealed.
    pub was_upgraded: bool,
    /// A stale record whose CRC did not verify was left untouched.
    pub held_for_integrity: bool,
}

#[derive(Clone, Debug)]
pub struct SchemaMigrator {
    expected: u32,
    min_migratable: u32,
    steps: Vec<MigrationStep>,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new(record::SCHEMA_VERSION).with_steps(BUILTIN_STEPS)
    }
}

impl SchemaMigrator {
    /// Migrator with no steps registered.
    #[must_use]
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            min_migratable: 1,
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_steps(mut self, steps: &[MigrationStep]) -> Self {
        for step in steps {
            self.steps.retain(|s| s.from != step.from);
            self.steps.push(*step);
        }
        self.steps.sort_by_key(|s| s.from);
        self
    }

    /// Oldest stored version that may still be migrated.
    #[must_use]
    pub fn with_min_migratable(mut self, version: u32) -> Self {
        self.min_migratable = version.max(1);
        self
    }

    #[must_use]
    pub fn expected(&self) -> u32 {
        self.expected
    }

    fn step_for(&self, from: u32) -> Option<&MigrationStep> {
        self.steps.iter().find(|s| s.from == from)
    }

    fn has_path(&self, stored: u32) -> bool {
        (stored..self.expected).all(|v| self.step_for(v).is_some())
    }

    #[must_use]
    pub fn classify(&self, stored: u32) -> SchemaState {
        if stored == 0 {
            SchemaState::Uninitialized
        } else if stored == self.expected {
            SchemaState::Current
        } else if stored < self.expected && stored >= self.min_migratable && self.has_path(stored)
        {
            SchemaState::Stale
        } else {
            SchemaState::Incompatible
        }
    }

    /// Classify the namespace and bring it up to the expected version.
    pub fn run<P: FlashPartition>(
        &self,
        handle: &mut NamespaceHandle<'_, P>,
    ) -> Result<MigrationOutcome, StoreError> {
        let record = NamespaceRecord::read(handle);
        let stored_version = record.stored_version();
        let state = self.classify(stored_version);
        let mut outcome = MigrationOutcome {
            state,
            stored_version,
            was_upgraded: false,
            held_for_integrity: false,
        };

        match state {
            SchemaState::Current => {}
            SchemaState::Uninitialized => {
                handle.put_u32(KEY_VERSION, self.expected)?;
                if record.is_blank() {
                    record::seal(handle)?;
                }
                handle
                    .reporter()
                    .info(&format!("[schema] initialised VERSION={}", self.expected));
            }
            SchemaState::Stale => {
                if !record.integrity_holds(record.checksum()) {
                    handle.reporter().warn(&format!(
                        "[schema] v{stored_version} record fails CRC; migration withheld"
                    ));
                    outcome.held_for_integrity = true;
                    return Ok(outcome);
                }
                let mut migrated = record.clone();
                for version in stored_version..self.expected {
                    if let Some(step) = self.step_for(version) {
                        (step.apply)(&mut migrated);
                        handle.reporter().info(&format!(
                            "[schema] step {} v{} -> v{}",
                            step.name,
                            version,
                            version + 1
                        ));
                    }
                }
                let crc = match self.write_migrated(handle, &record, &migrated) {
                    Ok(crc) => crc,
                    Err(err) => {
                        handle.reporter().error(&format!(
                            "[schema] migration from v{stored_version} failed: {err}"
                        ));
                        restore(handle, &record);
                        return Err(err);
                    }
                };
                outcome.was_upgraded = true;
                handle.reporter().info(&format!(
                    "[schema] upgraded v{stored_version} -> v{} crc=0x{crc:08X}",
                    self.expected
                ));
            }
            SchemaState::Incompatible => {
                handle.reporter().error(&format!(
                    "[schema] stored v{stored_version} incompatible with v{}",
                    self.expected
                ));
            }
        }
        Ok(outcome)
    }
}

impl SchemaMigrator {
    fn write_migrated<P: FlashPartition>(
        &self,
        handle: &mut NamespaceHandle<'_, P>,
        original: &NamespaceRecord,
        migrated: &NamespaceRecord,
    ) -> Result<u32, StoreError> {
        if migrated.zap_number != original.zap_number {
            if let Some(zap) = migrated.zap_number.as_deref() {
                handle.put_string(KEY_ZAPNUMBER, zap)?;
            }
        }
        if migrated.password_hash != original.password_hash {
            if let Some(hash) = migrated.password_hash.as_deref() {
                handle.put_string(KEY_PASSWORD_HASH, hash)?;
            }
        }
        handle.put_u32(KEY_VERSION, self.expected)?;
        record::seal(handle)
    }
}

/// Put every tracked key back to its pre-migration value.
///
/// Best effort: the flash that just failed may refuse these writes too, in
/// which case the handle is poisoned and its pending changes are discarded
/// rather than committed.
fn restore<P: FlashPartition>(handle: &mut NamespaceHandle<'_, P>, original: &NamespaceRecord) {
    let results = [
        restore_str(handle, KEY_ZAPNUMBER, original.zap_number.as_deref()),
        restore_str(handle, KEY_PASSWORD_HASH, original.password_hash.as_deref()),
        handle.put_u32(KEY_VERSION, original.stored_version()),
        match original.crc {
            Some(crc) => handle.put_u32(KEY_CRC, crc),
            None => handle.remove(KEY_CRC).map(|_| ()),
        },
    ];
    let failed = results.iter().filter(|res| res.is_err()).count();
    if failed > 0 {
        handle.reporter().warn(&format!(
            "[schema] {failed} key(s) not restored; pending changes will be discarded"
        ));
    }
}

fn restore_str<P: FlashPartition>(
    handle: &mut NamespaceHandle<'_, P>,
    key: &str,
    value: Option<&str>,
) -> Result<(), StoreError> {
    match value {
        Some(value) => handle.put_string(key, value),
        None => handle.remove(key).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NAMESPACE;
    use crate::report::MemoryReporter;
    use crate::store::{KeyValueStore, MemoryPartition, OpenMode};

    fn store() -> KeyValueStore<MemoryPartition> {
        KeyValueStore::new(MemoryPartition::new(), MemoryReporter::new())
    }

    #[test]
    fn classification_follows_version_order() {
        let migrator = SchemaMigrator::default();
        assert_eq!(migrator.classify(0), SchemaState::Uninitialized);
        assert_eq!(migrator.classify(1), SchemaState::Stale);
        assert_eq!(migrator.classify(2), SchemaState::Current);
        assert_eq!(migrator.classify(3), SchemaState::Incompatible);
    }

    #[test]
    fn gaps_and_floor_are_incompatible() {
        let gappy = SchemaMigrator::new(4).with_steps(BUILTIN_STEPS);
        assert_eq!(gappy.classify(1), SchemaState::Incompatible);
        assert_eq!(gappy.classify(3), SchemaState::Incompatible);
        let floored = SchemaMigrator::default().with_min_migratable(2);
        assert_eq!(floored.classify(1), SchemaState::Incompatible);
    }

    #[test]
    fn empty_namespace_is_initialised_and_sealed() {
        let mut store = store();
        let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
        let outcome = SchemaMigrator::default().run(&mut handle).unwrap();
        assert_eq!(outcome.state, SchemaState::Uninitialized);
        assert!(!outcome.was_upgraded);
        assert_eq!(handle.get_u32(KEY_VERSION, 0), 2);
        let record = NamespaceRecord::read(&handle);
        assert_eq!(record.crc, Some(record.checksum()));
    }

    #[test]
    fn stale_record_is_normalised_and_resealed() {
        let mut store = store();
        let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
        handle.put_u32(KEY_VERSION, 1).unwrap();
        handle.put_string(KEY_ZAPNUMBER, "ab1234").unwrap();
        handle.put_string(KEY_PASSWORD_HASH, "CBF43926").unwrap();
        record::seal(&mut handle).unwrap();

        let outcome = SchemaMigrator::default().run(&mut handle).unwrap();
        assert_eq!(outcome.state, SchemaState::Stale);
        assert!(outcome.was_upgraded);
        let record = NamespaceRecord::read(&handle);
        assert_eq!(record.version, Some(2));
        assert_eq!(record.zap_number.as_deref(), Some("AB1234"));
        assert_eq!(record.password_hash.as_deref(), Some("cbf43926"));
        assert_eq!(record.crc, Some(record.checksum()));
    }

    #[test]
    fn tampered_stale_record_is_not_resealed() {
        let mut store = store();
        let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
        handle.put_u32(KEY_VERSION, 1).unwrap();
        handle.put_string(KEY_ZAPNUMBER, "AB1234").unwrap();
        handle.put_u32(KEY_CRC, 0xDEAD_BEEF).unwrap();

        let outcome = SchemaMigrator::default().run(&mut handle).unwrap();
        assert_eq!(outcome.state, SchemaState::Stale);
        assert!(outcome.held_for_integrity);
        assert!(!outcome.was_upgraded);
        assert_eq!(handle.get_u32(KEY_VERSION, 0), 1);
        assert_eq!(handle.get_u32(KEY_CRC, 0), 0xDEAD_BEEF);
    }

    #[test]
    fn incompatible_record_is_never_downgraded() {
        let mut store = store();
        let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
        handle.put_u32(KEY_VERSION, 9).unwrap();
        let outcome = SchemaMigrator::default().run(&mut handle).unwrap();
        assert_eq!(outcome.state, SchemaState::Incompatible);
        assert_eq!(handle.get_u32(KEY_VERSION, 0), 9);
        assert!(!handle.contains(KEY_CRC));
    }

    #[test]
    fn populated_record_missing_version_keeps_old_crc() {
        let mut store = store();
        let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
        handle.put_string(KEY_ZAPNUMBER, "AB1234").unwrap();
        handle.put_u32(KEY_CRC, 0x1234_5678).unwrap();
        let outcome = SchemaMigrator::default().run(&mut handle).unwrap();
        assert_eq!(outcome.state, SchemaState::Uninitialized);
        assert_eq!(handle.get_u32(KEY_CRC, 0), 0x1234_5678);
    }

    #[test]
    fn failed_migration_leaves_sealed_v1_record() {
        let reporter = MemoryReporter::new();
        let mut store = KeyValueStore::new(MemoryPartition::new(), reporter.clone());
        {
            let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
            handle.put_u32(KEY_VERSION, 1).unwrap();
            handle.put_string(KEY_ZAPNUMBER, "ab1234").unwrap();
            handle.put_string(KEY_PASSWORD_HASH, "CBF43926").unwrap();
            record::seal(&mut handle).unwrap();
            handle.close().unwrap();
        }
        let before = store.partition().clone();
        store.partition_mut().set_write_budget(1);
        {
            let mut handle = store.open(NAMESPACE, OpenMode::ReadWrite).unwrap();
            assert!(SchemaMigrator::default().run(&mut handle).is_err());
            assert!(handle.is_poisoned());
        }
        assert!(reporter.contains(log::Level::Error, "migration from v1 failed"));

        for key in [KEY_VERSION, KEY_ZAPNUMBER, KEY_PASSWORD_HASH, KEY_CRC] {
            assert_eq!(
                store.partition().peek(NAMESPACE, key),
                before.peek(NAMESPACE, key),
                "{key}"
            );
        }
    }
}
