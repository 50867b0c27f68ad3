// CLASSIFICATION: COMMUNITY
// Filename: memory.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! RAM-backed partition used by host builds and tests.

use std::collections::BTreeMap;

use super::{FlashError, FlashPartition, PartitionFault, StoredValue};

type Namespaces = BTreeMap<String, BTreeMap<String, StoredValue>>;

/// In-memory flash partition with fault injection.
///
/// Writes land in a working copy and only become durable on `commit`;
/// `rollback` restores the last committed state.
#[derive(Clone, Debug, Default)]
pub struct MemoryPartition {
    namespaces: Namespaces,
    committed: Namespaces,
    mount_fault: Option<PartitionFault>,
    erase_fails: bool,
    writes_fail: bool,
    write_budget: Option<u32>,
    erase_count: u32,
    commit_count: u32,
}

impl MemoryPartition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `fault` on mount until the partition is erased.
    #[must_use]
    pub fn with_mount_fault(mut self, fault: PartitionFault) -> Self {
        self.mount_fault = Some(fault);
        self
    }

    #[must_use]
    pub fn failing_erase(mut self) -> Self {
        self.erase_fails = true;
        self
    }

    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.writes_fail = true;
        self
    }

    /// Toggle write failures. Also clears any write budget.
    pub fn set_writes_fail(&mut self, fail: bool) {
        self.writes_fail = fail;
        self.write_budget = None;
    }

    /// Let `writes` more mutations succeed, then fail every one after.
    pub fn set_write_budget(&mut self, writes: u32) {
        self.write_budget = Some(writes);
    }

    fn take_write(&mut self) -> Result<(), FlashError> {
        if self.writes_fail {
            return Err(FlashError::Full);
        }
        match self.write_budget.as_mut() {
            Some(0) => Err(FlashError::Full),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    pub fn commit_count(&self) -> u32 {
        self.commit_count
    }

    /// Raw view of a key, bypassing the store.
    pub fn peek(&self, namespace: &str, key: &str) -> Option<&StoredValue> {
        self.namespaces.get(namespace).and_then(|ns| ns.get(key))
    }

    /// Raw durable write that bypasses the store, for simulating external edits.
    pub fn poke(&mut self, namespace: &str, key: &str, value: StoredValue) {
        for image in [&mut self.namespaces, &mut self.committed] {
            image
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value.clone());
        }
    }

    /// Raw durable removal that bypasses the store.
    pub fn scrub(&mut self, namespace: &str, key: &str) {
        for image in [&mut self.namespaces, &mut self.committed] {
            if let Some(ns) = image.get_mut(namespace) {
                ns.remove(key);
            }
        }
    }
}

impl FlashPartition for MemoryPartition {
    fn mount(&mut self) -> Result<(), PartitionFault> {
        match self.mount_fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        if self.erase_fails {
            return Err(FlashError::Fault(PartitionFault::Corrupt));
        }
        self.namespaces.clear();
        self.committed.clear();
        self.erase_count += 1;
        if self.mount_fault.is_some_and(PartitionFault::erase_recoverable) {
            self.mount_fault = None;
        }
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue> {
        self.peek(namespace, key).cloned()
    }

    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<(), FlashError> {
        self.take_write()?;
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<bool, FlashError> {
        self.take_write()?;
        Ok(self
            .namespaces
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }

    fn clear(&mut self, namespace: &str) -> Result<(), FlashError> {
        self.take_write()?;
        self.namespaces.remove(namespace);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        self.committed = self.namespaces.clone();
        self.commit_count += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.namespaces = self.committed.clone();
    }
}
