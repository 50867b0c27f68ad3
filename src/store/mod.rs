// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Namespaced key-value storage over a flash partition.
//!
//! [`KeyValueStore`] wraps any [`FlashPartition`] engine and hands out
//! [`NamespaceHandle`]s. A handle mutably borrows the store, so only one
//! namespace can be open at a time and nothing else can touch the
//! partition while the validator holds it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::SharedReporter;

pub mod file;
pub mod memory;

pub use file::FilePartition;
pub use memory::MemoryPartition;

/// Longest namespace or key name the flash layout accepts.
pub const MAX_KEY_LEN: usize = 15;

/// Typed value persisted under a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Str(String),
    U32(u32),
    Blob(#[serde(with = "hex")] Vec<u8>),
}

/// Conditions reported by a partition when it is mounted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PartitionFault {
    #[error("partition not found")]
    NotFound,
    #[error("partition corrupt")]
    Corrupt,
    #[error("partition has no free pages")]
    NoFreePages,
    #[error("partition written by a newer format")]
    NewVersionFound,
}

impl PartitionFault {
    /// Faults that an erase-and-reinitialise clears.
    #[must_use]
    pub const fn erase_recoverable(self) -> bool {
        matches!(self, Self::NoFreePages | Self::NewVersionFound)
    }
}

/// Low-level engine failures.
#[derive(Debug, Error)]
pub enum FlashError {
    #[error(transparent)]
    Fault(#[from] PartitionFault),
    #[error("partition full")]
    Full,
    #[error("flash i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("flash image encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors surfaced by [`KeyValueStore`] and [`NamespaceHandle`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage initialization failed: {0}")]
    InitializationFailed(#[source] FlashError),
    #[error("write of key {key:?} failed: {source}")]
    WriteFailed { key: String, source: FlashError },
    #[error("namespace {0:?} is open read-only")]
    ReadOnly(String),
    #[error("invalid key or namespace name {0:?}")]
    InvalidKey(String),
    #[error("commit of namespace {namespace:?} failed: {source}")]
    CommitFailed { namespace: String, source: FlashError },
}

/// Backing engine for [`KeyValueStore`].
pub trait FlashPartition: Send {
    /// Bring the partition online.
    fn mount(&mut self) -> Result<(), PartitionFault>;
    /// Wipe every namespace and reset the on-flash format.
    fn erase(&mut self) -> Result<(), FlashError>;
    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue>;
    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<(), FlashError>;
    fn remove(&mut self, namespace: &str, key: &str) -> Result<bool, FlashError>;
    fn clear(&mut self, namespace: &str) -> Result<(), FlashError>;
    /// Make pending writes durable.
    fn commit(&mut self) -> Result<(), FlashError>;
    /// Discard every write since the last successful commit.
    fn rollback(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}

/// Flash-backed key-value store.
pub struct KeyValueStore<P: FlashPartition> {
    partition: P,
    reporter: SharedReporter,
    mounted: bool,
}

impl<P: FlashPartition> fmt::Debug for KeyValueStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl<P: FlashPartition> KeyValueStore<P> {
    pub fn new(partition: P, reporter: SharedReporter) -> Self {
        Self {
            partition,
            reporter,
            mounted: false,
        }
    }

    pub fn reporter(&self) -> &SharedReporter {
        &self.reporter
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    pub fn partition_mut(&mut self) -> &mut P {
        &mut self.partition
    }

    pub fn into_partition(self) -> P {
        self.partition
    }

    fn ensure_mounted(&mut self) -> Result<(), StoreError> {
        if self.mounted {
            return Ok(());
        }
        match self.partition.mount() {
            Ok(()) => {}
            Err(fault) if fault.erase_recoverable() => {
                self.reporter
                    .warn(&format!("[nvs] {fault}; erasing partition and reinitialising"));
                if let Err(err) = self.partition.erase() {
                    self.reporter.error(&format!("[nvs] partition erase failed: {err}"));
                    return Err(StoreError::InitializationFailed(err));
                }
                if let Err(fault) = self.partition.mount() {
                    self.reporter
                        .error(&format!("[nvs] mount after erase failed: {fault}"));
                    return Err(StoreError::InitializationFailed(fault.into()));
                }
                self.reporter.warn("[nvs] partition erased and reinitialised");
            }
            Err(fault) => {
                self.reporter.error(&format!("[nvs] mount failed: {fault}"));
                return Err(StoreError::InitializationFailed(fault.into()));
            }
        }
        self.mounted = true;
        Ok(())
    }

    /// Open `namespace`, mounting the partition on first use.
    pub fn open(
        &mut self,
        namespace: &str,
        mode: OpenMode,
    ) -> Result<NamespaceHandle<'_, P>, StoreError> {
        check_name(namespace)?;
        self.ensure_mounted()?;
        log::debug!("[nvs] open namespace={namespace} mode={}", mode.label());
        Ok(NamespaceHandle {
            store: self,
            namespace: namespace.to_string(),
            mode,
            dirty: false,
            poisoned: false,
            closed: false,
        })
    }
}

/// An open namespace. Dropping a dirty read-write handle commits it,
/// unless a write on the handle failed; then the pending changes are
/// rolled back instead.
pub struct NamespaceHandle<'a, P: FlashPartition> {
    store: &'a mut KeyValueStore<P>,
    namespace: String,
    mode: OpenMode,
    dirty: bool,
    poisoned: bool,
    closed: bool,
}

impl<P: FlashPartition> NamespaceHandle<'_, P> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn reporter(&self) -> &SharedReporter {
        &self.store.reporter
    }

    /// True once a write, remove or clear on this handle has failed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn read(&self, key: &str) -> Option<StoredValue> {
        if check_name(key).is_err() {
            return None;
        }
        self.store.partition.read(&self.namespace, key)
    }

    fn writable(&self, key: &str) -> Result<(), StoreError> {
        check_name(key)?;
        if self.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly(self.namespace.clone()));
        }
        Ok(())
    }

    fn write(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        self.writable(key)?;
        if let Err(source) = self.store.partition.write(&self.namespace, key, value) {
            self.poisoned = true;
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                source,
            });
        }
        self.dirty = true;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    /// String stored under `key`, or `default` when absent or not a string.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.read(key) {
            Some(StoredValue::Str(value)) => value,
            _ => default.to_string(),
        }
    }

    /// String stored under `key`, `None` when absent or not a string.
    pub fn try_string(&self, key: &str) -> Option<String> {
        match self.read(key) {
            Some(StoredValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn put_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, StoredValue::Str(value.to_string()))
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.try_u32(key).unwrap_or(default)
    }

    pub fn try_u32(&self, key: &str) -> Option<u32> {
        match self.read(key) {
            Some(StoredValue::U32(value)) => Some(value),
            _ => None,
        }
    }

    pub fn put_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.write(key, StoredValue::U32(value))
    }

    pub fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        match self.read(key) {
            Some(StoredValue::Blob(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn put_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(key, StoredValue::Blob(value.to_vec()))
    }

    /// Remove `key`; returns whether it existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        self.writable(key)?;
        let existed = match self.store.partition.remove(&self.namespace, key) {
            Ok(existed) => existed,
            Err(source) => {
                self.poisoned = true;
                return Err(StoreError::WriteFailed {
                    key: key.to_string(),
                    source,
                });
            }
        };
        self.dirty |= existed;
        Ok(existed)
    }

    /// Drop every key in the namespace.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        if self.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly(self.namespace.clone()));
        }
        if let Err(source) = self.store.partition.clear(&self.namespace) {
            self.poisoned = true;
            return Err(StoreError::WriteFailed {
                key: "*".to_string(),
                source,
            });
        }
        self.dirty = true;
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.store.partition.rollback();
        self.dirty = false;
    }

    fn commit_pending(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        if let Err(source) = self.store.partition.commit() {
            self.discard_pending();
            return Err(StoreError::CommitFailed {
                namespace: self.namespace.clone(),
                source,
            });
        }
        self.dirty = false;
        Ok(())
    }

    /// Commit pending writes and release the namespace. A poisoned
    /// handle discards its pending writes instead.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        if self.poisoned {
            self.discard_pending();
            return Ok(());
        }
        self.commit_pending()
    }
}

impl<P: FlashPartition> Drop for NamespaceHandle<'_, P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.poisoned {
            if self.dirty {
                self.store.reporter.warn(&format!(
                    "[nvs] write to {} failed; discarding uncommitted changes",
                    self.namespace
                ));
                self.discard_pending();
            }
            return;
        }
        if let Err(err) = self.commit_pending() {
            self.store
                .reporter
                .error(&format!("[nvs] implicit commit on drop failed: {err}"));
        }
    }
}
