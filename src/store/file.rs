// CLASSIFICATION: COMMUNITY
// Filename: file.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! File-backed partition image.
//!
//! The whole partition is one JSON document. Commits write a sibling
//! `.tmp` file and rename it over the image so a crash mid-commit leaves
//! either the old or the new image, never a partial one.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{FlashError, FlashPartition, PartitionFault, StoredValue};

/// On-disk image format understood by this build.
pub const IMAGE_FORMAT: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct PartitionImage {
    format: u32,
    namespaces: BTreeMap<String, BTreeMap<String, StoredValue>>,
}

impl PartitionImage {
    fn fresh() -> Self {
        Self {
            format: IMAGE_FORMAT,
            namespaces: BTreeMap::new(),
        }
    }
}

/// Partition persisted as a JSON file.
#[derive(Debug)]
pub struct FilePartition {
    path: PathBuf,
    image: PartitionImage,
    /// Image as last written to disk.
    durable: PartitionImage,
}

impl FilePartition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: PartitionImage::fresh(),
            durable: PartitionImage::fresh(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn flush(&mut self) -> Result<(), FlashError> {
        let data = serde_json::to_vec_pretty(&self.image)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        self.durable = self.image.clone();
        Ok(())
    }
}

impl FlashPartition for FilePartition {
    fn mount(&mut self) -> Result<(), PartitionFault> {
        let parent_missing = self
            .path
            .parent()
            .is_some_and(|dir| !dir.as_os_str().is_empty() && !dir.is_dir());
        if parent_missing {
            return Err(PartitionFault::NotFound);
        }
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("[nvs] no image at {}; starting empty", self.path.display());
                self.image = PartitionImage::fresh();
                self.durable = PartitionImage::fresh();
                return Ok(());
            }
            Err(err) => {
                log::error!("[nvs] read {} failed: {err}", self.path.display());
                return Err(PartitionFault::NotFound);
            }
        };
        let image: PartitionImage =
            serde_json::from_slice(&data).map_err(|_| PartitionFault::Corrupt)?;
        if image.format > IMAGE_FORMAT {
            return Err(PartitionFault::NewVersionFound);
        }
        self.durable = image.clone();
        self.image = image;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        self.image = PartitionImage::fresh();
        self.flush()
    }

    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue> {
        self.image
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned()
    }

    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<(), FlashError> {
        self.image
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<bool, FlashError> {
        Ok(self
            .image
            .namespaces
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }

    fn clear(&mut self, namespace: &str) -> Result<(), FlashError> {
        self.image.namespaces.remove(namespace);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        self.flush()
    }

    fn rollback(&mut self) {
        self.image = self.durable.clone();
    }
}
