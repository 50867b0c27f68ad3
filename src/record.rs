// CLASSIFICATION: COMMUNITY
// Filename: record.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Layout of the `EARS` namespace and the ZapNumber format policy.

use serde::{Deserialize, Serialize};

use crate::credential;
use crate::integrity;
use crate::store::{FlashPartition, NamespaceHandle, StoreError};

/// Namespace holding the device identity record.
pub const NAMESPACE: &str = "EARS";

pub const KEY_VERSION: &str = "VERSION";
pub const KEY_ZAPNUMBER: &str = "ZAPNUMBER";
pub const KEY_PASSWORD_HASH: &str = "PASSWORD_HASH";
pub const KEY_CRC: &str = "CRC";

/// Schema version compiled into this firmware.
pub const SCHEMA_VERSION: u32 = 2;

/// Shape of a valid ZapNumber: `letters` upper-case ASCII letters followed
/// by `digits` ASCII digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZapNumberPolicy {
    /// Leading upper-case letters.
    pub letters: usize,
    /// Trailing decimal digits.
    pub digits: usize,
}

impl Default for ZapNumberPolicy {
    fn default() -> Self {
        Self {
            letters: 2,
            digits: 4,
        }
    }
}

impl ZapNumberPolicy {
    #[must_use]
    pub const fn len(self) -> usize {
        self.letters + self.digits
    }

    #[must_use]
    pub fn is_valid(self, candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        if bytes.is_empty() || bytes.len() != self.len() {
            return false;
        }
        let (head, tail) = bytes.split_at(self.letters);
        head.iter().all(u8::is_ascii_uppercase) && tail.iter().all(u8::is_ascii_digit)
    }
}

/// Snapshot of the tracked keys as read from flash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceRecord {
    /// `VERSION`, `None` when absent or not a u32.
    pub version: Option<u32>,
    /// `ZAPNUMBER` as stored, unvalidated.
    pub zap_number: Option<String>,
    /// `PASSWORD_HASH` as stored, unvalidated.
    pub password_hash: Option<String>,
    /// `CRC` as stored.
    pub crc: Option<u32>,
}

impl NamespaceRecord {
    pub fn read<P: FlashPartition>(handle: &NamespaceHandle<'_, P>) -> Self {
        Self {
            version: handle.try_u32(KEY_VERSION),
            zap_number: handle.try_string(KEY_ZAPNUMBER),
            password_hash: handle.try_string(KEY_PASSWORD_HASH),
            crc: handle.try_u32(KEY_CRC),
        }
    }

    /// Stored version, absent reads as 0.
    #[must_use]
    pub fn stored_version(&self) -> u32 {
        self.version.unwrap_or(0)
    }

    #[must_use]
    pub fn zap_number_str(&self) -> &str {
        self.zap_number.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn password_hash_str(&self) -> &str {
        self.password_hash.as_deref().unwrap_or("")
    }

    /// True when neither identity field is present.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.zap_number.is_none() && self.password_hash.is_none()
    }

    #[must_use]
    pub fn has_valid_password_hash(&self) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(credential::is_well_formed)
    }

    /// CRC over the canonical record.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        integrity::record_checksum(
            self.stored_version(),
            self.zap_number_str(),
            self.password_hash_str(),
        )
    }

    /// Whether the stored CRC protects the current contents.
    ///
    /// A missing CRC is only acceptable while there is nothing to protect.
    #[must_use]
    pub fn integrity_holds(&self, calculated: u32) -> bool {
        match self.crc {
            Some(stored) => integrity::verify(stored, calculated),
            None => self.is_blank(),
        }
    }
}

/// Recompute and store `CRC` over what is currently in the namespace.
pub fn seal<P: FlashPartition>(handle: &mut NamespaceHandle<'_, P>) -> Result<u32, StoreError> {
    let crc = NamespaceRecord::read(handle).checksum();
    handle.put_u32(KEY_CRC, crc)?;
    Ok(crc)
}
