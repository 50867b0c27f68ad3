// CLASSIFICATION: COMMUNITY
// Filename: validation.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Single-pass validation of the `EARS` namespace.
//!
//! Checks run in a fixed precedence: storage, schema, integrity, then the
//! identity fields. A record that fails its CRC is reported as tampered
//! even when it is also missing fields, so a corrupted record is never
//! routed to the setup wizard.

use std::fmt;

use log::Level;
use serde::{Deserialize, Serialize};

use crate::record::{NamespaceRecord, ZapNumberPolicy, NAMESPACE, SCHEMA_VERSION};
use crate::schema::{SchemaMigrator, SchemaState, BUILTIN_STEPS};
use crate::store::{FlashPartition, KeyValueStore, OpenMode, StoreError};

/// Verdict of a validation pass, in precedence order after `NotChecked`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    NotChecked,
    InitializationFailed,
    InvalidVersion,
    CrcFailed,
    MissingZapNumber,
    MissingPassword,
    Upgraded,
    Valid,
}

impl ValidationStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotChecked => "NOT_CHECKED",
            Self::InitializationFailed => "INITIALIZATION_FAILED",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::CrcFailed => "CRC_FAILED",
            Self::MissingZapNumber => "MISSING_ZAPNUMBER",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::Upgraded => "UPGRADED",
            Self::Valid => "VALID",
        }
    }

    /// True for verdicts that let the device proceed to login.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Valid | Self::Upgraded)
    }

    #[must_use]
    pub const fn log_level(self) -> Level {
        match self {
            Self::Valid | Self::Upgraded => Level::Info,
            Self::MissingZapNumber | Self::MissingPassword | Self::NotChecked => Level::Warn,
            Self::CrcFailed | Self::InvalidVersion | Self::InitializationFailed => Level::Error,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())?;
        if *self == Self::CrcFailed {
            f.write_str(" - TAMPERING DETECTED!")?;
        }
        Ok(())
    }
}

/// Outcome of one boot's validation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Version found in flash before any migration.
    pub current_version: u32,
    pub expected_version: u32,
    pub zap_number: String,
    pub zap_number_valid: bool,
    pub password_hash_valid: bool,
    pub crc_valid: bool,
    pub calculated_crc: u32,
    /// `CRC` as read from flash, 0 when absent.
    pub stored_crc: u32,
    pub was_upgraded: bool,
    pub schema_state: Option<SchemaState>,
    /// Storage failure detail when `status` is `InitializationFailed`.
    pub fault: Option<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn not_checked(expected_version: u32) -> Self {
        Self {
            status: ValidationStatus::NotChecked,
            current_version: 0,
            expected_version,
            zap_number: String::new(),
            zap_number_valid: false,
            password_hash_valid: false,
            crc_valid: false,
            calculated_crc: 0,
            stored_crc: 0,
            was_upgraded: false,
            schema_state: None,
            fault: None,
        }
    }

    /// Human-readable report, one line per field group.
    #[must_use]
    pub fn diagnostic_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Status: {}", self.status),
            format!(
                "Version: Current={}, Expected={}",
                self.current_version, self.expected_version
            ),
            format!(
                "ZapNumber: Valid={}, Value={}",
                self.zap_number_valid, self.zap_number
            ),
            format!("Password: Valid={}", self.password_hash_valid),
            format!(
                "CRC: Valid={}, Value=0x{:08X}",
                self.crc_valid, self.calculated_crc
            ),
            format!("Upgraded: {}", self.was_upgraded),
        ];
        if let Some(fault) = &self.fault {
            lines.push(format!("Fault: {fault}"));
        }
        lines
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.diagnostic_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Tunables for a validation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Schema version the firmware understands.
    pub expected_version: u32,
    /// Oldest stored version that may be migrated forward.
    pub min_migratable_version: u32,
    /// Accepted ZapNumber shape.
    pub zap_number: ZapNumberPolicy,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            expected_version: SCHEMA_VERSION,
            min_migratable_version: 1,
            zap_number: ZapNumberPolicy::default(),
        }
    }
}

/// Runs the validation pass against an injected store.
pub struct Validator<'a, P: FlashPartition> {
    store: &'a mut KeyValueStore<P>,
    policy: ValidationPolicy,
    migrator: SchemaMigrator,
}

impl<'a, P: FlashPartition> Validator<'a, P> {
    pub fn new(store: &'a mut KeyValueStore<P>, policy: ValidationPolicy) -> Self {
        let migrator = SchemaMigrator::new(policy.expected_version)
            .with_steps(BUILTIN_STEPS)
            .with_min_migratable(policy.min_migratable_version);
        Self {
            store,
            policy,
            migrator,
        }
    }

    /// Replace the migrator, e.g. to register additional steps.
    #[must_use]
    pub fn with_migrator(mut self, migrator: SchemaMigrator) -> Self {
        self.policy.expected_version = migrator.expected();
        self.migrator = migrator;
        self
    }

    /// Validate the namespace. Never fails; failures land in `status`.
    pub fn run(&mut self) -> ValidationResult {
        let reporter = self.store.reporter().clone();
        let mut result = ValidationResult::not_checked(self.policy.expected_version);
        match self.pass(&mut result) {
            Ok(status) => result.status = status,
            Err(err) => {
                result.status = ValidationStatus::InitializationFailed;
                result.fault = Some(err.to_string());
            }
        }
        let level = result.status.log_level();
        reporter.report(level, "=== NVS validation ===");
        for line in result.diagnostic_lines() {
            reporter.report(level, &line);
        }
        result
    }

    fn pass(&mut self, result: &mut ValidationResult) -> Result<ValidationStatus, StoreError> {
        let mut handle = self.store.open(NAMESPACE, OpenMode::ReadWrite)?;

        let outcome = self.migrator.run(&mut handle)?;
        result.current_version = outcome.stored_version;
        result.schema_state = Some(outcome.state);
        result.was_upgraded = outcome.was_upgraded;
        if outcome.state == SchemaState::Incompatible {
            handle.close()?;
            return Ok(ValidationStatus::InvalidVersion);
        }

        let record = NamespaceRecord::read(&handle);
        handle.close()?;

        let calculated = record.checksum();
        result.calculated_crc = calculated;
        result.stored_crc = record.crc.unwrap_or(0);
        result.crc_valid = record.integrity_holds(calculated);
        result.zap_number = record.zap_number.clone().unwrap_or_default();
        result.zap_number_valid = record
            .zap_number
            .as_deref()
            .is_some_and(|zap| self.policy.zap_number.is_valid(zap));
        result.password_hash_valid = record.has_valid_password_hash();

        let status = if !result.crc_valid {
            ValidationStatus::CrcFailed
        } else if !result.zap_number_valid {
            ValidationStatus::MissingZapNumber
        } else if !result.password_hash_valid {
            ValidationStatus::MissingPassword
        } else if result.was_upgraded {
            ValidationStatus::Upgraded
        } else {
            ValidationStatus::Valid
        };
        Ok(status)
    }
}

/// Validate `store` with the default policy.
pub fn validate<P: FlashPartition>(store: &mut KeyValueStore<P>) -> ValidationResult {
    Validator::new(store, ValidationPolicy::default()).run()
}
