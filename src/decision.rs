// CLASSIFICATION: COMMUNITY
// Filename: decision.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Consumer-side mapping from a verdict to the screen the UI shows next.

use std::fmt;

use serde::Serialize;

use crate::handoff::HandoffError;
use crate::validation::{ValidationResult, ValidationStatus};

/// Why the hardware-error prompt is shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HardwareCause {
    Storage { detail: Option<String> },
    HandoffTimeout { waited_ms: u64 },
    Unvalidated,
}

/// Next step for the loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BootDecision {
    Login { zap_number: String },
    ZapNumberSetup,
    PasswordSetup { zap_number: String },
    SecurityAlert { stored_crc: u32, calculated_crc: u32 },
    VersionMismatch { stored: u32, expected: u32 },
    HardwareError { cause: HardwareCause },
}

impl BootDecision {
    #[must_use]
    pub fn from_result(result: &ValidationResult) -> Self {
        match result.status {
            ValidationStatus::Valid | ValidationStatus::Upgraded => Self::Login {
                zap_number: result.zap_number.clone(),
            },
            ValidationStatus::MissingZapNumber => Self::ZapNumberSetup,
            ValidationStatus::MissingPassword => Self::PasswordSetup {
                zap_number: result.zap_number.clone(),
            },
            ValidationStatus::CrcFailed => Self::SecurityAlert {
                stored_crc: result.stored_crc,
                calculated_crc: result.calculated_crc,
            },
            ValidationStatus::InvalidVersion => Self::VersionMismatch {
                stored: result.current_version,
                expected: result.expected_version,
            },
            ValidationStatus::InitializationFailed => Self::HardwareError {
                cause: HardwareCause::Storage {
                    detail: result.fault.clone(),
                },
            },
            ValidationStatus::NotChecked => Self::HardwareError {
                cause: HardwareCause::Unvalidated,
            },
        }
    }

    /// A handoff timeout is handled exactly like a storage failure.
    #[must_use]
    pub fn from_handoff<R>(outcome: Result<R, HandoffError>) -> Self
    where
        R: AsRef<ValidationResult>,
    {
        match outcome {
            Ok(result) => Self::from_result(result.as_ref()),
            Err(HandoffError::Timeout(waited)) => Self::HardwareError {
                cause: HardwareCause::HandoffTimeout {
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                },
            },
        }
    }

    /// Whether the user must go through a factory reset.
    #[must_use]
    pub const fn requires_factory_reset(&self) -> bool {
        matches!(self, Self::SecurityAlert { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::ZapNumberSetup => "zapnumber-setup",
            Self::PasswordSetup { .. } => "password-setup",
            Self::SecurityAlert { .. } => "security-alert",
            Self::VersionMismatch { .. } => "version-mismatch",
            Self::HardwareError { .. } => "hardware-error",
        }
    }
}

impl fmt::Display for BootDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { zap_number } => write!(f, "Proceed to login screen (ZapNumber {zap_number})"),
            Self::ZapNumberSetup => f.write_str("Show ZapNumber setup wizard"),
            Self::PasswordSetup { zap_number } => {
                write!(f, "Show password setup wizard (ZapNumber {zap_number})")
            }
            Self::SecurityAlert {
                stored_crc,
                calculated_crc,
            } => write!(
                f,
                "SECURITY ALERT: stored CRC 0x{stored_crc:08X} != 0x{calculated_crc:08X}; factory reset required"
            ),
            Self::VersionMismatch { stored, expected } => write!(
                f,
                "NVS version {stored} incompatible with firmware version {expected}"
            ),
            Self::HardwareError { cause } => match cause {
                HardwareCause::Storage { detail: Some(detail) } => {
                    write!(f, "Hardware error: {detail}")
                }
                HardwareCause::Storage { detail: None } => f.write_str("Hardware error: storage"),
                HardwareCause::HandoffTimeout { waited_ms } => {
                    write!(f, "Hardware error: no validation verdict after {waited_ms} ms")
                }
                HardwareCause::Unvalidated => f.write_str("Hardware error: validation never ran"),
            },
        }
    }
}
