// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19
#![cfg(not(target_os = "none"))]

//! Host-side configuration for the NVS tooling.
//!
//! Values come from a TOML file (`EARS_CONFIG`, default
//! `/etc/ears/nvs.toml`) and are then overridden by `EARS_NVS_PATH` and
//! `EARS_HANDOFF_TIMEOUT_MS`.

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::record::ZapNumberPolicy;
use crate::validation::ValidationPolicy;

pub const ENV_CONFIG: &str = "EARS_CONFIG";
pub const ENV_NVS_PATH: &str = "EARS_NVS_PATH";
pub const ENV_HANDOFF_TIMEOUT_MS: &str = "EARS_HANDOFF_TIMEOUT_MS";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ears/nvs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key} value {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NvsConfig {
    pub storage_path: PathBuf,
    pub handoff_timeout_ms: u64,
    pub min_migratable_version: u32,
    pub zap_number: ZapNumberPolicy,
}

impl Default for NvsConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("/nvs/ears.json"),
            handoff_timeout_ms: 2000,
            min_migratable_version: 1,
            zap_number: ZapNumberPolicy::default(),
        }
    }
}

impl NvsConfig {
    /// Parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists, defaults otherwise, then apply env overrides.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = match Self::load(path) {
            Ok(cfg) => cfg,
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                log::debug!("[config] {} absent; using defaults", path.display());
                Self::default()
            }
            Err(err) => return Err(err),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Configuration named by `EARS_CONFIG`.
    pub fn load_active() -> Result<Self, ConfigError> {
        let path = env::var(ENV_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_or_default(&path)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = env::var(ENV_NVS_PATH) {
            if !path.trim().is_empty() {
                self.storage_path = PathBuf::from(path.trim());
            }
        }
        if let Ok(raw) = env::var(ENV_HANDOFF_TIMEOUT_MS) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.handoff_timeout_ms =
                    trimmed.parse().map_err(|_| ConfigError::InvalidEnv {
                        key: ENV_HANDOFF_TIMEOUT_MS,
                        value: trimmed.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    #[must_use]
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            min_migratable_version: self.min_migratable_version,
            zap_number: self.zap_number,
            ..ValidationPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvs.toml");
        fs::write(
            &path,
            "handoff_timeout_ms = 500\n[zap_number]\nletters = 3\n",
        )
        .unwrap();
        let cfg = NvsConfig::load(&path).unwrap();
        assert_eq!(cfg.handoff_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.zap_number.letters, 3);
        assert_eq!(cfg.zap_number.digits, 4);
        assert_eq!(cfg.storage_path, NvsConfig::default().storage_path);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvs.toml");
        fs::write(&path, "handoff_timeout_ms = \"soon\"").unwrap();
        assert!(matches!(
            NvsConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn policy_carries_compiled_schema_version() {
        let cfg = NvsConfig {
            min_migratable_version: 2,
            ..NvsConfig::default()
        };
        let policy = cfg.validation_policy();
        assert_eq!(policy.expected_version, crate::record::SCHEMA_VERSION);
        assert_eq!(policy.min_migratable_version, 2);
    }
}
