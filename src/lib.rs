// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.2
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Persistent configuration validation for the EARS handset.
//!
//! A producer worker validates the `EARS` flash namespace (schema version,
//! CRC32 integrity, identity fields) and publishes one [`ValidationResult`];
//! the loader waits on the handoff and maps the verdict to a
//! [`BootDecision`].

#![forbid(unsafe_code)]

/// Diagnostic reporter capability injected into components.
pub mod report;

/// Namespaced key-value store and its partition engines.
pub mod store;

/// CRC32 and the canonical record checksum.
pub mod integrity;

/// CRC32-based password hash.
pub mod credential;

/// Keys, schema constant and ZapNumber policy.
pub mod record;

/// Schema version state machine and migration steps.
pub mod schema;

/// Validation pass and verdict types.
pub mod validation;

/// Publish-once handoff between producer and consumer.
pub mod handoff;

/// Loader decision table.
pub mod decision;

/// Setup wizard and login operations.
pub mod provision;

/// Producer/consumer boot sequence.
pub mod boot;

/// Host configuration.
#[cfg(not(target_os = "none"))]
pub mod config;

pub use boot::{boot, BootReport};
pub use decision::{BootDecision, HardwareCause};
pub use handoff::{channel, HandoffError, ResultPublisher, ResultReceiver};
pub use provision::{ProvisionError, Provisioner};
pub use record::{NamespaceRecord, ZapNumberPolicy, NAMESPACE, SCHEMA_VERSION};
pub use report::{LogReporter, MemoryReporter, SharedReporter, StatusReporter};
pub use schema::{SchemaMigrator, SchemaState};
pub use store::{
    FilePartition, FlashPartition, KeyValueStore, MemoryPartition, NamespaceHandle, OpenMode,
    StoreError,
};
pub use validation::{validate, ValidationPolicy, ValidationResult, ValidationStatus, Validator};
