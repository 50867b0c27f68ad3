// CLASSIFICATION: COMMUNITY
// Filename: boot.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Producer/consumer boot sequence.
//!
//! The validator runs on its own worker (`nvs-validate`) and owns the store
//! for the whole pass. The loader side only ever sees the published verdict.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::decision::BootDecision;
use crate::handoff::{self, ResultReceiver};
use crate::store::{FlashPartition, KeyValueStore};
use crate::validation::{ValidationPolicy, ValidationResult, Validator};

/// Name given to the producer worker.
pub const VALIDATOR_THREAD: &str = "nvs-validate";

/// Default bound on the loader's wait.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_millis(2000);

/// Start the validation pass on a dedicated worker.
pub fn spawn_validation<P>(
    mut store: KeyValueStore<P>,
    policy: ValidationPolicy,
) -> io::Result<(ResultReceiver, JoinHandle<KeyValueStore<P>>)>
where
    P: FlashPartition + 'static,
{
    let (publisher, receiver) = handoff::channel();
    let worker = thread::Builder::new()
        .name(VALIDATOR_THREAD.to_string())
        .spawn(move || {
            let result = Validator::new(&mut store, policy).run();
            publisher.publish(result);
            store
        })?;
    Ok((receiver, worker))
}

/// Wait for the verdict and turn it into a loader decision.
pub fn await_decision(
    receiver: &ResultReceiver,
    timeout: Duration,
) -> (BootDecision, Option<Arc<ValidationResult>>) {
    let outcome = receiver.await_result(timeout);
    let result = outcome.as_ref().ok().cloned();
    let decision = BootDecision::from_handoff(outcome);
    match &result {
        Some(_) => info!("[loader] decision: {decision}"),
        None => warn!("[loader] decision: {decision}"),
    }
    (decision, result)
}

/// Everything the loader knows once the wait is over.
pub struct BootReport<P: FlashPartition> {
    pub decision: BootDecision,
    pub result: Option<Arc<ValidationResult>>,
    producer: JoinHandle<KeyValueStore<P>>,
}

impl<P: FlashPartition> BootReport<P> {
    /// Take the store back from the producer.
    ///
    /// Returns `None` without blocking when no verdict was published, since
    /// the producer may be wedged.
    pub fn reclaim_store(self) -> Option<KeyValueStore<P>> {
        self.result.as_ref()?;
        match self.producer.join() {
            Ok(store) => Some(store),
            Err(_) => {
                warn!("[loader] validator worker panicked after publishing");
                None
            }
        }
    }
}

/// Run the whole boot handoff: spawn the producer and wait as the consumer.
pub fn boot<P>(
    store: KeyValueStore<P>,
    policy: ValidationPolicy,
    timeout: Duration,
) -> io::Result<BootReport<P>>
where
    P: FlashPartition + 'static,
{
    let (receiver, producer) = spawn_validation(store, policy)?;
    let (decision, result) = await_decision(&receiver, timeout);
    Ok(BootReport {
        decision,
        result,
        producer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::HardwareCause;
    use crate::provision::Provisioner;
    use crate::report::MemoryReporter;
    use crate::store::{MemoryPartition, PartitionFault};
    use crate::validation::ValidationStatus;

    #[test]
    fn provisioned_device_boots_to_login() {
        let mut store = KeyValueStore::new(MemoryPartition::new(), MemoryReporter::new());
        Provisioner::new(&mut store).provision("AB1234", "pw").unwrap();
        let report = boot(store, ValidationPolicy::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            report.decision,
            BootDecision::Login {
                zap_number: "AB1234".into()
            }
        );
        assert_eq!(
            report.result.as_ref().map(|r| r.status),
            Some(ValidationStatus::Valid)
        );
        assert!(report.reclaim_store().is_some());
    }

    #[test]
    fn broken_flash_boots_to_hardware_error() {
        let partition = MemoryPartition::new().with_mount_fault(PartitionFault::NotFound);
        let store = KeyValueStore::new(partition, MemoryReporter::new());
        let report = boot(store, ValidationPolicy::default(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            report.decision,
            BootDecision::HardwareError {
                cause: HardwareCause::Storage { .. }
            }
        ));
    }
}
