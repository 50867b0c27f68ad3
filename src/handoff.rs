// CLASSIFICATION: COMMUNITY
// Filename: handoff.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! One-shot handoff of the validation verdict between workers.
//!
//! The producer owns a [`ResultPublisher`] and gives it up on
//! [`ResultPublisher::publish`], so a verdict is published at most once.
//! The complete [`ValidationResult`] is stored in a `OnceCell` before the
//! consumer is woken; the consumer either sees nothing or the whole value.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::validation::ValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("no validation result within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Default)]
struct Slot {
    value: OnceCell<Arc<ValidationResult>>,
    gate: Mutex<()>,
    ready: Condvar,
}

/// Producer half.
#[derive(Debug)]
pub struct ResultPublisher {
    slot: Arc<Slot>,
}

/// Consumer half. Cloneable so several observers can read the verdict.
#[derive(Debug, Clone)]
pub struct ResultReceiver {
    slot: Arc<Slot>,
}

/// Create a connected publisher/receiver pair.
#[must_use]
pub fn channel() -> (ResultPublisher, ResultReceiver) {
    let slot = Arc::new(Slot::default());
    (
        ResultPublisher { slot: slot.clone() },
        ResultReceiver { slot },
    )
}

impl ResultPublisher {
    /// Publish `result` and wake every waiting receiver.
    pub fn publish(self, result: ValidationResult) -> Arc<ValidationResult> {
        let shared = Arc::new(result);
        // The publisher is consumed here, so the cell is always empty.
        let published = self.slot.value.get_or_init(|| shared.clone()).clone();
        let _guard = match self.slot.gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.slot.ready.notify_all();
        log::debug!("[handoff] published status={}", published.status.label());
        published
    }
}

impl ResultReceiver {
    /// Non-blocking peek.
    pub fn try_result(&self) -> Option<Arc<ValidationResult>> {
        self.slot.value.get().cloned()
    }

    pub fn is_published(&self) -> bool {
        self.slot.value.get().is_some()
    }

    /// Block until the verdict is published or `timeout` elapses.
    pub fn await_result(&self, timeout: Duration) -> Result<Arc<ValidationResult>, HandoffError> {
        if let Some(result) = self.try_result() {
            return Ok(result);
        }
        let deadline = Instant::now() + timeout;
        let mut guard = match self.slot.gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if let Some(result) = self.try_result() {
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!("[handoff] timed out after {timeout:?}");
                return Err(HandoffError::Timeout(timeout));
            }
            guard = match self.slot.ready.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationStatus;
    use std::thread;

    fn verdict() -> ValidationResult {
        let mut result = ValidationResult::not_checked(2);
        result.status = ValidationStatus::Valid;
        result.current_version = 2;
        result.zap_number = "AB1234".into();
        result.zap_number_valid = true;
        result.password_hash_valid = true;
        result.crc_valid = true;
        result.calculated_crc = 0x1234_5678;
        result.stored_crc = 0x1234_5678;
        result
    }

    #[test]
    fn published_value_is_returned_whole() {
        let (tx, rx) = channel();
        assert!(rx.try_result().is_none());
        let sent = tx.publish(verdict());
        let got = rx.await_result(Duration::from_millis(10)).unwrap();
        assert!(Arc::ptr_eq(&sent, &got));
        assert_eq!(*got, verdict());
    }

    #[test]
    fn waits_for_late_publisher() {
        let (tx, rx) = channel();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            tx.publish(verdict());
        });
        let got = rx.await_result(Duration::from_secs(5)).unwrap();
        assert_eq!(got.status, ValidationStatus::Valid);
        producer.join().unwrap();
    }

    #[test]
    fn times_out_without_publisher() {
        let (_tx, rx) = channel();
        let started = Instant::now();
        let err = rx.await_result(Duration::from_millis(40)).unwrap_err();
        assert_eq!(err, HandoffError::Timeout(Duration::from_millis(40)));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn dropped_publisher_still_times_out() {
        let (tx, rx) = channel();
        drop(tx);
        assert!(rx.await_result(Duration::from_millis(5)).is_err());
        assert!(!rx.is_published());
    }
}
