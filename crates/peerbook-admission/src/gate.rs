//! Admission gate: the first check every RPC passes through.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use peerbook_types::{Operation, PeerbookError, RateMeterConfig, Result};

use crate::{AdmissionPolicy, CallRateMeter};

/// Per-operation admission control.
///
/// The meter table is fixed at construction. Each meter has its own mutex,
/// so calls to different operations never contend. Operations the policy
/// leaves out are always admitted.
#[derive(Debug)]
pub struct AdmissionGate {
    meters: HashMap<Operation, Mutex<CallRateMeter>>,
}

impl AdmissionGate {
    #[must_use]
    pub fn new(policy: &AdmissionPolicy) -> Self {
        let meters = policy
            .iter()
            .map(|(op, quota)| (op, Mutex::new(CallRateMeter::new(quota))))
            .collect();
        Self { meters }
    }

    /// Admit a call to `operation` now.
    ///
    /// # Errors
    /// `ResourceExhausted` when the operation's quota is used up.
    pub fn admit(&self, operation: Operation) -> Result<()> {
        self.admit_at(operation, Instant::now())
    }

    /// Admit a call to `operation` at an explicit instant.
    ///
    /// # Errors
    /// `ResourceExhausted` when the operation's quota is used up.
    pub fn admit_at(&self, operation: Operation, now: Instant) -> Result<()> {
        let Some(meter) = self.meters.get(&operation) else {
            tracing::trace!(operation = %operation, "Unmetered call admitted");
            return Ok(());
        };
        let mut meter = meter.lock();
        if meter.check_and_record(now) {
            tracing::debug!(operation = %operation, "Call admitted");
            Ok(())
        } else {
            let quota = meter.config();
            tracing::warn!(
                operation = %operation,
                quota = %quota,
                retry_after_ms = meter.retry_after(now).map(|d| d.as_millis()),
                "Call denied by admission control"
            );
            Err(PeerbookError::ResourceExhausted { operation, quota })
        }
    }

    /// Quota the gate enforces for `operation`, `None` if unmetered.
    #[must_use]
    pub fn quota(&self, operation: Operation) -> Option<RateMeterConfig> {
        self.meters.get(&operation).map(|m| m.lock().config())
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(&AdmissionPolicy::defaults())
    }
}
