//! Per-device outcome aggregation for fleet-wide operations.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::device::DeviceId;
use crate::error::PfError;

/// One member's failure within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub device: DeviceId,
    pub slot: String,
    pub operation: &'static str,
    pub error: String,
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}: {}",
            self.device, self.slot, self.operation, self.error
        )
    }
}

/// Outcome of applying one operation across fleet members.
///
/// A device is listed in `succeeded` only if none of its steps failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<DeviceId>,
    pub failures: Vec<DeviceFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, device: DeviceId) {
        if !self.succeeded.contains(&device) && !self.has_failed(device) {
            self.succeeded.push(device);
        }
    }

    pub fn record_failure(
        &mut self,
        device: DeviceId,
        slot: &str,
        operation: &'static str,
        error: &PfError,
    ) {
        self.succeeded.retain(|d| *d != device);
        self.failures.push(DeviceFailure {
            device,
            slot: slot.to_string(),
            operation,
            error: error.to_string(),
        });
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        for failure in other.failures {
            self.succeeded.retain(|d| *d != failure.device);
            self.failures.push(failure);
        }
        for device in other.succeeded {
            self.record_success(device);
        }
    }

    /// True if no member failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has_failed(&self, device: DeviceId) -> bool {
        self.failures.iter().any(|f| f.device == device)
    }

    /// Distinct failing devices, in order of first failure.
    pub fn failed_devices(&self) -> Vec<DeviceId> {
        let mut devices = Vec::new();
        for failure in &self.failures {
            if !devices.contains(&failure.device) {
                devices.push(failure.device);
            }
        }
        devices
    }

    /// Collapse into a single multi-error if any member failed.
    pub fn into_result(self) -> Result<(), FleetError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(FleetError {
                failures: self.failures,
            })
        }
    }
}

/// Aggregated per-device failures from one batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} device operation(s) failed: {}", failures.len(), join(failures))]
pub struct FleetError {
    pub failures: Vec<DeviceFailure>,
}

fn join(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
