//! Fleet configuration schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::device::DeviceId;
use crate::error::{PfError, Result};
use crate::mode::{ActivationProfile, DEFAULT_IDLE_BRIGHTNESS};
use crate::sync::ParameterDefaults;

/// One camera slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Logical slot name; also the settings-store key prefix.
    pub slot: String,
    /// Hardware UID, e.g. `"0xC6E0B552"`.
    pub id: DeviceId,
    /// Whether the controller drives this camera.
    #[serde(default = "default_managed")]
    pub managed: bool,
}

const fn default_managed() -> bool {
    true
}

impl DeviceConfig {
    pub fn new(slot: impl Into<String>, id: DeviceId, managed: bool) -> Self {
        Self {
            slot: slot.into(),
            id,
            managed,
        }
    }
}

/// Complete controller configuration.
///
/// # Example TOML
///
/// ```toml
/// cycle_period_ms = 20
/// command_retries = 1
///
/// [activation.exposure]
/// gain = 10
/// compensation = 150
///
/// [[devices]]
/// slot = "front"
/// id = "0xC6E0B552"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Control cycle period in milliseconds.
    pub cycle_period_ms: u64,
    /// Extra attempts for transport commands failing with busy or I/O faults.
    pub command_retries: u32,
    /// Pause before each retry, in milliseconds.
    pub command_retry_delay_ms: u64,
    /// LED drive current applied on entering idle.
    pub idle_brightness: u32,
    /// Settings file; relative paths are resolved against the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    pub activation: ActivationProfile,
    pub parameter_defaults: ParameterDefaults,
    pub devices: Vec<DeviceConfig>,
}

impl Default for FleetConfig {
    /// The robot's three camera slots; only the middle one is driven.
    fn default() -> Self {
        Self {
            cycle_period_ms: 20,
            command_retries: 0,
            command_retry_delay_ms: 0,
            idle_brightness: DEFAULT_IDLE_BRIGHTNESS,
            store_path: None,
            activation: ActivationProfile::default(),
            parameter_defaults: ParameterDefaults::default(),
            devices: vec![
                DeviceConfig::new("pixy1", DeviceId::new(0x053C_3165), false),
                DeviceConfig::new("pixy2", DeviceId::new(0xC6E0_B552), true),
                DeviceConfig::new("pixy3", DeviceId::new(0xD892_D58D), false),
            ],
        }
    }
}

impl FleetConfig {
    /// Check the configuration for structural errors.
    ///
    /// Checks that:
    /// - At least one device is configured
    /// - Slot names are non-empty, unique, and contain no `/`
    /// - Device ids are unique
    /// - The cycle period is non-zero
    pub fn validate(&self) -> Result<()> {
        trace!(devices = self.devices.len(), "Validating fleet config");

        if self.devices.is_empty() {
            return Err(PfError::ConfigInvalid(
                "at least one device must be configured".to_string(),
            ));
        }
        if self.cycle_period_ms == 0 {
            return Err(PfError::ConfigInvalid(
                "cycle_period_ms must be greater than zero".to_string(),
            ));
        }

        for (i, device) in self.devices.iter().enumerate() {
            if device.slot.trim().is_empty() {
                return Err(PfError::ConfigInvalid(format!(
                    "device {} has an empty slot name",
                    device.id
                )));
            }
            if device.slot.contains('/') {
                return Err(PfError::ConfigInvalid(format!(
                    "slot '{}' must not contain '/'",
                    device.slot
                )));
            }
            let earlier = &self.devices[..i];
            if earlier.iter().any(|d| d.slot == device.slot) {
                return Err(PfError::ConfigInvalid(format!(
                    "slot '{}' is defined more than once",
                    device.slot
                )));
            }
            if let Some(other) = earlier.iter().find(|d| d.id == device.id) {
                return Err(PfError::ConfigInvalid(format!(
                    "device {} is assigned to both '{}' and '{}'",
                    device.id, other.slot, device.slot
                )));
            }
        }

        debug!(
            devices = self.devices.len(),
            managed = self.managed().count(),
            "Fleet config validated"
        );
        Ok(())
    }

    /// Devices the controller drives, in configured order.
    pub fn managed(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|d| d.managed)
    }

    pub const fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }

    pub const fn command_retry_delay(&self) -> Duration {
        Duration::from_millis(self.command_retry_delay_ms)
    }
}
