//! Slot-to-identity registry and presence verification.
//!
//! A deployment names its cameras by slot ("front", "rear", ...) and pins
//! each slot to a hardware UID. Before the fleet is used the registry checks
//! that every expected UID answers on the bus.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::device::{DeviceId, FirmwareVersion, Transport};
use crate::error::{PfError, Result};

/// A named slot bound to a camera identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub name: String,
    pub id: DeviceId,
}

/// One reachable camera as reported by [`IdentityRegistry::enumerate_all`].
#[derive(Debug, Clone, Serialize)]
pub struct EnumeratedDevice {
    pub id: DeviceId,
    /// Slot name if the identity is registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
}

/// Fixed mapping from slot names to identities.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    slots: Vec<Slot>,
}

impl IdentityRegistry {
    /// Build a registry, rejecting duplicate slot names or identities.
    pub fn new(slots: impl IntoIterator<Item = (String, DeviceId)>) -> Result<Self> {
        let mut registry = Self::default();
        for (name, id) in slots {
            if registry.slots.iter().any(|s| s.name == name) {
                return Err(PfError::ConfigInvalid(format!(
                    "slot '{name}' is defined more than once"
                )));
            }
            if let Some(existing) = registry.slots.iter().find(|s| s.id == id) {
                return Err(PfError::ConfigInvalid(format!(
                    "device {id} is assigned to both '{}' and '{name}'",
                    existing.name
                )));
            }
            debug!(slot = %name, device = %id, "Registering slot");
            registry.slots.push(Slot { name, id });
        }
        Ok(registry)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Identity bound to a slot.
    pub fn resolve(&self, slot: &str) -> Result<DeviceId> {
        self.slots
            .iter()
            .find(|s| s.name == slot)
            .map(|s| s.id)
            .ok_or_else(|| PfError::UnknownSlot {
                slot: slot.to_string(),
            })
    }

    /// Slot name registered for an identity.
    pub fn slot_of(&self, id: DeviceId) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
    }

    /// Check that every expected identity is reachable.
    ///
    /// Fails with [`PfError::MissingDevices`] listing each absent identity in
    /// the order given.
    pub fn verify_present(transport: &dyn Transport, expected: &[DeviceId]) -> Result<()> {
        let reachable = transport.enumerate().map_err(PfError::Enumeration)?;
        let missing: Vec<DeviceId> = expected
            .iter()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect();

        if missing.is_empty() {
            info!(count = expected.len(), "All expected devices present");
            Ok(())
        } else {
            warn!(
                missing = ?missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Expected devices not present"
            );
            Err(PfError::MissingDevices { missing })
        }
    }

    /// List every reachable camera with its slot and firmware version.
    ///
    /// Diagnostic only; firmware query failures leave `firmware` empty.
    pub fn enumerate_all(&self, transport: &dyn Transport) -> Result<Vec<EnumeratedDevice>> {
        let reachable = transport.enumerate().map_err(PfError::Enumeration)?;
        let devices: Vec<EnumeratedDevice> = reachable
            .into_iter()
            .map(|id| {
                let firmware = transport
                    .firmware_version(id)
                    .as_ref()
                    .map(FirmwareVersion::to_string)
                    .ok();
                let slot = self.slot_of(id).map(str::to_string);
                info!(
                    device = %id,
                    slot = slot.as_deref().unwrap_or("-"),
                    firmware = firmware.as_deref().unwrap_or("unknown"),
                    "Found camera"
                );
                EnumeratedDevice { id, slot, firmware }
            })
            .collect();
        info!(count = devices.len(), "Enumeration complete");
        Ok(devices)
    }
}
