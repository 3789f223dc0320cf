//! Top-level controller owning the fleet, dispatcher, and settings store.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::FleetConfig;
use crate::device::{DeviceHandle, DeviceId, HandleState, RetryPolicy, SharedTransport};
use crate::error::Result;
use crate::fleet::{BatchReport, FleetManager};
use crate::mode::{ModeDispatcher, ModeState, TickOutcome};
use crate::registry::{EnumeratedDevice, IdentityRegistry};
use crate::store::SettingsStore;
use crate::sync::{ParameterSync, SyncReport};

/// Serializable view of one handle.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub slot: String,
    pub managed: bool,
    pub state: HandleState,
}

/// Serializable view of the whole controller.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    /// `None` until the first tick.
    pub mode: Option<ModeState>,
    pub devices: Vec<DeviceStatus>,
}

/// Result of re-enumerating the bus.
#[derive(Debug, Clone, Serialize)]
pub struct EnumerateReport {
    pub devices: Vec<EnumeratedDevice>,
    /// Outcome of re-running the current mode's entry action.
    pub reentry: BatchReport,
}

/// Owns every piece of fleet state; the host drives it through
/// [`Controller::tick`] and operator commands.
pub struct Controller {
    transport: SharedTransport,
    registry: IdentityRegistry,
    fleet: FleetManager,
    dispatcher: ModeDispatcher,
    sync: ParameterSync,
    store: Box<dyn SettingsStore>,
}

impl Controller {
    /// Build the registry, verify managed cameras are present, and construct
    /// a handle for every configured camera.
    #[instrument(skip_all, fields(devices = config.devices.len()))]
    pub fn init(
        config: &FleetConfig,
        transport: SharedTransport,
        store: Box<dyn SettingsStore>,
    ) -> Result<Self> {
        let registry = IdentityRegistry::new(
            config.devices.iter().map(|d| (d.slot.clone(), d.id)),
        )?;
        let managed: Vec<DeviceId> = config
            .devices
            .iter()
            .filter(|d| d.managed)
            .map(|d| d.id)
            .collect();
        IdentityRegistry::verify_present(transport.as_ref(), &managed)?;

        let retry = RetryPolicy::new(config.command_retries, config.command_retry_delay());
        let handles = registry
            .slots()
            .iter()
            .map(|slot| DeviceHandle::new(slot.id, slot.name.clone(), transport.clone()).with_retry(retry))
            .collect();
        let fleet = FleetManager::new(handles, managed)?;

        info!(
            slots = registry.slots().len(),
            managed = fleet.len(),
            "Controller initialized"
        );
        Ok(Self {
            transport,
            registry,
            fleet,
            dispatcher: ModeDispatcher::new(config.activation, config.idle_brightness),
            sync: ParameterSync::new(config.parameter_defaults),
            store,
        })
    }

    /// One control cycle.
    pub fn tick(&mut self, enabled: bool, now: Duration) -> TickOutcome {
        self.dispatcher.tick(&mut self.fleet, enabled, now)
    }

    /// List reachable cameras, then re-apply the current mode since
    /// enumeration reopens every device.
    pub fn enumerate(&mut self) -> Result<EnumerateReport> {
        let devices = self.registry.enumerate_all(self.transport.as_ref())?;
        self.fleet.forget_state();
        let reentry = self.dispatcher.reenter(&mut self.fleet);
        Ok(EnumerateReport { devices, reentry })
    }

    /// Copy camera parameters into the settings store.
    pub fn read_parameters(&mut self) -> SyncReport {
        self.sync
            .read_all_to_store(&mut self.fleet, self.store.as_mut())
    }

    /// Apply the settings store's parameters to the cameras.
    pub fn write_parameters(&mut self) -> SyncReport {
        self.sync
            .write_all_from_store(&mut self.fleet, self.store.as_ref())
    }

    pub fn status(&self) -> ControllerStatus {
        let members = self.fleet.member_ids();
        ControllerStatus {
            mode: self.dispatcher.mode(),
            devices: self
                .fleet
                .handles()
                .iter()
                .map(|h| DeviceStatus {
                    id: h.id(),
                    slot: h.slot().to_string(),
                    managed: members.contains(&h.id()),
                    state: h.state().clone(),
                })
                .collect(),
        }
    }

    pub const fn mode(&self) -> Option<ModeState> {
        self.dispatcher.mode()
    }

    pub const fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub const fn fleet(&self) -> &FleetManager {
        &self.fleet
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SettingsStore {
        self.store.as_mut()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("registry", &self.registry)
            .field("fleet", &self.fleet)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
