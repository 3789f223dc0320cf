//! Exposure and white-balance transfer between the fleet and the settings
//! store.
//!
//! Both directions follow the same shape: pause the whole fleet, transfer
//! for every member that paused cleanly, then resume every member from the
//! pre-pause snapshot whatever happened in between.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::device::{DeviceHandle, DeviceId, ExposureSetting, WhiteBalanceSetting};
use crate::error::Result;
use crate::fleet::{BatchReport, FleetError, FleetManager, PauseOutcome};
use crate::store::SettingsStore;

pub const AUTO_EXPOSURE: &str = "AutoExposure";
pub const AUTO_WHITE_BALANCE: &str = "AutoWhiteBalance";
pub const EXPOSURE_GAIN: &str = "ExposureGain";
pub const EXPOSURE_COMPENSATION: &str = "ExposureCompensation";
pub const WHITE_BALANCE_RED: &str = "WhiteBalanceRed";
pub const WHITE_BALANCE_GREEN: &str = "WhiteBalanceGreen";
pub const WHITE_BALANCE_BLUE: &str = "WhiteBalanceBlue";

/// Store key for one setting of one slot, e.g. `front/ExposureGain`.
pub fn setting_key(slot: &str, setting: &str) -> String {
    format!("{slot}/{setting}")
}

/// Values used when the store has nothing for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDefaults {
    pub auto_exposure: bool,
    pub auto_white_balance: bool,
    pub exposure: ExposureSetting,
    pub white_balance: WhiteBalanceSetting,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            auto_exposure: false,
            auto_white_balance: false,
            exposure: ExposureSetting::new(20, 100),
            white_balance: WhiteBalanceSetting::new(64, 64, 64),
        }
    }
}

/// Parameters read from or applied to one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberParameters {
    pub device: DeviceId,
    pub auto_exposure: bool,
    pub auto_white_balance: bool,
    pub exposure: ExposureSetting,
    pub white_balance: WhiteBalanceSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Cameras to store.
    Read,
    /// Store to cameras.
    Write,
}

/// Outcome of one sync, split by phase.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub pause: BatchReport,
    pub transfer: BatchReport,
    pub resume: BatchReport,
    /// Values transferred, one entry per member that completed the transfer.
    pub parameters: Vec<MemberParameters>,
    /// Store persistence failure, which belongs to no device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.pause.is_clean()
            && self.transfer.is_clean()
            && self.resume.is_clean()
            && self.store_error.is_none()
    }

    /// Every phase's failures in one report.
    pub fn combined(&self) -> BatchReport {
        let mut combined = self.pause.clone();
        combined.merge(self.transfer.clone());
        combined.merge(self.resume.clone());
        combined
    }

    /// Device failures as a single multi-error.
    pub fn into_result(self) -> std::result::Result<(), FleetError> {
        self.combined().into_result()
    }
}

/// Pause / transfer / resume protocol for camera parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterSync {
    defaults: ParameterDefaults,
}

impl ParameterSync {
    #[must_use]
    pub const fn new(defaults: ParameterDefaults) -> Self {
        Self { defaults }
    }

    pub const fn defaults(&self) -> &ParameterDefaults {
        &self.defaults
    }

    /// Copy every member's current parameters into the store.
    ///
    /// A member's keys are written only if all four of its reads succeed.
    pub fn read_all_to_store(
        &self,
        fleet: &mut FleetManager,
        store: &mut dyn SettingsStore,
    ) -> SyncReport {
        info!(members = fleet.len(), "Reading camera parameters into store");
        let PauseOutcome { snapshot, report: pause } = fleet.pause_all();

        let mut parameters = Vec::new();
        let transfer = fleet.apply_to(&pause.succeeded, "read_parameters", |handle| {
            let read = read_parameters(handle)?;
            write_to_store(store, handle.slot(), &read)?;
            parameters.push(read);
            Ok(())
        });
        let store_error = store.flush().err().map(|e| e.to_string());

        let resume = fleet.resume_all(&snapshot);
        finish(SyncReport {
            direction: SyncDirection::Read,
            pause,
            transfer,
            resume,
            parameters,
            store_error,
        })
    }

    /// Apply the store's desired parameters to every member.
    ///
    /// Manual values are written only when the matching automatic mode is
    /// being turned off.
    pub fn write_all_from_store(
        &self,
        fleet: &mut FleetManager,
        store: &dyn SettingsStore,
    ) -> SyncReport {
        info!(members = fleet.len(), "Applying stored parameters to cameras");
        let PauseOutcome { snapshot, report: pause } = fleet.pause_all();

        let mut parameters = Vec::new();
        let transfer = fleet.apply_to(&pause.succeeded, "write_parameters", |handle| {
            let desired = self.desired(store, handle.slot(), handle.id());
            handle.set_auto_exposure(desired.auto_exposure)?;
            if !desired.auto_exposure {
                handle.set_exposure_compensation(desired.exposure)?;
            }
            handle.set_auto_white_balance(desired.auto_white_balance)?;
            if !desired.auto_white_balance {
                handle.set_white_balance_value(desired.white_balance)?;
            }
            parameters.push(desired);
            Ok(())
        });

        let resume = fleet.resume_all(&snapshot);
        finish(SyncReport {
            direction: SyncDirection::Write,
            pause,
            transfer,
            resume,
            parameters,
            store_error: None,
        })
    }

    /// Desired parameters for a slot, falling back to the defaults.
    pub fn desired(&self, store: &dyn SettingsStore, slot: &str, device: DeviceId) -> MemberParameters {
        let d = &self.defaults;
        let number = |setting: &str, default: f64| store.get_number_or(&setting_key(slot, setting), default);
        MemberParameters {
            device,
            auto_exposure: store.get_bool_or(&setting_key(slot, AUTO_EXPOSURE), d.auto_exposure),
            auto_white_balance: store
                .get_bool_or(&setting_key(slot, AUTO_WHITE_BALANCE), d.auto_white_balance),
            exposure: ExposureSetting::new(
                clamp_u8(number(EXPOSURE_GAIN, f64::from(d.exposure.gain)), d.exposure.gain),
                clamp_u16(
                    number(EXPOSURE_COMPENSATION, f64::from(d.exposure.compensation)),
                    d.exposure.compensation,
                ),
            ),
            white_balance: WhiteBalanceSetting::new(
                clamp_u8(number(WHITE_BALANCE_RED, f64::from(d.white_balance.red)), d.white_balance.red),
                clamp_u8(
                    number(WHITE_BALANCE_GREEN, f64::from(d.white_balance.green)),
                    d.white_balance.green,
                ),
                clamp_u8(number(WHITE_BALANCE_BLUE, f64::from(d.white_balance.blue)), d.white_balance.blue),
            ),
        }
    }
}

fn finish(report: SyncReport) -> SyncReport {
    if report.is_clean() {
        info!(direction = ?report.direction, members = report.parameters.len(), "Parameter sync complete");
    } else {
        let combined = report.combined();
        warn!(
            direction = ?report.direction,
            failed = ?combined.failed_devices().iter().map(ToString::to_string).collect::<Vec<_>>(),
            store_error = report.store_error.as_deref().unwrap_or("-"),
            "Parameter sync finished with failures"
        );
    }
    report
}

fn read_parameters(handle: &mut DeviceHandle) -> Result<MemberParameters> {
    Ok(MemberParameters {
        device: handle.id(),
        auto_exposure: handle.get_auto_exposure()?,
        auto_white_balance: handle.get_auto_white_balance()?,
        exposure: handle.get_exposure_compensation()?,
        white_balance: handle.get_white_balance_value()?,
    })
}

fn write_to_store(store: &mut dyn SettingsStore, slot: &str, read: &MemberParameters) -> Result<()> {
    store.put_bool(&setting_key(slot, AUTO_EXPOSURE), read.auto_exposure)?;
    store.put_bool(&setting_key(slot, AUTO_WHITE_BALANCE), read.auto_white_balance)?;
    store.put_number(&setting_key(slot, EXPOSURE_GAIN), f64::from(read.exposure.gain))?;
    store.put_number(
        &setting_key(slot, EXPOSURE_COMPENSATION),
        f64::from(read.exposure.compensation),
    )?;
    store.put_number(&setting_key(slot, WHITE_BALANCE_RED), f64::from(read.white_balance.red))?;
    store.put_number(&setting_key(slot, WHITE_BALANCE_GREEN), f64::from(read.white_balance.green))?;
    store.put_number(&setting_key(slot, WHITE_BALANCE_BLUE), f64::from(read.white_balance.blue))?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_u8(value: f64, fallback: u8) -> u8 {
    if value.is_nan() {
        return fallback;
    }
    value.trunc().clamp(0.0, f64::from(u8::MAX)) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_u16(value: f64, fallback: u16) -> u16 {
    if value.is_nan() {
        return fallback;
    }
    value.trunc().clamp(0.0, f64::from(u16::MAX)) as u16
}
