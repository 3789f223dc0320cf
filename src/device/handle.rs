//! Per-camera handle with typed commands and cached state.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::info::{ColorSample, DeviceId, ExposureSetting, RunState, WhiteBalanceSetting};
use super::{SharedTransport, Transport, TransportResult};
use crate::error::{PfError, Result};

/// Retry options for individual transport commands.
///
/// Only transient faults (busy, I/O) are retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one (default: 0).
    pub max_retries: u32,
    /// Pause between attempts (default: none).
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Everything the handle has observed about its camera.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandleState {
    pub run: RunState,
    pub auto_exposure: Option<bool>,
    pub auto_white_balance: Option<bool>,
    pub exposure: Option<ExposureSetting>,
    pub white_balance: Option<WhiteBalanceSetting>,
    pub led_color: Option<ColorSample>,
    pub led_brightness: Option<u32>,
}

/// One physical camera on the shared bus.
///
/// Lifecycle commands are idempotent against the cached run state. Parameter
/// commands are refused while the camera is known to be streaming, since the
/// firmware only serves stable register values once both the frame grabber
/// and the program have stopped.
pub struct DeviceHandle {
    id: DeviceId,
    slot: String,
    transport: SharedTransport,
    retry: RetryPolicy,
    state: HandleState,
}

impl DeviceHandle {
    /// Bind a handle to a camera identity.
    pub fn new(id: DeviceId, slot: impl Into<String>, transport: SharedTransport) -> Self {
        let slot = slot.into();
        debug!(device = %id, slot = %slot, "Creating device handle");
        Self {
            id,
            slot,
            transport,
            retry: RetryPolicy::default(),
            state: HandleState::default(),
        }
    }

    /// Use a retry policy for every command issued by this handle.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub const fn id(&self) -> DeviceId {
        self.id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub const fn state(&self) -> &HandleState {
        &self.state
    }

    pub const fn run_state(&self) -> RunState {
        self.state.run
    }

    /// Drop everything cached about the camera.
    ///
    /// Call after the bus has been re-enumerated; the camera may have been
    /// reset and the next command for each subsystem is always issued.
    pub fn forget_state(&mut self) {
        debug!(device = %self.id, "Forgetting cached device state");
        self.state = HandleState::default();
    }

    // === Lifecycle ===

    pub fn start_program(&mut self) -> Result<()> {
        if self.state.run.program == Some(true) {
            trace!(device = %self.id, "Program already running");
            return Ok(());
        }
        let id = self.id;
        let result = self.command("start_program", |t| t.start_program(id));
        self.state.run.program = result.as_ref().ok().map(|_| true);
        result
    }

    pub fn stop_program(&mut self) -> Result<()> {
        if self.state.run.program == Some(false) {
            trace!(device = %self.id, "Program already stopped");
            return Ok(());
        }
        let id = self.id;
        let result = self.command("stop_program", |t| t.stop_program(id));
        self.state.run.program = result.as_ref().ok().map(|_| false);
        result
    }

    pub fn start_frame_grabber(&mut self) -> Result<()> {
        if self.state.run.frame_grabber == Some(true) {
            trace!(device = %self.id, "Frame grabber already running");
            return Ok(());
        }
        let id = self.id;
        let result = self.command("start_frame_grabber", |t| t.start_frame_grabber(id));
        self.state.run.frame_grabber = result.as_ref().ok().map(|_| true);
        result
    }

    pub fn stop_frame_grabber(&mut self) -> Result<()> {
        if self.state.run.frame_grabber == Some(false) {
            trace!(device = %self.id, "Frame grabber already stopped");
            return Ok(());
        }
        let id = self.id;
        let result = self.command("stop_frame_grabber", |t| t.stop_frame_grabber(id));
        self.state.run.frame_grabber = result.as_ref().ok().map(|_| false);
        result
    }

    // === Exposure ===

    pub fn get_auto_exposure(&mut self) -> Result<bool> {
        self.ensure_quiescent()?;
        let id = self.id;
        let enabled = self.command("get_auto_exposure", |t| t.get_auto_exposure(id))?;
        self.state.auto_exposure = Some(enabled);
        Ok(enabled)
    }

    pub fn set_auto_exposure(&mut self, enable: bool) -> Result<()> {
        self.ensure_quiescent()?;
        let id = self.id;
        let result = self.command("set_auto_exposure", |t| t.set_auto_exposure(id, enable));
        self.state.auto_exposure = result.as_ref().ok().map(|_| enable);
        result
    }

    pub fn get_exposure_compensation(&mut self) -> Result<ExposureSetting> {
        self.ensure_quiescent()?;
        let id = self.id;
        let register = self.command("get_exposure", |t| t.get_exposure(id))?;
        let setting = ExposureSetting::from_register(register);
        self.state.exposure = Some(setting);
        Ok(setting)
    }

    /// Write a manual exposure value.
    ///
    /// Refused with [`PfError::StaleParameter`] while auto exposure is known
    /// to be enabled.
    pub fn set_exposure_compensation(&mut self, setting: ExposureSetting) -> Result<()> {
        self.ensure_quiescent()?;
        if self.state.auto_exposure == Some(true) {
            return Err(PfError::StaleParameter {
                device: self.id,
                setting: "exposure",
            });
        }
        let id = self.id;
        let result = self.command("set_exposure", |t| t.set_exposure(id, setting.to_register()));
        self.state.exposure = result.as_ref().ok().map(|_| setting);
        result
    }

    // === White balance ===

    pub fn get_auto_white_balance(&mut self) -> Result<bool> {
        self.ensure_quiescent()?;
        let id = self.id;
        let enabled = self.command("get_auto_white_balance", |t| t.get_auto_white_balance(id))?;
        self.state.auto_white_balance = Some(enabled);
        Ok(enabled)
    }

    pub fn set_auto_white_balance(&mut self, enable: bool) -> Result<()> {
        self.ensure_quiescent()?;
        let id = self.id;
        let result = self.command("set_auto_white_balance", |t| {
            t.set_auto_white_balance(id, enable)
        });
        self.state.auto_white_balance = result.as_ref().ok().map(|_| enable);
        result
    }

    pub fn get_white_balance_value(&mut self) -> Result<WhiteBalanceSetting> {
        self.ensure_quiescent()?;
        let id = self.id;
        let register = self.command("get_white_balance", |t| t.get_white_balance(id))?;
        let setting = WhiteBalanceSetting::from_register(register);
        self.state.white_balance = Some(setting);
        Ok(setting)
    }

    /// Write manual white-balance gains.
    ///
    /// Refused with [`PfError::StaleParameter`] while auto white balance is
    /// known to be enabled.
    pub fn set_white_balance_value(&mut self, setting: WhiteBalanceSetting) -> Result<()> {
        self.ensure_quiescent()?;
        if self.state.auto_white_balance == Some(true) {
            return Err(PfError::StaleParameter {
                device: self.id,
                setting: "white balance",
            });
        }
        let id = self.id;
        let result = self.command("set_white_balance", |t| {
            t.set_white_balance(id, setting.to_register())
        });
        self.state.white_balance = result.as_ref().ok().map(|_| setting);
        result
    }

    // === Indicator ===

    pub fn set_led_color(&mut self, color: ColorSample) -> Result<()> {
        let id = self.id;
        let result = self.command("set_led_rgb", |t| t.set_led_rgb(id, color.r, color.g, color.b));
        self.state.led_color = result.as_ref().ok().map(|_| color);
        result
    }

    pub fn set_led_brightness(&mut self, level: u32) -> Result<()> {
        let id = self.id;
        let result = self.command("set_led_max_current", |t| t.set_led_max_current(id, level));
        self.state.led_brightness = result.as_ref().ok().map(|_| level);
        result
    }

    // === Internal Helpers ===

    fn ensure_quiescent(&self) -> Result<()> {
        if self.state.run.is_streaming() {
            return Err(PfError::DeviceStreaming { device: self.id });
        }
        Ok(())
    }

    fn command<T>(
        &self,
        name: &'static str,
        op: impl Fn(&dyn Transport) -> TransportResult<T>,
    ) -> Result<T> {
        let attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            trace!(device = %self.id, command = name, attempt, "Issuing command");
            match op(self.transport.as_ref()) {
                Ok(value) => return Ok(value),
                Err(fault) if fault.is_transient() && attempt < attempts => {
                    warn!(
                        device = %self.id,
                        command = name,
                        attempt,
                        attempts,
                        %fault,
                        "Transient fault, retrying"
                    );
                    if !self.retry.delay.is_zero() {
                        std::thread::sleep(self.retry.delay);
                    }
                    attempt += 1;
                }
                Err(fault) => {
                    debug!(device = %self.id, command = name, %fault, "Command failed");
                    return Err(PfError::DeviceCommunication {
                        device: self.id,
                        fault,
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
