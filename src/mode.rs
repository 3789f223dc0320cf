//! Idle / Active mode dispatcher.
//!
//! The dispatcher is level-triggered: it samples the enable signal once per
//! cycle and only runs entry actions on an edge. The first tick always runs
//! the entry action of whatever state it samples.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::color::hue_rotate;
use crate::device::{DeviceId, ExposureSetting, WhiteBalanceSetting};
use crate::fleet::{BatchReport, FleetManager};

/// Default indicator drive current while idle.
pub const DEFAULT_IDLE_BRIGHTNESS: u32 = 1000;

/// Fleet-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    /// Robot disabled: cameras stopped, LED cycling colors.
    Idle,
    /// Robot enabled: cameras configured and streaming.
    Active,
}

impl ModeState {
    pub const fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Active } else { Self::Idle }
    }
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Fixed camera settings applied on entering Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationProfile {
    pub white_balance: WhiteBalanceSetting,
    pub exposure: ExposureSetting,
}

impl Default for ActivationProfile {
    fn default() -> Self {
        Self {
            white_balance: WhiteBalanceSetting::new(0xA0, 0x80, 0x80),
            exposure: ExposureSetting::new(10, 150),
        }
    }
}

/// An executed mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// `None` on the very first tick.
    pub from: Option<ModeState>,
    pub to: ModeState,
}

/// What one tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub mode: ModeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    pub report: BatchReport,
}

/// Per-cycle Idle/Active controller.
#[derive(Debug, Clone)]
pub struct ModeDispatcher {
    mode: Option<ModeState>,
    activation: ActivationProfile,
    idle_brightness: u32,
    /// Members whose last idle LED update failed.
    led_failing: Vec<DeviceId>,
}

impl ModeDispatcher {
    #[must_use]
    pub const fn new(activation: ActivationProfile, idle_brightness: u32) -> Self {
        Self {
            mode: None,
            activation,
            idle_brightness,
            led_failing: Vec::new(),
        }
    }

    /// Current mode; `None` before the first tick.
    pub const fn mode(&self) -> Option<ModeState> {
        self.mode
    }

    pub const fn activation(&self) -> &ActivationProfile {
        &self.activation
    }

    /// Run one control cycle.
    ///
    /// On an edge the new state's entry action runs before its periodic
    /// action. A failed entry still commits the new mode; it is not retried
    /// on later ticks.
    pub fn tick(&mut self, fleet: &mut FleetManager, enabled: bool, now: Duration) -> TickOutcome {
        let target = ModeState::from_enabled(enabled);
        let mut report = BatchReport::new();
        let mut transition = None;

        if self.mode != Some(target) {
            info!(from = ?self.mode, to = %target, "Mode transition");
            report = self.enter(fleet, target);
            transition = Some(Transition {
                from: self.mode,
                to: target,
            });
            self.mode = Some(target);
        }
        report.merge(self.periodic(fleet, target, now));

        TickOutcome {
            mode: target,
            transition,
            report,
        }
    }

    /// Re-run the current mode's entry action.
    ///
    /// Used after the bus has been re-enumerated. Does nothing before the
    /// first tick.
    pub fn reenter(&mut self, fleet: &mut FleetManager) -> BatchReport {
        match self.mode {
            Some(mode) => {
                info!(mode = %mode, "Re-entering mode");
                self.enter(fleet, mode)
            }
            None => BatchReport::new(),
        }
    }

    fn enter(&self, fleet: &mut FleetManager, mode: ModeState) -> BatchReport {
        let report = match mode {
            ModeState::Active => self.enter_active(fleet),
            ModeState::Idle => self.enter_idle(fleet),
        };
        if !report.is_clean() {
            warn!(
                mode = %mode,
                failed = ?report.failed_devices().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Mode entry incomplete"
            );
        }
        report
    }

    /// Configure every member before starting any of them, so no camera
    /// captures a frame with automatic exposure or white balance still on.
    fn enter_active(&self, fleet: &mut FleetManager) -> BatchReport {
        let profile = self.activation;
        let mut report = fleet.for_each_member("configure", |h| {
            h.stop_frame_grabber()?;
            h.stop_program()?;
            h.set_auto_white_balance(false)?;
            h.set_white_balance_value(profile.white_balance)?;
            h.set_auto_exposure(false)?;
            h.set_exposure_compensation(profile.exposure)
        });

        let configured = report.succeeded.clone();
        debug!(configured = configured.len(), "Starting configured cameras");
        report.merge(fleet.apply_to(&configured, "activate", |h| {
            h.start_program()?;
            h.start_frame_grabber()
        }));
        report
    }

    fn enter_idle(&self, fleet: &mut FleetManager) -> BatchReport {
        let level = self.idle_brightness;
        let mut report = fleet.for_each_member("deactivate", |h| {
            h.stop_frame_grabber()?;
            h.stop_program()
        });
        // Dim every member, including those that failed to stop.
        report.merge(fleet.for_each_member("idle_brightness", |h| h.set_led_brightness(level)));
        report
    }

    fn periodic(&mut self, fleet: &mut FleetManager, mode: ModeState, now: Duration) -> BatchReport {
        match mode {
            ModeState::Idle => {
                let color = hue_rotate(now.as_secs_f64());
                let report = fleet.for_each_member("led_color", |h| h.set_led_color(color));
                self.track_led_failures(&report);
                report
            }
            ModeState::Active => {
                self.led_failing.clear();
                BatchReport::new()
            }
        }
    }

    /// Warn once when a member's LED updates start failing, not every cycle.
    fn track_led_failures(&mut self, report: &BatchReport) {
        let failing = report.failed_devices();
        for device in failing.iter().filter(|d| !self.led_failing.contains(d)) {
            if let Some(failure) = report.failures.iter().find(|f| f.device == *device) {
                warn!(device = %device, slot = %failure.slot, error = %failure.error, "Indicator LED updates failing");
            }
        }
        for device in self.led_failing.iter().filter(|d| !failing.contains(d)) {
            info!(device = %device, "Indicator LED updates recovered");
        }
        self.led_failing = failing;
    }
}

impl Default for ModeDispatcher {
    fn default() -> Self {
        Self::new(ActivationProfile::default(), DEFAULT_IDLE_BRIGHTNESS)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::mock::{MockBus, OpKind, Operation};
    use crate::device::{ColorSample, DeviceHandle, RunState};
    use crate::error::TransportFault;

    const A: DeviceId = DeviceId::new(0x053C_3165);
    const B: DeviceId = DeviceId::new(0xC6E0_B552);

    fn fleet(bus: &Arc<MockBus>, ids: &[DeviceId]) -> FleetManager {
        let handles = ids
            .iter()
            .enumerate()
            .map(|(i, id)| DeviceHandle::new(*id, format!("cam{i}"), bus.clone()))
            .collect();
        FleetManager::new(handles, ids.to_vec()).unwrap()
    }

    #[test]
    fn test_first_tick_runs_entry() {
        let bus = Arc::new(MockBus::with_cameras(&[A]));
        let mut fleet = fleet(&bus, &[A]);
        let mut dispatcher = ModeDispatcher::default();
        assert_eq!(dispatcher.mode(), None);

        let outcome = dispatcher.tick(&mut fleet, false, Duration::ZERO);

        assert_eq!(
            outcome.transition,
            Some(Transition {
                from: None,
                to: ModeState::Idle
            })
        );
        let camera = bus.camera(A).unwrap();
        assert!(!camera.program && !camera.frame_grabber);
        assert_eq!(camera.led_current, DEFAULT_IDLE_BRIGHTNESS);
        assert_eq!(camera.led, ColorSample::new(255, 0, 0));
    }

    #[test]
    fn test_enable_configures_both_cameras() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        let mut dispatcher = ModeDispatcher::default();

        dispatcher.tick(&mut fleet, false, Duration::ZERO);
        let outcome = dispatcher.tick(&mut fleet, true, Duration::from_millis(20));

        assert!(outcome.report.is_clean(), "{:?}", outcome.report);
        assert_eq!(dispatcher.mode(), Some(ModeState::Active));
        for id in [A, B] {
            let camera = bus.camera(id).unwrap();
            assert!(!camera.auto_white_balance);
            assert_eq!(camera.white_balance(), WhiteBalanceSetting::new(0xA0, 0x80, 0x80));
            assert!(!camera.auto_exposure);
            assert_eq!(camera.exposure(), ExposureSetting::new(10, 150));
            assert!(camera.program && camera.frame_grabber);
            assert_eq!(fleet.handle(id).unwrap().run_state(), RunState::RUNNING);
        }
    }

    #[test]
    fn test_auto_modes_disabled_before_any_capture() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        let mut dispatcher = ModeDispatcher::default();

        dispatcher.tick(&mut fleet, true, Duration::ZERO);

        let first_start = bus
            .position(|op| op.kind() == OpKind::StartFrameGrabber)
            .unwrap();
        for id in [A, B] {
            let ae = bus
                .position(|op| *op == Operation::SetAutoExposure { id, enable: false })
                .unwrap();
            let awb = bus
                .position(|op| *op == Operation::SetAutoWhiteBalance { id, enable: false })
                .unwrap();
            assert!(ae < first_start && awb < first_start);
        }
    }

    #[test]
    fn test_same_state_ticks_are_quiet_when_active() {
        let bus = Arc::new(MockBus::with_cameras(&[A]));
        let mut fleet = fleet(&bus, &[A]);
        let mut dispatcher = ModeDispatcher::default();

        dispatcher.tick(&mut fleet, true, Duration::ZERO);
        bus.clear_operations();

        for cycle in 1..5 {
            let outcome = dispatcher.tick(&mut fleet, true, Duration::from_millis(cycle * 20));
            assert!(outcome.transition.is_none());
        }
        assert!(bus.operations().is_empty());
    }

    #[test]
    fn test_idle_cycle_rotates_led() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        let mut dispatcher = ModeDispatcher::default();

        dispatcher.tick(&mut fleet, false, Duration::ZERO);
        bus.clear_operations();
        let outcome = dispatcher.tick(&mut fleet, false, Duration::from_millis(1500));

        assert!(outcome.transition.is_none());
        for id in [A, B] {
            bus.assert_operations_for(
                id,
                &[Operation::SetLedRgb {
                    id,
                    color: ColorSample::new(127, 255, 0),
                }],
            );
        }
    }

    #[test]
    fn test_disable_stops_and_dims() {
        let bus = Arc::new(MockBus::with_cameras(&[A]));
        let mut fleet = fleet(&bus, &[A]);
        let mut dispatcher = ModeDispatcher::new(ActivationProfile::default(), 400);

        dispatcher.tick(&mut fleet, true, Duration::ZERO);
        bus.clear_operations();
        dispatcher.tick(&mut fleet, false, Duration::from_secs(2));

        let kinds: Vec<OpKind> = bus.operations_for(A).iter().map(Operation::kind).collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::StopFrameGrabber,
                OpKind::StopProgram,
                OpKind::SetLedMaxCurrent,
                OpKind::SetLedRgb
            ]
        );
        assert_eq!(bus.camera(A).unwrap().led_current, 400);
    }

    #[test]
    fn test_configure_failure_leaves_member_stopped() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        bus.fail_operation(A, OpKind::SetAutoExposure, TransportFault::InvalidParameter);
        let mut dispatcher = ModeDispatcher::default();

        let outcome = dispatcher.tick(&mut fleet, true, Duration::ZERO);

        assert_eq!(outcome.report.failed_devices(), vec![A]);
        assert_eq!(bus.count_of(A, OpKind::StartProgram), 0);
        assert!(bus.camera(B).unwrap().frame_grabber);
        // Committed even though A failed, and not retried.
        assert_eq!(dispatcher.mode(), Some(ModeState::Active));
        bus.clear_operations();
        dispatcher.tick(&mut fleet, true, Duration::from_millis(20));
        assert!(bus.operations().is_empty());
    }

    #[test]
    fn test_led_set_even_if_stop_fails() {
        let bus = Arc::new(MockBus::with_cameras(&[A]));
        let mut fleet = fleet(&bus, &[A]);
        bus.fail_operation(A, OpKind::StopFrameGrabber, TransportFault::Chirp);
        let mut dispatcher = ModeDispatcher::default();

        let outcome = dispatcher.tick(&mut fleet, false, Duration::ZERO);

        assert_eq!(outcome.report.failed_devices(), vec![A]);
        assert_eq!(bus.camera(A).unwrap().led_current, DEFAULT_IDLE_BRIGHTNESS);
        assert_eq!(bus.count_of(A, OpKind::StopProgram), 0);
    }

    #[test]
    fn test_reenter_reapplies_active_entry() {
        let bus = Arc::new(MockBus::with_cameras(&[A]));
        let mut fleet = fleet(&bus, &[A]);
        let mut dispatcher = ModeDispatcher::default();
        assert!(dispatcher.reenter(&mut fleet).is_clean());
        assert!(bus.operations().is_empty());

        dispatcher.tick(&mut fleet, true, Duration::ZERO);
        fleet.forget_state();
        bus.clear_operations();

        let report = dispatcher.reenter(&mut fleet);
        assert!(report.is_clean());
        assert_eq!(bus.count_of(A, OpKind::StopProgram), 1);
        assert_eq!(bus.count_of(A, OpKind::StartFrameGrabber), 1);
    }

    #[test]
    fn test_stop_and_dim_failures_both_reported() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        bus.fail_operation(A, OpKind::StopFrameGrabber, TransportFault::UsbNoDevice);
        bus.fail_operation(A, OpKind::SetLedMaxCurrent, TransportFault::Chirp);
        let mut dispatcher = ModeDispatcher::default();

        let outcome = dispatcher.tick(&mut fleet, false, Duration::ZERO);

        let operations: Vec<&str> = outcome
            .report
            .failures
            .iter()
            .filter(|f| f.device == A)
            .map(|f| f.operation)
            .collect();
        assert_eq!(operations, vec!["deactivate", "idle_brightness"]);
        assert!(outcome.report.failures[0].error.contains("No device"));
        assert!(outcome.report.failures[1].error.contains("Chirp"));
        assert_eq!(outcome.report.failed_devices(), vec![A]);
        assert_eq!(bus.camera(B).unwrap().led_current, DEFAULT_IDLE_BRIGHTNESS);
    }

    #[test]
    fn test_led_failures_tracked_across_cycles() {
        let bus = Arc::new(MockBus::with_cameras(&[A, B]));
        let mut fleet = fleet(&bus, &[A, B]);
        let mut dispatcher = ModeDispatcher::default();
        dispatcher.tick(&mut fleet, false, Duration::ZERO);
        assert!(dispatcher.led_failing.is_empty());

        bus.fail_operation(B, OpKind::SetLedRgb, TransportFault::UsbNoDevice);
        for cycle in 1..4 {
            let outcome = dispatcher.tick(&mut fleet, false, Duration::from_millis(cycle * 20));
            assert_eq!(outcome.report.failed_devices(), vec![B]);
            assert_eq!(dispatcher.led_failing, vec![B]);
        }

        bus.heal(B);
        let outcome = dispatcher.tick(&mut fleet, false, Duration::from_millis(100));
        assert!(outcome.report.is_clean());
        assert!(dispatcher.led_failing.is_empty());
    }
}
