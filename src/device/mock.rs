//! In-process camera bus for tests and simulation.
//!
//! [`MockBus`] models the firmware state of each attached camera, records
//! every command that reaches a camera, and supports fault injection per
//! camera and per command.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pf::device::mock::{MockBus, Operation};
//! use pf::device::{DeviceHandle, DeviceId};
//!
//! let cam = DeviceId::new(0xC6E0B552);
//! let bus = Arc::new(MockBus::with_cameras(&[cam]));
//! let mut handle = DeviceHandle::new(cam, "front", bus.clone());
//!
//! handle.stop_program().unwrap();
//!
//! bus.assert_operations_for(cam, &[Operation::StopProgram { id: cam }]);
//! ```

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};

use super::info::{ColorSample, DeviceId, ExposureSetting, FirmwareVersion, WhiteBalanceSetting};
use super::{Transport, TransportResult};
use crate::error::TransportFault;

/// Recorded command for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    FirmwareVersion { id: DeviceId },
    StartProgram { id: DeviceId },
    StopProgram { id: DeviceId },
    StartFrameGrabber { id: DeviceId },
    StopFrameGrabber { id: DeviceId },
    GetAutoExposure { id: DeviceId },
    SetAutoExposure { id: DeviceId, enable: bool },
    GetExposure { id: DeviceId },
    SetExposure { id: DeviceId, setting: ExposureSetting },
    GetAutoWhiteBalance { id: DeviceId },
    SetAutoWhiteBalance { id: DeviceId, enable: bool },
    GetWhiteBalance { id: DeviceId },
    SetWhiteBalance { id: DeviceId, setting: WhiteBalanceSetting },
    SetLedRgb { id: DeviceId, color: ColorSample },
    SetLedMaxCurrent { id: DeviceId, current: u32 },
}

/// Command kind, used to target fault injection and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    FirmwareVersion,
    StartProgram,
    StopProgram,
    StartFrameGrabber,
    StopFrameGrabber,
    GetAutoExposure,
    SetAutoExposure,
    GetExposure,
    SetExposure,
    GetAutoWhiteBalance,
    SetAutoWhiteBalance,
    GetWhiteBalance,
    SetWhiteBalance,
    SetLedRgb,
    SetLedMaxCurrent,
}

impl OpKind {
    /// Parameter commands are only served while the camera is quiescent.
    const fn is_parameter(self) -> bool {
        matches!(
            self,
            Self::GetAutoExposure
                | Self::SetAutoExposure
                | Self::GetExposure
                | Self::SetExposure
                | Self::GetAutoWhiteBalance
                | Self::SetAutoWhiteBalance
                | Self::GetWhiteBalance
                | Self::SetWhiteBalance
        )
    }
}

impl Operation {
    /// Camera the command was addressed to.
    pub const fn device(&self) -> DeviceId {
        match self {
            Self::FirmwareVersion { id }
            | Self::StartProgram { id }
            | Self::StopProgram { id }
            | Self::StartFrameGrabber { id }
            | Self::StopFrameGrabber { id }
            | Self::GetAutoExposure { id }
            | Self::SetAutoExposure { id, .. }
            | Self::GetExposure { id }
            | Self::SetExposure { id, .. }
            | Self::GetAutoWhiteBalance { id }
            | Self::SetAutoWhiteBalance { id, .. }
            | Self::GetWhiteBalance { id }
            | Self::SetWhiteBalance { id, .. }
            | Self::SetLedRgb { id, .. }
            | Self::SetLedMaxCurrent { id, .. } => *id,
        }
    }

    pub const fn kind(&self) -> OpKind {
        match self {
            Self::FirmwareVersion { .. } => OpKind::FirmwareVersion,
            Self::StartProgram { .. } => OpKind::StartProgram,
            Self::StopProgram { .. } => OpKind::StopProgram,
            Self::StartFrameGrabber { .. } => OpKind::StartFrameGrabber,
            Self::StopFrameGrabber { .. } => OpKind::StopFrameGrabber,
            Self::GetAutoExposure { .. } => OpKind::GetAutoExposure,
            Self::SetAutoExposure { .. } => OpKind::SetAutoExposure,
            Self::GetExposure { .. } => OpKind::GetExposure,
            Self::SetExposure { .. } => OpKind::SetExposure,
            Self::GetAutoWhiteBalance { .. } => OpKind::GetAutoWhiteBalance,
            Self::SetAutoWhiteBalance { .. } => OpKind::SetAutoWhiteBalance,
            Self::GetWhiteBalance { .. } => OpKind::GetWhiteBalance,
            Self::SetWhiteBalance { .. } => OpKind::SetWhiteBalance,
            Self::SetLedRgb { .. } => OpKind::SetLedRgb,
            Self::SetLedMaxCurrent { .. } => OpKind::SetLedMaxCurrent,
        }
    }
}

/// Firmware-side state of one simulated camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraState {
    pub attached: bool,
    pub firmware: FirmwareVersion,
    pub program: bool,
    pub frame_grabber: bool,
    pub auto_exposure: bool,
    pub auto_white_balance: bool,
    pub exposure_register: u32,
    pub white_balance_register: u32,
    pub led: ColorSample,
    pub led_current: u32,
}

impl CameraState {
    /// State right after power-up: default program running, auto modes on.
    #[must_use]
    pub const fn powered_on() -> Self {
        Self {
            attached: true,
            firmware: FirmwareVersion {
                major: 2,
                minor: 0,
                build: 19,
            },
            program: true,
            frame_grabber: false,
            auto_exposure: true,
            auto_white_balance: true,
            exposure_register: ExposureSetting::new(20, 100).to_register(),
            white_balance_register: WhiteBalanceSetting::new(64, 64, 64).to_register(),
            led: ColorSample::BLACK,
            led_current: 0,
        }
    }

    #[must_use]
    pub const fn exposure(&self) -> ExposureSetting {
        ExposureSetting::from_register(self.exposure_register)
    }

    #[must_use]
    pub const fn white_balance(&self) -> WhiteBalanceSetting {
        WhiteBalanceSetting::from_register(self.white_balance_register)
    }

    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.program || self.frame_grabber
    }
}

#[derive(Debug, Clone, Copy)]
struct FaultRule {
    id: DeviceId,
    kind: Option<OpKind>,
    fault: TransportFault,
}

/// Mock camera bus for testing without real hardware.
#[derive(Debug, Default)]
pub struct MockBus {
    cameras: Mutex<Vec<(DeviceId, CameraState)>>,
    operation_log: Mutex<Vec<Operation>>,
    persistent_faults: Mutex<Vec<FaultRule>>,
    one_shot_faults: Mutex<Vec<FaultRule>>,
    enumerate_fault: Mutex<Option<TransportFault>>,
}

impl MockBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus with powered-on cameras attached, in order.
    #[must_use]
    pub fn with_cameras(ids: &[DeviceId]) -> Self {
        let bus = Self::new();
        for id in ids {
            bus.attach(*id, CameraState::powered_on());
        }
        bus
    }

    // === Configuration ===

    /// Attach (or replace) a camera.
    pub fn attach(&self, id: DeviceId, state: CameraState) {
        debug!(device = %id, "Attaching mock camera");
        let mut cameras = lock(&self.cameras);
        if let Some(entry) = cameras.iter_mut().find(|(cid, _)| *cid == id) {
            entry.1 = state;
        } else {
            cameras.push((id, state));
        }
    }

    /// Simulate unplugging a camera; it vanishes from enumeration.
    pub fn detach(&self, id: DeviceId) {
        if let Some((_, camera)) = lock(&self.cameras).iter_mut().find(|(cid, _)| *cid == id) {
            camera.attached = false;
        }
    }

    /// Plug a detached camera back in.
    pub fn reattach(&self, id: DeviceId) {
        if let Some((_, camera)) = lock(&self.cameras).iter_mut().find(|(cid, _)| *cid == id) {
            camera.attached = true;
        }
    }

    /// Fail every command to `id` until [`MockBus::heal`] is called.
    pub fn fail_device(&self, id: DeviceId, fault: TransportFault) {
        lock(&self.persistent_faults).push(FaultRule {
            id,
            kind: None,
            fault,
        });
    }

    /// Fail one kind of command to `id` until [`MockBus::heal`] is called.
    pub fn fail_operation(&self, id: DeviceId, kind: OpKind, fault: TransportFault) {
        lock(&self.persistent_faults).push(FaultRule {
            id,
            kind: Some(kind),
            fault,
        });
    }

    /// Fail only the next command to `id`.
    pub fn inject_fault(&self, id: DeviceId, fault: TransportFault) {
        lock(&self.one_shot_faults).push(FaultRule {
            id,
            kind: None,
            fault,
        });
    }

    /// Make the next enumeration fail.
    pub fn fail_enumeration(&self, fault: TransportFault) {
        *lock(&self.enumerate_fault) = Some(fault);
    }

    /// Remove every fault rule for `id`.
    pub fn heal(&self, id: DeviceId) {
        lock(&self.persistent_faults).retain(|rule| rule.id != id);
        lock(&self.one_shot_faults).retain(|rule| rule.id != id);
    }

    // === Assertions ===

    /// Firmware state of a camera.
    #[must_use]
    pub fn camera(&self, id: DeviceId) -> Option<CameraState> {
        lock(&self.cameras)
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, camera)| camera.clone())
    }

    /// Get all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.operation_log).clone()
    }

    /// Recorded operations addressed to one camera.
    #[must_use]
    pub fn operations_for(&self, id: DeviceId) -> Vec<Operation> {
        lock(&self.operation_log)
            .iter()
            .filter(|op| op.device() == id)
            .cloned()
            .collect()
    }

    /// Number of recorded operations of one kind addressed to `id`.
    #[must_use]
    pub fn count_of(&self, id: DeviceId, kind: OpKind) -> usize {
        lock(&self.operation_log)
            .iter()
            .filter(|op| op.device() == id && op.kind() == kind)
            .count()
    }

    /// Index of the first recorded operation matching `pred`.
    #[must_use]
    pub fn position(&self, pred: impl Fn(&Operation) -> bool) -> Option<usize> {
        lock(&self.operation_log).iter().position(pred)
    }

    /// Assert the operations addressed to `id` match exactly.
    ///
    /// # Panics
    ///
    /// Panics if the operations don't match.
    pub fn assert_operations_for(&self, id: DeviceId, expected: &[Operation]) {
        let actual = self.operations_for(id);
        assert_eq!(
            actual, expected,
            "Operation mismatch for {id}.\nExpected: {expected:#?}\nActual: {actual:#?}",
        );
    }

    /// Clear the operation log for fresh assertions.
    pub fn clear_operations(&self) {
        lock(&self.operation_log).clear();
    }

    // === Internal Helpers ===

    fn check_fault(&self, id: DeviceId, kind: OpKind) -> TransportResult<()> {
        {
            let mut one_shot = lock(&self.one_shot_faults);
            if let Some(pos) = one_shot
                .iter()
                .position(|rule| rule.id == id && rule.kind.is_none_or(|k| k == kind))
            {
                return Err(one_shot.remove(pos).fault);
            }
        }
        if let Some(rule) = lock(&self.persistent_faults)
            .iter()
            .find(|rule| rule.id == id && rule.kind.is_none_or(|k| k == kind))
        {
            return Err(rule.fault);
        }
        Ok(())
    }

    /// Run `f` against the camera's state, enforcing attachment, fault rules
    /// and the quiescence rule, then record the operation.
    fn with_camera<T>(
        &self,
        op: Operation,
        f: impl FnOnce(&mut CameraState) -> T,
    ) -> TransportResult<T> {
        let id = op.device();
        let kind = op.kind();
        self.check_fault(id, kind)?;

        let mut cameras = lock(&self.cameras);
        let camera = cameras
            .iter_mut()
            .find(|(cid, _)| *cid == id)
            .map(|(_, camera)| camera)
            .ok_or(TransportFault::UsbNotFound)?;
        if !camera.attached {
            return Err(TransportFault::UsbNoDevice);
        }
        if kind.is_parameter() && camera.is_streaming() {
            trace!(device = %id, ?kind, "Rejecting parameter command while streaming");
            return Err(TransportFault::UsbBusy);
        }

        let value = f(camera);
        drop(cameras);

        trace!(?op, "Recording operation");
        lock(&self.operation_log).push(op);
        Ok(value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Transport for MockBus {
    fn enumerate(&self) -> TransportResult<Vec<DeviceId>> {
        if let Some(fault) = lock(&self.enumerate_fault).take() {
            return Err(fault);
        }
        Ok(lock(&self.cameras)
            .iter()
            .filter(|(_, camera)| camera.attached)
            .map(|(id, _)| *id)
            .collect())
    }

    fn firmware_version(&self, id: DeviceId) -> TransportResult<FirmwareVersion> {
        self.with_camera(Operation::FirmwareVersion { id }, |c| c.firmware)
    }

    fn start_program(&self, id: DeviceId) -> TransportResult<()> {
        self.with_camera(Operation::StartProgram { id }, |c| c.program = true)
    }

    fn stop_program(&self, id: DeviceId) -> TransportResult<()> {
        self.with_camera(Operation::StopProgram { id }, |c| c.program = false)
    }

    fn start_frame_grabber(&self, id: DeviceId) -> TransportResult<()> {
        self.with_camera(Operation::StartFrameGrabber { id }, |c| c.frame_grabber = true)
    }

    fn stop_frame_grabber(&self, id: DeviceId) -> TransportResult<()> {
        self.with_camera(Operation::StopFrameGrabber { id }, |c| c.frame_grabber = false)
    }

    fn get_auto_exposure(&self, id: DeviceId) -> TransportResult<bool> {
        self.with_camera(Operation::GetAutoExposure { id }, |c| c.auto_exposure)
    }

    fn set_auto_exposure(&self, id: DeviceId, enable: bool) -> TransportResult<()> {
        self.with_camera(Operation::SetAutoExposure { id, enable }, |c| {
            c.auto_exposure = enable;
        })
    }

    fn get_exposure(&self, id: DeviceId) -> TransportResult<u32> {
        self.with_camera(Operation::GetExposure { id }, |c| c.exposure_register)
    }

    fn set_exposure(&self, id: DeviceId, register: u32) -> TransportResult<()> {
        let setting = ExposureSetting::from_register(register);
        self.with_camera(Operation::SetExposure { id, setting }, |c| {
            c.exposure_register = register;
        })
    }

    fn get_auto_white_balance(&self, id: DeviceId) -> TransportResult<bool> {
        self.with_camera(Operation::GetAutoWhiteBalance { id }, |c| c.auto_white_balance)
    }

    fn set_auto_white_balance(&self, id: DeviceId, enable: bool) -> TransportResult<()> {
        self.with_camera(Operation::SetAutoWhiteBalance { id, enable }, |c| {
            c.auto_white_balance = enable;
        })
    }

    fn get_white_balance(&self, id: DeviceId) -> TransportResult<u32> {
        self.with_camera(Operation::GetWhiteBalance { id }, |c| c.white_balance_register)
    }

    fn set_white_balance(&self, id: DeviceId, register: u32) -> TransportResult<()> {
        let setting = WhiteBalanceSetting::from_register(register);
        self.with_camera(Operation::SetWhiteBalance { id, setting }, |c| {
            c.white_balance_register = register;
        })
    }

    fn set_led_rgb(&self, id: DeviceId, r: u8, g: u8, b: u8) -> TransportResult<()> {
        let color = ColorSample::new(r, g, b);
        self.with_camera(Operation::SetLedRgb { id, color }, |c| c.led = color)
    }

    fn set_led_max_current(&self, id: DeviceId, current: u32) -> TransportResult<()> {
        self.with_camera(Operation::SetLedMaxCurrent { id, current }, |c| {
            c.led_current = current;
        })
    }
}
