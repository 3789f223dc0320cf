//! Device abstraction layer for Pixy cameras.
//!
//! The [`Transport`] trait is the port to the camera bus: one synchronous
//! command per call, addressed by [`DeviceId`]. A [`DeviceHandle`] wraps one
//! camera on that bus with typed settings and cached state, and [`mock`]
//! provides an in-process bus for tests and simulation.

mod handle;
mod info;
pub mod mock;

pub use handle::{DeviceHandle, HandleState, RetryPolicy};
pub use info::{
    ColorSample, DeviceId, ExposureSetting, FirmwareVersion, RunState, WhiteBalanceSetting,
};

use std::sync::Arc;

use crate::error::TransportFault;

/// Result of a single transport command.
pub type TransportResult<T> = std::result::Result<T, TransportFault>;

/// Camera bus operations.
///
/// Implementations talk to the cameras over a shared channel, so callers
/// issue commands sequentially and never from more than one place at a time.
///
/// # Implementation Notes
///
/// - Exposure and white-balance values travel as packed registers; see
///   [`ExposureSetting::to_register`] and [`WhiteBalanceSetting::to_register`]
/// - Commands addressed to an unknown id fail with
///   [`TransportFault::UsbNotFound`]
pub trait Transport: Send + Sync {
    /// Identities of every camera currently reachable on the bus.
    fn enumerate(&self) -> TransportResult<Vec<DeviceId>>;

    /// Firmware version of a camera.
    fn firmware_version(&self, id: DeviceId) -> TransportResult<FirmwareVersion>;

    /// Start the onboard vision program.
    fn start_program(&self, id: DeviceId) -> TransportResult<()>;

    /// Stop the onboard vision program.
    fn stop_program(&self, id: DeviceId) -> TransportResult<()>;

    /// Start streaming frames / block data to the controller.
    fn start_frame_grabber(&self, id: DeviceId) -> TransportResult<()>;

    /// Stop streaming frames / block data.
    fn stop_frame_grabber(&self, id: DeviceId) -> TransportResult<()>;

    fn get_auto_exposure(&self, id: DeviceId) -> TransportResult<bool>;

    fn set_auto_exposure(&self, id: DeviceId, enable: bool) -> TransportResult<()>;

    /// Read the packed exposure register.
    fn get_exposure(&self, id: DeviceId) -> TransportResult<u32>;

    /// Write the packed exposure register.
    fn set_exposure(&self, id: DeviceId, register: u32) -> TransportResult<()>;

    fn get_auto_white_balance(&self, id: DeviceId) -> TransportResult<bool>;

    fn set_auto_white_balance(&self, id: DeviceId, enable: bool) -> TransportResult<()>;

    /// Read the packed white-balance register.
    fn get_white_balance(&self, id: DeviceId) -> TransportResult<u32>;

    /// Write the packed white-balance register.
    fn set_white_balance(&self, id: DeviceId, register: u32) -> TransportResult<()>;

    /// Set the indicator LED color.
    fn set_led_rgb(&self, id: DeviceId, r: u8, g: u8, b: u8) -> TransportResult<()>;

    /// Set the indicator LED drive current, which the firmware uses as brightness.
    fn set_led_max_current(&self, id: DeviceId, current: u32) -> TransportResult<()>;
}

/// Shared handle to a transport implementation.
pub type SharedTransport = Arc<dyn Transport>;
