//! Error types for camera fleet operations.

use thiserror::Error;

use crate::device::DeviceId;
use crate::fleet::FleetError;

/// Fault reported by the camera transport.
///
/// Mirrors the driver's error table; the transport maps its own status codes
/// onto these variants.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    #[error("USB Error: I/O")]
    UsbIo,

    #[error("USB Error: Busy")]
    UsbBusy,

    #[error("USB Error: No device")]
    UsbNoDevice,

    #[error("USB Error: Target not found")]
    UsbNotFound,

    #[error("Chirp Protocol Error")]
    Chirp,

    #[error("Pixy Error: Invalid command")]
    InvalidCommand,

    #[error("Pixy Error: Invalid parameter")]
    InvalidParameter,
}

impl TransportFault {
    /// Returns true if retrying the same command may succeed.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::UsbIo | Self::UsbBusy)
    }
}

/// Primary error type for fleet operations.
#[derive(Error, Debug)]
pub enum PfError {
    // Identity errors
    #[error("Expected devices not present: {}", format_ids(missing))]
    MissingDevices { missing: Vec<DeviceId> },

    #[error("Unknown device slot: {slot}")]
    UnknownSlot { slot: String },

    #[error("Device {device} is not a fleet member")]
    NotAMember { device: DeviceId },

    // Device errors
    #[error("Device {device} communication error: {fault}")]
    DeviceCommunication {
        device: DeviceId,
        fault: TransportFault,
    },

    #[error("Bus enumeration failed: {0}")]
    Enumeration(TransportFault),

    #[error("Device {device} is streaming; stop the frame grabber and program first")]
    DeviceStreaming { device: DeviceId },

    #[error("Device {device}: manual {setting} ignored while automatic mode is enabled")]
    StaleParameter {
        device: DeviceId,
        setting: &'static str,
    },

    #[error(transparent)]
    Fleet(#[from] FleetError),

    // Operator command errors
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid device id '{value}': expected 0x-prefixed hex or decimal")]
    InvalidDeviceId { value: String },

    // Settings store errors
    #[error("Settings store error: {0}")]
    Store(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PfError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingDevices { .. }
                | Self::UnknownSlot { .. }
                | Self::UnknownCommand { .. }
                | Self::ConfigNotFound { .. }
                | Self::ConfigInvalid(_)
                | Self::InvalidDeviceId { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::MissingDevices { .. } => {
                Some("Check the camera USB cables, then run: pf enumerate")
            }
            Self::UnknownCommand { .. } => {
                Some("Available commands: Enumerate, Get Parameters, Set Parameters")
            }
            Self::ConfigNotFound { .. } => Some("Run: pf config > config.toml"),
            Self::InvalidDeviceId { .. } => Some("Write ids as 0xC6E0B552"),
            Self::StaleParameter { .. } => {
                Some("Disable auto exposure / auto white balance before setting values")
            }
            _ => None,
        }
    }

    /// Returns the device this error is attributed to, if any.
    pub const fn device(&self) -> Option<DeviceId> {
        match self {
            Self::NotAMember { device }
            | Self::DeviceCommunication { device, .. }
            | Self::DeviceStreaming { device }
            | Self::StaleParameter { device, .. } => Some(*device),
            _ => None,
        }
    }
}

fn format_ids(ids: &[DeviceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience type alias for Results using PfError.
pub type Result<T> = std::result::Result<T, PfError>;

/// Turns IO and encoding failures into [`PfError::Store`] with the action
/// that failed in front.
pub trait StoreContext<T> {
    fn store_context<F, S>(self, action: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> StoreContext<T> for std::result::Result<T, E> {
    fn store_context<F, S>(self, action: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| PfError::Store(format!("{}: {e}", action().into())))
    }
}
