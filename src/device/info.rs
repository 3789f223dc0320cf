//! Identity, setting, and state types for Pixy cameras.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PfError;

/// Stable 32-bit hardware identifier of a camera (its UID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawDeviceId", into = "String")]
pub struct DeviceId(u32);

impl DeviceId {
    #[must_use]
    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    #[must_use]
    pub const fn uid(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
            None => trimmed.parse::<u32>(),
        };
        parsed.map(Self).map_err(|_| PfError::InvalidDeviceId {
            value: s.to_string(),
        })
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

/// Config files may spell ids as strings or bare integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDeviceId {
    Number(u32),
    Text(String),
}

impl TryFrom<RawDeviceId> for DeviceId {
    type Error = PfError;

    fn try_from(raw: RawDeviceId) -> Result<Self, Self::Error> {
        match raw {
            RawDeviceId::Number(uid) => Ok(Self(uid)),
            RawDeviceId::Text(text) => text.parse(),
        }
    }
}

/// Manual exposure setting.
///
/// On the wire the pair travels as one register: `gain | compensation << 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSetting {
    pub gain: u8,
    pub compensation: u16,
}

impl ExposureSetting {
    #[must_use]
    pub const fn new(gain: u8, compensation: u16) -> Self {
        Self { gain, compensation }
    }

    /// Pack into the firmware register layout.
    #[must_use]
    pub const fn to_register(self) -> u32 {
        self.gain as u32 | ((self.compensation as u32) << 8)
    }

    /// Unpack from the firmware register layout.
    #[must_use]
    pub const fn from_register(register: u32) -> Self {
        Self {
            gain: (register & 0xFF) as u8,
            compensation: ((register >> 8) & 0xFFFF) as u16,
        }
    }
}

/// Manual white-balance channel gains.
///
/// Register layout: `green | red << 8 | blue << 16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteBalanceSetting {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl WhiteBalanceSetting {
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    #[must_use]
    pub const fn to_register(self) -> u32 {
        self.green as u32 | ((self.red as u32) << 8) | ((self.blue as u32) << 16)
    }

    #[must_use]
    pub const fn from_register(register: u32) -> Self {
        Self {
            green: (register & 0xFF) as u8,
            red: ((register >> 8) & 0xFF) as u8,
            blue: ((register >> 16) & 0xFF) as u8,
        }
    }
}

/// Firmware version triple reported by a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Last known running state of a camera's two subsystems.
///
/// `None` means the state has not been observed since the handle was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub program: Option<bool>,
    pub frame_grabber: Option<bool>,
}

impl RunState {
    /// Both subsystems known to be stopped.
    pub const STOPPED: Self = Self {
        program: Some(false),
        frame_grabber: Some(false),
    };

    /// Both subsystems known to be running.
    pub const RUNNING: Self = Self {
        program: Some(true),
        frame_grabber: Some(true),
    };

    /// True if either subsystem is known to be running.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self.program, Some(true)) || matches!(self.frame_grabber, Some(true))
    }
}

/// RGB color pushed to a camera's indicator LED.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorSample {
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
