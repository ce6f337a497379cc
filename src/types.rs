//! Typed values exchanged with the controller.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A setpoint that is either a numeric value or the device keyword `MAX`.
///
/// Diode current, diode power, and piezo voltage all accept `MAX`, which
/// the controller resolves to the configured maximum rating of the
/// attached laser head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    /// A numeric setpoint, in the unit of the command it is sent with.
    Value(f64),
    /// The controller's maximum rating.
    Max,
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setpoint::Value(v) => write!(f, "{v}"),
            Setpoint::Max => write!(f, "MAX"),
        }
    }
}

impl From<f64> for Setpoint {
    fn from(value: f64) -> Self {
        Setpoint::Value(value)
    }
}

impl FromStr for Setpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") {
            return Ok(Setpoint::Max);
        }
        s.parse::<f64>().map(Setpoint::Value).map_err(|_| {
            Error::InvalidParameter(format!("setpoint must be a number or MAX, got {s:?}"))
        })
    }
}

/// Beeper control values for the `BEEP` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepMode {
    /// Beeper disabled.
    Off,
    /// Beeper enabled.
    On,
    /// Emit a test beep.
    Test,
}

impl BeepMode {
    /// Wire value of the mode.
    pub fn code(self) -> u8 {
        match self {
            BeepMode::Off => 0,
            BeepMode::On => 1,
            BeepMode::Test => 2,
        }
    }
}

/// Front-panel lockout modes for the `LOCKOUT` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutMode {
    /// All front-panel controls enabled.
    AllEnabled,
    /// All front-panel controls disabled.
    AllDisabled,
    /// Only the adjustment dial disabled.
    DialDisabled,
}

impl LockoutMode {
    /// Wire value of the mode.
    pub fn code(self) -> u8 {
        match self {
            LockoutMode::AllEnabled => 0,
            LockoutMode::AllDisabled => 1,
            LockoutMode::DialDisabled => 2,
        }
    }

    /// Decode a `LOCKOUT?` reply value.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(LockoutMode::AllEnabled),
            1 => Ok(LockoutMode::AllDisabled),
            2 => Ok(LockoutMode::DialDisabled),
            other => Err(Error::parse("lockout mode", other.to_string())),
        }
    }
}

/// Controller operation mode, remote or local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Controlled over the remote interface; front panel locked.
    Remote,
    /// Controlled from the front panel.
    Local,
}

impl ControlMode {
    /// Wire token of the mode.
    pub fn token(self) -> &'static str {
        match self {
            ControlMode::Remote => "REM",
            ControlMode::Local => "LOC",
        }
    }

    /// Decode a `SYSTem:MCONtrol?` reply.
    pub fn from_reply(reply: &str) -> Result<Self, Error> {
        match reply.trim() {
            "REM" => Ok(ControlMode::Remote),
            "LOC" => Ok(ControlMode::Local),
            other => Err(Error::parse("control mode", other)),
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One entry drained from the controller's error buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    /// Numeric error code; 0 means the buffer is empty.
    pub code: i32,
    /// Human-readable error text.
    pub message: String,
}

impl DeviceError {
    /// Whether this entry is the empty-buffer marker.
    pub fn is_clear(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Identity of the attached laser head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserHead {
    /// Laser head model number.
    pub model: String,
    /// Laser head serial number.
    pub serial: String,
    /// Laser head firmware revision.
    pub revision: String,
    /// Factory calibration date.
    pub calibration_date: String,
}

/// A timestamped snapshot of the controller state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserStatus {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Laser output on/off.
    pub output_on: bool,
    /// Wavelength tracking on/off.
    pub lambda_track: bool,
    /// Commanded wavelength in nm.
    pub wavelength_setpoint_nm: f64,
    /// Measured wavelength in nm.
    pub wavelength_nm: f64,
    /// Commanded diode current in mA.
    pub diode_current_setpoint_ma: f64,
    /// Measured diode current in mA.
    pub diode_current_ma: f64,
    /// Commanded diode power in mW.
    pub diode_power_setpoint_mw: f64,
    /// Detected diode power in mW.
    pub diode_power_mw: f64,
    /// Commanded piezo voltage as a percentage.
    pub piezo_setpoint_percent: f64,
    /// Measured diode temperature in degrees C.
    pub diode_temperature_c: f64,
    /// Measured cavity temperature in degrees C.
    pub cavity_temperature_c: f64,
}

/// One row of the vendor driver's device table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDeviceInfo {
    /// Device identifier used to address commands.
    pub device_id: i32,
    /// Description string reported by the device.
    pub description: String,
}
