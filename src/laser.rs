//! Driver for the TLB-6700 Tunable Laser Controller.
//!
//! One typed async method per controller command, on top of any
//! [`Transport`]. Query commands are checked for device-reported faults
//! (`ERROR...` replies); set commands must come back acknowledged with
//! `OK`. Arguments are validated before any I/O.

use std::fmt;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::protocol;
use crate::transport::Transport;
use crate::types::{
    BeepMode, ControlMode, DeviceError, LaserHead, LaserStatus, LockoutMode, Setpoint,
};

/// Reject values outside an inclusive range before any I/O happens.
fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        return Err(Error::InvalidParameter(format!(
            "{name} must be {min}-{max}, got {value}"
        )));
    }
    Ok(())
}

/// Interface to one TLB-6700 controller.
///
/// The driver is transport-agnostic: native USB through the vendor
/// driver, RS-232, or a scripted mock all implement [`Transport`].
///
/// # Example
///
/// ```no_run
/// use newport_tlb6700::{SerialTransport, Tlb6700, Transport};
///
/// # async fn demo() -> newport_tlb6700::Result<()> {
/// let mut transport = SerialTransport::new("/dev/ttyUSB0", 9600);
/// transport.connect().await?;
/// let mut laser = Tlb6700::new(Box::new(transport));
///
/// laser.set_wavelength_nm(1064.2).await?;
/// println!("now at {} nm", laser.wavelength_nm().await?);
/// # Ok(())
/// # }
/// ```
pub struct Tlb6700 {
    transport: Box<dyn Transport>,
}

impl Tlb6700 {
    /// Wrap an already configured transport.
    ///
    /// The transport does not have to be connected yet; call
    /// [`connect`](Self::connect) afterwards if it is not.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open a serial connection with default settings and wrap it.
    #[cfg(feature = "serial")]
    pub async fn connect_serial(port: &str, baud_rate: u32) -> Result<Self> {
        use crate::transport::SerialTransport;

        let mut transport = SerialTransport::new(port, baud_rate);
        transport.connect().await?;
        tracing::info!(port, baud_rate, "TLB-6700 attached over serial");
        Ok(Self::new(Box::new(transport)))
    }

    /// Open the vendor USB driver and wrap the device with the given id,
    /// using the default command delay.
    ///
    /// To change transport settings, build the transport through
    /// [`UsbSystem`](crate::transport::UsbSystem) instead. The driver
    /// system handle stays alive inside the transport and is released
    /// when the driver is dropped.
    #[cfg(feature = "usb-dll")]
    pub async fn connect_usb(device_id: i32) -> Result<Self> {
        use crate::transport::UsbSystem;

        let system = UsbSystem::open().await?;
        let mut transport = system.transport(device_id);
        transport.connect().await?;
        tracing::info!(device_id, "TLB-6700 attached over USB");
        Ok(Self::new(Box::new(transport)))
    }

    /// Connect the underlying transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// Disconnect the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send a query and return its reply, surfacing `ERROR...` replies.
    async fn query(&mut self, command: &str) -> Result<String> {
        let reply = self.transport.send_command(command).await?;
        protocol::check_query(reply)
    }

    /// Send a set command and verify the `OK` acknowledgement.
    async fn set(&mut self, command: &str) -> Result<()> {
        let reply = self.transport.send_command(command).await?;
        protocol::check_ack(command, &reply)
    }

    // --- Common commands ---------------------------------------------

    /// Instrument identification string (`*IDN?`).
    pub async fn identify(&mut self) -> Result<String> {
        self.query("*IDN?").await
    }

    /// Recall saved settings; bin 0 is factory defaults, 1-5 user bins.
    pub async fn recall_settings(&mut self, bin: u8) -> Result<()> {
        check_range("recall bin", bin, 0, 5)?;
        self.set(&format!("*RCL {bin}")).await
    }

    /// Soft-reset the controller.
    pub async fn reset(&mut self) -> Result<()> {
        self.set("*RST").await
    }

    /// Save current settings to a memory bin (2-5).
    pub async fn save_settings(&mut self, bin: u8) -> Result<()> {
        check_range("save bin", bin, 2, 5)?;
        self.set(&format!("*SAV {bin}")).await
    }

    /// Whether no long-running operation is still in progress (`*OPC?`).
    pub async fn operation_complete(&mut self) -> Result<bool> {
        let reply = self.query("*OPC?").await?;
        protocol::parse_bool(&reply)
    }

    /// Controller status byte: 0 with a clean error buffer, 128 with
    /// errors pending.
    pub async fn status_byte(&mut self) -> Result<u8> {
        let reply = self.query("*STB?").await?;
        protocol::parse_num("status byte", &reply)
    }

    // --- Front panel --------------------------------------------------

    /// Control the beeper.
    pub async fn set_beep(&mut self, mode: BeepMode) -> Result<()> {
        self.set(&format!("BEEP {}", mode.code())).await
    }

    /// Whether the beeper is enabled.
    pub async fn beep(&mut self) -> Result<bool> {
        let reply = self.query("BEEP?").await?;
        protocol::parse_bool(&reply)
    }

    /// Set display brightness as a percentage (1-100).
    pub async fn set_brightness(&mut self, percent: u8) -> Result<()> {
        check_range("brightness", percent, 1, 100)?;
        self.set(&format!("BRIGHT {percent}")).await
    }

    /// Display brightness percentage.
    pub async fn brightness(&mut self) -> Result<u8> {
        let reply = self.query("BRIGHT?").await?;
        protocol::parse_num("brightness", &reply)
    }

    /// Set the front-panel lockout mode.
    pub async fn set_lockout(&mut self, mode: LockoutMode) -> Result<()> {
        self.set(&format!("LOCKOUT {}", mode.code())).await
    }

    /// Current front-panel lockout mode.
    pub async fn lockout(&mut self) -> Result<LockoutMode> {
        let reply = self.query("LOCKOUT?").await?;
        LockoutMode::from_code(protocol::parse_num("lockout mode", &reply)?)
    }

    // --- Error buffer --------------------------------------------------

    /// Next entry from the error buffer, as the raw `ERRSTR?` reply.
    pub async fn error_string(&mut self) -> Result<String> {
        self.query("ERRSTR?").await
    }

    /// Next entry from the error buffer, parsed.
    ///
    /// Returns `None` once the buffer is empty (the controller reports
    /// code 0).
    pub async fn next_error(&mut self) -> Result<Option<DeviceError>> {
        let reply = self.error_string().await?;
        let error = protocol::parse_device_error(&reply);
        Ok(if error.is_clear() { None } else { Some(error) })
    }

    // --- Output --------------------------------------------------------

    /// Laser turn-on delay in milliseconds (3000-60000).
    pub async fn set_on_delay_ms(&mut self, milliseconds: u32) -> Result<()> {
        check_range("turn-on delay", milliseconds, 3000, 60000)?;
        self.set(&format!("ONDELAY {milliseconds}")).await
    }

    /// Configured laser turn-on delay in milliseconds.
    pub async fn on_delay_ms(&mut self) -> Result<u32> {
        let reply = self.query("ONDELAY?").await?;
        protocol::parse_num("turn-on delay", &reply)
    }

    /// Turn laser output on or off.
    pub async fn set_output(&mut self, on: bool) -> Result<()> {
        let state = if on { "ON" } else { "OFF" };
        self.set(&format!("OUTPut:STATe {state}")).await
    }

    /// Whether laser output is on.
    pub async fn output(&mut self) -> Result<bool> {
        let reply = self.query("OUTPut:STATe?").await?;
        protocol::parse_bool(&reply)
    }

    /// Enable or disable wavelength (lambda) tracking.
    pub async fn set_lambda_track(&mut self, track: bool) -> Result<()> {
        self.set(&format!("OUTPUT:TRACK {}", i32::from(track))).await
    }

    /// Whether wavelength tracking is on.
    pub async fn lambda_track(&mut self) -> Result<bool> {
        let reply = self.query("OUTPUT:TRACK?").await?;
        Ok(protocol::parse_num::<i32>("track state", &reply)? != 0)
    }

    // --- Sensed values --------------------------------------------------

    /// Measured diode current in mA.
    pub async fn diode_current_ma(&mut self) -> Result<f64> {
        let reply = self.query("SENSe:CURRent:DIODe").await?;
        protocol::parse_num("diode current", &reply)
    }

    /// Measured diode temperature in degrees C.
    pub async fn diode_temperature_c(&mut self) -> Result<f64> {
        let reply = self.query("SENSe:TEMPerature:DIODe").await?;
        protocol::parse_num("diode temperature", &reply)
    }

    /// Measured cavity temperature in degrees C.
    pub async fn cavity_temperature_c(&mut self) -> Result<f64> {
        let reply = self.query("SENSe:TEMPerature:CAVity").await?;
        protocol::parse_num("cavity temperature", &reply)
    }

    /// Auxiliary detector input voltage in V.
    pub async fn auxiliary_voltage_v(&mut self) -> Result<f64> {
        let reply = self.query("SENSe:VOLTage:AUXiliary").await?;
        protocol::parse_num("auxiliary voltage", &reply)
    }

    /// Detected diode power in mW.
    pub async fn diode_power_mw(&mut self) -> Result<f64> {
        let reply = self.query("SENSE:POWER:DIODE?").await?;
        protocol::parse_num("diode power", &reply)
    }

    /// Measured wavelength in nm.
    pub async fn wavelength_nm(&mut self) -> Result<f64> {
        let reply = self.query("SENSE:WAVELENGTH?").await?;
        protocol::parse_num("wavelength", &reply)
    }

    // --- Setpoints -------------------------------------------------------

    /// Set the diode current setpoint in mA, or `MAX` for the rated
    /// maximum.
    pub async fn set_diode_current(&mut self, setpoint: impl Into<Setpoint>) -> Result<()> {
        let setpoint = setpoint.into();
        self.set(&format!("SOURce:CURRent:DIODe {setpoint}")).await
    }

    /// Diode current setpoint in mA.
    pub async fn diode_current_setpoint_ma(&mut self) -> Result<f64> {
        let reply = self.query("SOURce:CURRent:DIODe?").await?;
        protocol::parse_num("diode current setpoint", &reply)
    }

    /// Set the diode power setpoint in mW, or `MAX` for the rated
    /// maximum.
    pub async fn set_diode_power(&mut self, setpoint: impl Into<Setpoint>) -> Result<()> {
        let setpoint = setpoint.into();
        self.set(&format!("SOURCE:POWER:DIODE {setpoint}")).await
    }

    /// Diode power setpoint in mW.
    pub async fn diode_power_setpoint_mw(&mut self) -> Result<f64> {
        let reply = self.query("SOURCE:POWER:DIODE?").await?;
        protocol::parse_num("diode power setpoint", &reply)
    }

    /// Set the wavelength setpoint in nm.
    pub async fn set_wavelength_nm(&mut self, wavelength_nm: f64) -> Result<()> {
        self.set(&format!("SOURCE:WAVELENGTH {wavelength_nm}")).await
    }

    /// Wavelength setpoint in nm.
    pub async fn wavelength_setpoint_nm(&mut self) -> Result<f64> {
        let reply = self.query("SOURCE:WAVELENGTH?").await?;
        protocol::parse_num("wavelength setpoint", &reply)
    }

    /// Set the piezo voltage as a percentage (0-100), or `MAX` for 100%.
    pub async fn set_piezo_percent(&mut self, setpoint: impl Into<Setpoint>) -> Result<()> {
        let setpoint = setpoint.into();
        if let Setpoint::Value(percent) = setpoint {
            check_range("piezo voltage", percent, 0.0, 100.0)?;
        }
        self.set(&format!("SOURce:VOLTage:PIEZo {setpoint}")).await
    }

    /// Piezo voltage setpoint as a percentage.
    pub async fn piezo_setpoint_percent(&mut self) -> Result<f64> {
        let reply = self.query("SOURce:VOLTage:PIEZo?").await?;
        protocol::parse_num("piezo voltage setpoint", &reply)
    }

    /// Diode temperature setpoint in degrees C.
    pub async fn diode_temperature_setpoint_c(&mut self) -> Result<f64> {
        let reply = self.query("SOURce:TEMPerature:DIODe?").await?;
        protocol::parse_num("diode temperature setpoint", &reply)
    }

    /// Cavity temperature setpoint in degrees C.
    pub async fn cavity_temperature_setpoint_c(&mut self) -> Result<f64> {
        let reply = self.query("SOURce:TEMPerature:CAVity?").await?;
        protocol::parse_num("cavity temperature setpoint", &reply)
    }

    // --- System ----------------------------------------------------------

    /// Total laser enable time in minutes.
    pub async fn enable_time_min(&mut self) -> Result<u32> {
        let reply = self.query("SYSTem:ENTIME?").await?;
        protocol::parse_num("enable time", &reply)
    }

    /// Switch between remote and local (front panel) control.
    pub async fn set_control_mode(&mut self, mode: ControlMode) -> Result<()> {
        self.set(&format!("SYSTem:MCONtrol {}", mode.token())).await
    }

    /// Current control mode.
    pub async fn control_mode(&mut self) -> Result<ControlMode> {
        let reply = self.query("SYSTem:MCONtrol?").await?;
        ControlMode::from_reply(&reply)
    }

    /// Laser head model number.
    pub async fn laser_model(&mut self) -> Result<String> {
        self.query("SYSTem:LASer:MODEL?").await
    }

    /// Laser head serial number.
    pub async fn laser_serial(&mut self) -> Result<String> {
        self.query("SYSTem:LASer:SN?").await
    }

    /// Laser head firmware revision.
    pub async fn laser_revision(&mut self) -> Result<String> {
        self.query("SYSTem:LASer:REV?").await
    }

    /// Laser head factory calibration date.
    pub async fn laser_calibration_date(&mut self) -> Result<String> {
        self.query("SYSTem:LASer:CALDATE?").await
    }

    /// Identity of the attached laser head.
    pub async fn laser_head(&mut self) -> Result<LaserHead> {
        Ok(LaserHead {
            model: self.laser_model().await?,
            serial: self.laser_serial().await?,
            revision: self.laser_revision().await?,
            calibration_date: self.laser_calibration_date().await?,
        })
    }

    /// One timestamped snapshot of the controller state.
    ///
    /// Queries output state, tracking, wavelength, diode current, diode
    /// power, piezo setpoint, and temperatures in one pass.
    pub async fn status(&mut self) -> Result<LaserStatus> {
        Ok(LaserStatus {
            timestamp: Utc::now(),
            output_on: self.output().await?,
            lambda_track: self.lambda_track().await?,
            wavelength_setpoint_nm: self.wavelength_setpoint_nm().await?,
            wavelength_nm: self.wavelength_nm().await?,
            diode_current_setpoint_ma: self.diode_current_setpoint_ma().await?,
            diode_current_ma: self.diode_current_ma().await?,
            diode_power_setpoint_mw: self.diode_power_setpoint_mw().await?,
            diode_power_mw: self.diode_power_mw().await?,
            piezo_setpoint_percent: self.piezo_setpoint_percent().await?,
            diode_temperature_c: self.diode_temperature_c().await?,
            cavity_temperature_c: self.cavity_temperature_c().await?,
        })
    }
}
