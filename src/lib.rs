//! Driver for the Newport TLB-6700 Tunable Laser Controller.
//!
//! The TLB-6700 (Velocity series) answers a simple ASCII command protocol
//! over native USB through Newport's vendor driver, or over RS-232. This
//! crate wraps that protocol in a typed async API: one method per
//! controller command, argument validation before any I/O, and
//! device-reported faults surfaced as [`Error`] values.
//!
//! ```no_run
//! use newport_tlb6700::Tlb6700;
//!
//! #[tokio::main]
//! async fn main() -> newport_tlb6700::Result<()> {
//!     let mut laser = Tlb6700::connect_serial("/dev/ttyUSB0", 9600).await?;
//!     println!("connected to {}", laser.identify().await?);
//!
//!     laser.set_wavelength_nm(1550.0).await?;
//!     println!("measured {} nm", laser.wavelength_nm().await?);
//!     laser.close().await
//! }
//! ```
//!
//! Cargo features select the available transports: `serial` (on by
//! default) for RS-232 via the `serialport` crate, and `usb-dll` for the
//! vendor USB driver (links against `usbdll`, so it only builds where the
//! Newport USB driver is installed). The scripted
//! [`MockTransport`] is always available, for this crate's tests and for
//! downstream ones.

pub mod config;
pub mod discovery;
pub mod error;
pub mod laser;
pub mod protocol;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use laser::Tlb6700;
pub use transport::{MockTransport, Transport};

#[cfg(feature = "serial")]
pub use transport::{SerialTransport, DEFAULT_BAUD_RATE};

#[cfg(feature = "usb-dll")]
pub use transport::{UsbSystem, UsbTransport};

pub use types::{
    BeepMode, ControlMode, DeviceError, LaserHead, LaserStatus, LockoutMode, Setpoint,
    UsbDeviceInfo,
};

/// Version of this crate, as released.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
