//! Byte transports connecting the driver to a controller.
//!
//! The TLB-6700 talks the same ASCII command protocol over two physical
//! interfaces, and the driver is written against the [`Transport`] trait
//! so both (plus a scripted stand-in for tests) are interchangeable:
//!
//! - [`SerialTransport`] (cargo feature `serial`, on by default): the
//!   controller's RS-232 port via the `serialport` crate.
//! - `UsbTransport` (cargo feature `usb-dll`): native USB through
//!   Newport's vendor driver library.
//! - [`MockTransport`]: scripted command/reply exchanges for tests.
//!
//! Transports return replies already framing-checked per the protocol
//! rules: one line, trailing CR verified, trimmed.

use async_trait::async_trait;

use crate::error::Result;

mod mock;
pub use mock::MockTransport;

#[cfg(feature = "serial")]
mod serial;
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE};

#[cfg(feature = "usb-dll")]
mod usb;
#[cfg(feature = "usb-dll")]
pub use usb::{UsbSystem, UsbTransport};

/// Delay between writing a command and reading its reply, in milliseconds.
///
/// The controller needs a moment to compose its answer; reading too early
/// yields a truncated line.
pub const DEFAULT_COMMAND_DELAY_MS: u64 = 50;

/// One ASCII command/reply channel to a controller.
///
/// `send_command` writes a single command and returns the framed reply
/// line (trailing CR/LF removed). Implementations perform their blocking
/// I/O off the async executor.
#[async_trait]
pub trait Transport: Send {
    /// Open the underlying byte channel.
    async fn connect(&mut self) -> Result<()>;

    /// Close the underlying byte channel.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether the channel is currently open.
    fn is_connected(&self) -> bool;

    /// Write one command and return the framed reply.
    async fn send_command(&mut self, command: &str) -> Result<String>;
}
