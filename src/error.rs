//! Error types for the driver.
//!
//! This module defines the primary error type, [`Error`], used across the
//! whole crate. Using the `thiserror` crate, it provides one consistent
//! surface for everything that can go wrong while talking to a TLB-6700,
//! from transport-level I/O to replies the controller itself rejects.
//!
//! ## Error groups
//!
//! - **Transport**: `Io`, `Serial`, `Usb`, `NotConnected`, `Timeout` cover
//!   the byte path to the instrument. `Usb` carries the raw status code a
//!   `newp_usb_*` vendor call returned.
//! - **Protocol**: `IncompleteReply` (the framing contract was violated),
//!   `Device` (the controller answered a query with `ERROR...`),
//!   `Rejected` (a set command was not acknowledged with `OK`), and
//!   `Parse` (a reply that passed framing but is not the expected type).
//! - **Usage**: `InvalidParameter` for arguments rejected before any I/O,
//!   `Config`/`InvalidConfig` for configuration problems, and
//!   `Unsupported` when a transport was not compiled in.
//!
//! With the `#[from]` conversions in place, transport code can use the `?`
//! operator on `std::io` and `serialport` results directly.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can fail while driving a TLB-6700.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Newport USB driver call {call} failed with status {code}")]
    Usb {
        /// Name of the vendor function that failed.
        call: &'static str,
        /// Raw status code returned by the vendor library.
        code: i32,
    },

    #[error("Newport USB driver already initialised in this process")]
    UsbAlreadyOpen,

    #[error("No Newport USB device with id {0}")]
    DeviceNotFound(i32),

    #[error("Background I/O task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Transport not connected")]
    NotConnected,

    #[error("No reply from instrument within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Incomplete reply from instrument (missing trailing CR): {0:?}")]
    IncompleteReply(String),

    #[error("Instrument reported: {0}")]
    Device(String),

    #[error("Command {command:?} not acknowledged, instrument replied {reply:?}")]
    Rejected {
        /// The command that was sent.
        command: String,
        /// The reply received instead of `OK`.
        reply: String,
    },

    #[error("Could not parse {what} from reply {reply:?}")]
    Parse {
        /// What the reply was expected to contain.
        what: &'static str,
        /// The offending reply text.
        reply: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    #[error("{0} support not enabled. Rebuild with --features {1}")]
    Unsupported(&'static str, &'static str),
}

impl Error {
    /// Shorthand for a parse failure on a given reply.
    pub(crate) fn parse(what: &'static str, reply: impl Into<String>) -> Self {
        Error::Parse {
            what,
            reply: reply.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Device("ERROR 116".to_string());
        assert_eq!(err.to_string(), "Instrument reported: ERROR 116");
    }

    #[test]
    fn test_rejected_display_includes_command_and_reply() {
        let err = Error::Rejected {
            command: "BRIGHT 50".into(),
            reply: "ERROR".into(),
        };
        let text = err.to_string();
        assert!(text.contains("BRIGHT 50"));
        assert!(text.contains("ERROR"));
    }

    #[test]
    fn test_unsupported_names_feature() {
        let err = Error::Unsupported("Serial", "serial");
        assert_eq!(
            err.to_string(),
            "Serial support not enabled. Rebuild with --features serial"
        );
    }
}
