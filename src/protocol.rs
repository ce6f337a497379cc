//! Reply framing and classification for the TLB-6700 ASCII protocol.
//!
//! The controller answers every command with a single line terminated by
//! CRLF. A well-formed reply is the text before the first `\n` and must
//! still carry its trailing `\r`; a missing `\r` means the read stopped
//! before the controller finished talking. Accepted set commands are
//! acknowledged with the literal `OK`, and failed queries produce a reply
//! beginning with `ERROR`.

use crate::error::{Error, Result};
use crate::types::DeviceError;

/// Acknowledgement the controller sends for an accepted set command.
pub const ACK: &str = "OK";

/// Prefix of replies reporting a device-side fault.
pub const ERROR_PREFIX: &str = "ERROR";

/// Extract the reply line from a raw read buffer.
///
/// Takes the text before the first `\n`, requires the trailing `\r`, and
/// returns the line trimmed.
pub fn extract_reply(raw: &str) -> Result<String> {
    let line = raw.split('\n').next().unwrap_or("");
    if !line.ends_with('\r') {
        return Err(Error::IncompleteReply(raw.to_string()));
    }
    Ok(line.trim().to_string())
}

/// Classify a query reply, surfacing device-reported faults.
pub fn check_query(reply: String) -> Result<String> {
    if reply.starts_with(ERROR_PREFIX) {
        return Err(Error::Device(reply));
    }
    Ok(reply)
}

/// Verify that a set command was acknowledged with [`ACK`].
pub fn check_ack(command: &str, reply: &str) -> Result<()> {
    if reply != ACK {
        return Err(Error::Rejected {
            command: command.to_string(),
            reply: reply.to_string(),
        });
    }
    Ok(())
}

/// Parse a strict `1`/`0` reply into a bool.
pub fn parse_bool(reply: &str) -> Result<bool> {
    match reply {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(Error::parse("boolean flag", other)),
    }
}

/// Parse a numeric reply, naming the quantity in the error message.
pub fn parse_num<T: std::str::FromStr>(what: &'static str, reply: &str) -> Result<T> {
    reply
        .trim()
        .parse()
        .map_err(|_| Error::parse(what, reply))
}

/// Parse an `ERRSTR?` reply of the form `code,"text"`.
///
/// The controller reports `0,"NO ERROR"` when its error buffer is empty.
/// A reply that does not follow the `code,text` shape is kept whole as the
/// message, with code -1.
pub fn parse_device_error(reply: &str) -> DeviceError {
    match reply.split_once(',') {
        Some((code, text)) => match code.trim().parse::<i32>() {
            Ok(code) => DeviceError {
                code,
                message: text.trim().trim_matches('"').to_string(),
            },
            Err(_) => DeviceError {
                code: -1,
                message: reply.to_string(),
            },
        },
        None => DeviceError {
            code: -1,
            message: reply.to_string(),
        },
    }
}
