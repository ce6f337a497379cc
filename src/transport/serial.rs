//! RS-232 transport for controllers fitted with the serial interface.
//!
//! Wraps the `serialport` crate and provides async I/O by running the
//! synchronous serial operations on Tokio's blocking executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Transport, DEFAULT_COMMAND_DELAY_MS};
use crate::error::{Error, Result};
use crate::protocol;

const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Factory baud rate of the TLB-6700 RS-232 port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial transport for RS-232 communication.
#[derive(Clone)]
pub struct SerialTransport {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3").
    port_name: String,

    /// Baud rate.
    baud_rate: u32,

    /// Read timeout.
    timeout: Duration,

    /// Pause between writing a command and reading the reply.
    command_delay: Duration,

    /// Terminator appended to outgoing commands.
    line_terminator: String,

    /// Character ending an incoming reply.
    response_delimiter: char,

    /// The open port, behind Arc<Mutex> for access from blocking tasks.
    port: Option<Arc<Mutex<Box<dyn SerialPort>>>>,
}

impl SerialTransport {
    /// Create a transport for the given port with default settings.
    ///
    /// Defaults: 1 s read timeout, 50 ms command delay, commands
    /// terminated with `\r`, replies delimited by `\n`.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            command_delay: Duration::from_millis(DEFAULT_COMMAND_DELAY_MS),
            line_terminator: "\r".to_string(),
            response_delimiter: '\n',
            port: None,
        }
    }

    /// Set the read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause between write and read.
    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    /// Set the terminator appended to outgoing commands.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Set the character that ends an incoming reply.
    pub fn with_response_delimiter(mut self, delimiter: char) -> Self {
        self.response_delimiter = delimiter;
        self
    }

    /// The configured port name.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        let port_name = self.port_name.clone();
        let baud_rate = self.baud_rate;
        let timeout = self.timeout;

        let port = tokio::task::spawn_blocking(move || -> Result<Box<dyn SerialPort>> {
            let port = serialport::new(&port_name, baud_rate)
                .timeout(timeout)
                .open()?;
            // Drop anything left over from a previous session.
            port.clear(ClearBuffer::All)?;
            Ok(port)
        })
        .await??;

        self.port = Some(Arc::new(Mutex::new(port)));
        debug!(port = %self.port_name, baud = self.baud_rate, "serial port opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.port = None;
        debug!(port = %self.port_name, "serial port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        let port = self.port.as_ref().ok_or(Error::NotConnected)?;

        let cmd = format!("{}{}", command, self.line_terminator);
        let port = Arc::clone(port);
        let delimiter = self.response_delimiter;
        let delay = self.command_delay;
        let timeout = self.timeout;

        debug!(command, "serial write");

        let raw = tokio::task::spawn_blocking(move || -> Result<String> {
            let mut port = port.blocking_lock();
            port.write_all(cmd.as_bytes())?;
            port.flush()?;

            std::thread::sleep(delay);

            let mut response = String::new();
            let mut buf = [0u8; 256];

            loop {
                match port.read(&mut buf) {
                    Ok(n) if n > 0 => {
                        response.push_str(&String::from_utf8_lossy(&buf[..n]));
                        if response.ends_with(delimiter) {
                            break;
                        }
                    }
                    Ok(_) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        if response.is_empty() {
                            return Err(Error::Timeout(timeout));
                        }
                        return Err(Error::IncompleteReply(response));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Ok(response)
        })
        .await??;

        let reply = protocol::extract_reply(&raw)?;
        debug!(reply = %reply, "serial read");
        Ok(reply)
    }
}
