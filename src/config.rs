//! Configuration for the command-line tool.
//!
//! Strongly-typed configuration loaded from (lowest to highest
//! precedence):
//! 1. `tlb6700.toml` (or the file given with `--config`)
//! 2. Environment variables prefixed with `TLB6700_`
//!
//! The file is optional; every key has a default. Durations use
//! humantime strings.
//!
//! # Environment variable overrides
//!
//! ```text
//! TLB6700_PORT=/dev/ttyUSB1
//! TLB6700_TRANSPORT=usb
//! TLB6700_TIMEOUT=2s
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::DEFAULT_COMMAND_DELAY_MS;

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "tlb6700.toml";

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transport to reach the controller with: "serial" or "usb".
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Serial port name (e.g., "/dev/ttyUSB0", "COM3").
    #[serde(default)]
    pub port: Option<String>,

    /// Serial baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Device id from the vendor driver's device table.
    #[serde(default = "default_usb_device_id")]
    pub usb_device_id: i32,

    /// Reply timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Pause between writing a command and reading its reply.
    #[serde(with = "humantime_serde", default = "default_command_delay")]
    pub command_delay: Duration,

    /// Sampling interval for the `monitor` subcommand.
    #[serde(with = "humantime_serde", default = "default_monitor_interval")]
    pub monitor_interval: Duration,
}

fn default_transport() -> String {
    "serial".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_usb_device_id() -> i32 {
    1
}

fn default_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_command_delay() -> Duration {
    Duration::from_millis(DEFAULT_COMMAND_DELAY_MS)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            port: None,
            baud_rate: default_baud_rate(),
            usb_device_id: default_usb_device_id(),
            timeout: default_timeout(),
            command_delay: default_command_delay(),
            monitor_interval: default_monitor_interval(),
        }
    }
}

impl Config {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and the
    /// environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment
    /// variables still apply. The result is validated before being
    /// returned.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TLB6700_"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// Checks the transport name and rejects degenerate timings. Whether
    /// a serial port name is present is checked at connect time instead,
    /// since subcommands like `list` never open a connection.
    pub fn validate(&self) -> Result<()> {
        let valid_transports = ["serial", "usb"];
        if !valid_transports.contains(&self.transport.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "Invalid transport '{}'. Must be one of: {}",
                self.transport,
                valid_transports.join(", ")
            )));
        }

        if self.baud_rate == 0 {
            return Err(Error::InvalidConfig(
                "baud_rate must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.monitor_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "monitor_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The serial port to use, or an error explaining what is missing.
    pub fn require_port(&self) -> Result<&str> {
        match self.port.as_deref() {
            Some(port) if !port.is_empty() => Ok(port),
            _ => Err(Error::InvalidConfig(
                "serial transport selected but no port configured \
                 (set 'port' in the config file, TLB6700_PORT, or --port)"
                    .to_string(),
            )),
        }
    }
}
