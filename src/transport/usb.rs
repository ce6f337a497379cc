//! Native USB transport through Newport's vendor driver.
//!
//! The vendor library (`usbdll`) exposes a small C API in which
//! `newp_usb_init_system` opens every attached Newport device at once and
//! may be active only once per process. [`UsbSystem`] owns that lifecycle
//! as an RAII handle and hands out [`UsbTransport`] values that address
//! individual devices by the id found in the driver's device table.
//!
//! Linking requires the Newport USB driver to be installed, which is why
//! this module sits behind the `usb-dll` cargo feature.

#![allow(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Transport, DEFAULT_COMMAND_DELAY_MS};
use crate::discovery;
use crate::error::{Error, Result};
use crate::protocol;
use crate::types::UsbDeviceInfo;

/// Size of the buffer handed to `newp_usb_get_device_info`.
const DEVICE_TABLE_LEN: usize = 4096;

/// Size of the reply buffer for `newp_usb_get_ascii`.
const REPLY_BUFFER_LEN: usize = 1024;

mod ffi {
    use std::os::raw::{c_char, c_long, c_ulong};

    #[link(name = "usbdll")]
    extern "system" {
        pub fn newp_usb_init_system() -> c_long;
        pub fn newp_usb_uninit_system();
        pub fn newp_usb_get_device_info(info: *mut c_char) -> c_long;
        pub fn newp_usb_send_ascii(id: c_long, command: *const c_char, length: c_ulong) -> c_long;
        pub fn newp_usb_get_ascii(
            id: c_long,
            buffer: *mut c_char,
            length: c_ulong,
            bytes_read: *mut c_ulong,
        ) -> c_long;
    }
}

/// Guards against a second `newp_usb_init_system` while one is active.
static SYSTEM_OPEN: AtomicBool = AtomicBool::new(false);

/// Decode a NUL-terminated vendor buffer.
fn ascii_from_buffer(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// RAII handle over the vendor driver's global device table.
///
/// Opening the system opens all attached Newport devices; dropping the
/// handle uninitialises the driver again. Only one handle may exist per
/// process.
pub struct UsbSystem {
    _not_constructible: (),
}

impl UsbSystem {
    /// Initialise the vendor driver and open all attached devices.
    pub async fn open() -> Result<Arc<Self>> {
        tokio::task::spawn_blocking(|| {
            if SYSTEM_OPEN.swap(true, Ordering::SeqCst) {
                return Err(Error::UsbAlreadyOpen);
            }
            let status = unsafe { ffi::newp_usb_init_system() };
            if status != 0 {
                SYSTEM_OPEN.store(false, Ordering::SeqCst);
                return Err(Error::Usb {
                    call: "newp_usb_init_system",
                    code: status as i32,
                });
            }
            debug!("Newport USB system initialised");
            Ok(Arc::new(UsbSystem {
                _not_constructible: (),
            }))
        })
        .await?
    }

    /// Read and parse the driver's device table.
    ///
    /// This performs a blocking driver call; async callers should wrap it
    /// in `spawn_blocking`.
    pub fn devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        let mut buffer = vec![0u8; DEVICE_TABLE_LEN];
        let status = unsafe { ffi::newp_usb_get_device_info(buffer.as_mut_ptr().cast()) };
        if status != 0 {
            return Err(Error::Usb {
                call: "newp_usb_get_device_info",
                code: status as i32,
            });
        }
        Ok(discovery::parse_device_table(&ascii_from_buffer(&buffer)))
    }

    /// Create a transport addressing one device from the table.
    pub fn transport(self: &Arc<Self>, device_id: i32) -> UsbTransport {
        UsbTransport {
            system: Arc::clone(self),
            device_id,
            command_delay: Duration::from_millis(DEFAULT_COMMAND_DELAY_MS),
            connected: false,
        }
    }
}

impl Drop for UsbSystem {
    fn drop(&mut self) {
        unsafe { ffi::newp_usb_uninit_system() };
        SYSTEM_OPEN.store(false, Ordering::SeqCst);
        debug!("Newport USB system closed");
    }
}

/// USB transport addressing one device in an open [`UsbSystem`].
pub struct UsbTransport {
    system: Arc<UsbSystem>,
    device_id: i32,
    command_delay: Duration,
    connected: bool,
}

impl UsbTransport {
    /// Set the pause between write and read.
    ///
    /// The vendor protocol needs the default 50 ms; lower values risk
    /// truncated replies.
    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    /// The device id this transport addresses.
    pub fn device_id(&self) -> i32 {
        self.device_id
    }
}

#[async_trait]
impl Transport for UsbTransport {
    async fn connect(&mut self) -> Result<()> {
        let system = Arc::clone(&self.system);
        let id = self.device_id;

        let known = tokio::task::spawn_blocking(move || system.devices()).await??;
        if !known.iter().any(|d| d.device_id == id) {
            return Err(Error::DeviceNotFound(id));
        }

        self.connected = true;
        debug!(device_id = id, "usb device attached");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        use std::os::raw::{c_long, c_ulong};

        if !self.connected {
            return Err(Error::NotConnected);
        }

        let system = Arc::clone(&self.system);
        let cmd = command.to_string();
        let id = self.device_id;
        let delay = self.command_delay;

        debug!(command, device_id = id, "usb write");

        let raw = tokio::task::spawn_blocking(move || -> Result<String> {
            // Keeps the driver initialised for the duration of the call.
            let _system = system;

            let status = unsafe {
                ffi::newp_usb_send_ascii(
                    id as c_long,
                    cmd.as_ptr().cast(),
                    cmd.len() as c_ulong,
                )
            };
            if status != 0 {
                return Err(Error::Usb {
                    call: "newp_usb_send_ascii",
                    code: status as i32,
                });
            }

            std::thread::sleep(delay);

            let mut buffer = vec![0u8; REPLY_BUFFER_LEN];
            let mut bytes_read: c_ulong = 0;
            let status = unsafe {
                ffi::newp_usb_get_ascii(
                    id as c_long,
                    buffer.as_mut_ptr().cast(),
                    REPLY_BUFFER_LEN as c_ulong,
                    &mut bytes_read,
                )
            };
            if status != 0 {
                return Err(Error::Usb {
                    call: "newp_usb_get_ascii",
                    code: status as i32,
                });
            }

            Ok(ascii_from_buffer(&buffer))
        })
        .await??;

        let reply = protocol::extract_reply(&raw)?;
        debug!(reply = %reply, device_id = id, "usb read");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_from_buffer_stops_at_nul() {
        let mut buffer = vec![0u8; 16];
        buffer[..5].copy_from_slice(b"OK\r\n\0");
        assert_eq!(ascii_from_buffer(&buffer), "OK\r\n");
    }

    #[test]
    fn test_ascii_from_buffer_without_nul_takes_everything() {
        assert_eq!(ascii_from_buffer(b"ab"), "ab");
    }

    #[test]
    fn test_with_command_delay_overrides_default() {
        let system = Arc::new(UsbSystem {
            _not_constructible: (),
        });
        let transport = system.transport(7);
        assert_eq!(
            transport.command_delay,
            Duration::from_millis(DEFAULT_COMMAND_DELAY_MS)
        );
        assert_eq!(transport.device_id(), 7);

        let transport = transport.with_command_delay(Duration::from_millis(100));
        assert_eq!(transport.command_delay, Duration::from_millis(100));

        // The stub system never ran the vendor init; skip the uninit in Drop.
        std::mem::forget(transport);
    }
}
