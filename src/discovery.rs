//! Enumeration of candidate instruments.
//!
//! The vendor USB driver reports attached devices as one string of
//! `id,description` pairs separated by `;`; parsing that table lives here
//! so it stays testable without the driver installed. Serial candidates
//! come from `serialport::available_ports`.

use crate::error::Result;
use crate::types::UsbDeviceInfo;

/// Parse the vendor driver's device table.
///
/// Format: `id,description;id,description;`. Blank segments (such as the
/// one after the trailing `;`) are skipped, as are segments that carry no
/// parseable id.
pub fn parse_device_table(table: &str) -> Vec<UsbDeviceInfo> {
    let mut devices = Vec::new();

    for segment in table.split(';') {
        if segment.trim().is_empty() {
            continue;
        }
        let Some((id, description)) = segment.split_once(',') else {
            continue;
        };
        if let Ok(device_id) = id.trim().parse::<i32>() {
            devices.push(UsbDeviceInfo {
                device_id,
                description: description.to_string(),
            });
        }
    }

    devices
}

/// List devices attached through the Newport USB driver.
///
/// Opens the vendor driver for the duration of the call and closes it
/// again, so this cannot be used while a [`UsbSystem`] handle is held
/// elsewhere in the process.
///
/// [`UsbSystem`]: crate::transport::UsbSystem
#[cfg(feature = "usb-dll")]
pub async fn list_usb_devices() -> Result<Vec<UsbDeviceInfo>> {
    let system = crate::transport::UsbSystem::open().await?;
    tokio::task::spawn_blocking(move || system.devices()).await?
}

/// List devices attached through the Newport USB driver.
#[cfg(not(feature = "usb-dll"))]
pub async fn list_usb_devices() -> Result<Vec<UsbDeviceInfo>> {
    Err(crate::error::Error::Unsupported("Newport USB driver", "usb-dll"))
}

/// List serial port names visible on this machine.
#[cfg(feature = "serial")]
pub fn list_serial_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// List serial port names visible on this machine.
#[cfg(not(feature = "serial"))]
pub fn list_serial_ports() -> Result<Vec<String>> {
    Err(crate::error::Error::Unsupported("Serial", "serial"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_table_single_device() {
        let devices = parse_device_table("1,TLB-6700-LN SN10045;");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, 1);
        assert_eq!(devices[0].description, "TLB-6700-LN SN10045");
    }

    #[test]
    fn test_parse_device_table_multiple_devices() {
        let devices = parse_device_table("1,TLB-6700 A;2,TLB-6700 B;");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].device_id, 2);
        assert_eq!(devices[1].description, "TLB-6700 B");
    }

    #[test]
    fn test_parse_device_table_empty() {
        assert!(parse_device_table("").is_empty());
        assert!(parse_device_table(";;").is_empty());
    }

    #[test]
    fn test_parse_device_table_description_keeps_commas() {
        // Only the first comma separates id from description.
        let devices = parse_device_table("3,Velocity, 6700 series;");
        assert_eq!(devices[0].device_id, 3);
        assert_eq!(devices[0].description, "Velocity, 6700 series");
    }

    #[test]
    fn test_parse_device_table_skips_malformed_segments() {
        let devices = parse_device_table("garbage;x,no id;4,good one;");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, 4);
    }
}
