//! Serial port handling
//!
//! Provides low-level serial port access for device communication.

use serialport::{SerialPortInfo, SerialPortType};
use std::time::Duration;

use super::transport::SerialTransport;
use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Read timeout of the underlying port; the engine polls on top of this
const NATIVE_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// List all available serial ports, sorted by name for a stable UI order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}

/// Open and configure a serial port for device communication
///
/// 115200 baud, 8N1, no flow control. The native read timeout is short; the
/// engine enforces the per-call response timeout itself.
pub fn open_port(name: &str) -> Result<SerialTransport, ProtocolError> {
    let port = serialport::new(name, DEFAULT_BAUD_RATE)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(NATIVE_READ_TIMEOUT)
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

    Ok(SerialTransport::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_does_not_panic() {
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_listing_is_sorted() {
        let ports = list_ports();
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
