//! Serial port transport adapter
//!
//! Direct USB/RS-232 connection to a GRBL controller via the
//! `serialport` crate, plus port enumeration filtered to device names
//! CNC controllers actually show up under.

use std::io::{Read, Write};
use std::time::Duration;

use grblkit_core::{ConnectionError, Result};
use grblkit_protocol::Transport;

/// Short read timeout so `read_byte` never stalls the engine loop.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Information about an available serial port.
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g. "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Human-readable description
    pub description: String,
    /// Manufacturer name if available
    pub manufacturer: Option<String>,
}

/// List serial ports that look like CNC controllers.
///
/// - Windows: `COM*`
/// - Linux: `/dev/ttyUSB*`, `/dev/ttyACM*`
/// - macOS: `/dev/cu.usbserial-*`, `/dev/cu.usbmodem*`
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::SerialError {
            reason: e.to_string(),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_cnc_port(&port.port_name))
        .map(|port| {
            let (description, manufacturer) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => (
                    format!(
                        "USB {} {}",
                        usb.manufacturer.as_deref().unwrap_or("Device"),
                        usb.product.as_deref().unwrap_or("Serial Port")
                    ),
                    usb.manufacturer.clone(),
                ),
                serialport::SerialPortType::BluetoothPort => ("Bluetooth Serial".to_string(), None),
                _ => ("Serial Port".to_string(), None),
            };

            SerialPortInfo {
                port_name: port.port_name.clone(),
                description,
                manufacturer,
            }
        })
        .collect())
}

fn is_cnc_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem")
}

/// Byte transport over a local serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open a port at the given baud rate (8N1, no flow control - the
    /// GRBL default).
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                }
            })?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn available(&mut self) -> usize {
        self.port.bytes_to_read().map_or(0, |n| n as usize)
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|e| ConnectionError::IoError {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
