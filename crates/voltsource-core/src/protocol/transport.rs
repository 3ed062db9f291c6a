//! Transport abstraction
//!
//! The engine talks to the device through this seam rather than a concrete
//! serial handle, so tests (and non-serial links) can substitute their own
//! byte channel.

use serialport::SerialPort;
use std::io::Read;

use super::ProtocolError;

/// An open byte-oriented link to the device
///
/// All calls happen on the engine's worker thread. `read_exact` may block up
/// to the link's short native timeout; `bytes_available` must not block.
/// Dropping the transport closes the link.
pub trait Transport: Send {
    /// Write a full frame to the device
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Number of bytes ready to read without blocking
    fn bytes_available(&mut self) -> Result<usize, ProtocolError>;

    /// Read exactly `n` bytes, blocking up to the link's native timeout
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError>;

    /// Discard any buffered inbound bytes
    fn flush_input(&mut self) -> Result<(), ProtocolError>;
}

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Wrap an already opened and configured serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        std::io::Write::write_all(&mut self.port, data)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn bytes_available(&mut self) -> Result<usize, ProtocolError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; n];
        self.port
            .read_exact(&mut buf)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        Ok(buf)
    }

    fn flush_input(&mut self) -> Result<(), ProtocolError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }
}
