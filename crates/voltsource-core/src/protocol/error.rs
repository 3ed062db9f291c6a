//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Not connected to device")]
    NotConnected,

    #[error("Bad start byte: {0:#04x}")]
    BadStartByte(u8),

    #[error("Frame length mismatch: declared {declared}, got {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Invalid response payload")]
    InvalidResponse,

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
