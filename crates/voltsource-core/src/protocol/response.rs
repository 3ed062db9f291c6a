//! Protocol responses
//!
//! Decoded response payloads and per-kind payload validation. Framing is
//! handled in [`super::frame`]; this module only interprets the payload
//! bytes once a frame has passed the structural checks.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Acknowledgement payload sent by the firmware ("ACK")
pub const ACK_BYTES: [u8; 3] = [0x41, 0x43, 0x4B];

/// The kind of payload a command expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Fixed 3-byte acknowledgement marker
    Ack,
    /// Signed 16-bit voltage reading in millivolts, little-endian
    Voltage,
    /// Signed 16-bit current reading in milliamps, little-endian
    Current,
}

/// A decoded response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Command acknowledged
    Ack(bool),
    /// Measured voltage in millivolts
    Voltage(i16),
    /// Measured current in milliamps
    Current(i16),
}

impl ResponseKind {
    /// Interpret a validated frame payload as this kind of response
    ///
    /// Fails when the payload shape does not match: acknowledgements must
    /// equal the fixed ACK marker, readings must be exactly two bytes.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Response, ProtocolError> {
        match self {
            ResponseKind::Ack => {
                if payload == ACK_BYTES {
                    Ok(Response::Ack(true))
                } else {
                    Err(ProtocolError::InvalidResponse)
                }
            }
            ResponseKind::Voltage => {
                if payload.len() != 2 {
                    return Err(ProtocolError::InvalidResponse);
                }
                Ok(Response::Voltage(LittleEndian::read_i16(payload)))
            }
            ResponseKind::Current => {
                if payload.len() != 2 {
                    return Err(ProtocolError::InvalidResponse);
                }
                Ok(Response::Current(LittleEndian::read_i16(payload)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ack_marker_accepted() {
        let resp = ResponseKind::Ack.decode_payload(b"ACK").unwrap();
        assert_eq!(resp, Response::Ack(true));
    }

    #[test]
    fn test_ack_wrong_marker_rejected() {
        assert!(ResponseKind::Ack.decode_payload(b"NAK").is_err());
        assert!(ResponseKind::Ack.decode_payload(b"ACKK").is_err());
        assert!(ResponseKind::Ack.decode_payload(b"").is_err());
    }

    #[test]
    fn test_voltage_little_endian_signed() {
        let resp = ResponseKind::Voltage.decode_payload(&[0x0A, 0x00]).unwrap();
        assert_eq!(resp, Response::Voltage(10));

        // 12000 mV = 0x2EE0
        let resp = ResponseKind::Voltage.decode_payload(&[0xE0, 0x2E]).unwrap();
        assert_eq!(resp, Response::Voltage(12000));

        let resp = ResponseKind::Voltage.decode_payload(&[0x00, 0x00]).unwrap();
        assert_eq!(resp, Response::Voltage(0));
    }

    #[test]
    fn test_negative_current() {
        // -250 mA = 0xFF06 little-endian
        let resp = ResponseKind::Current.decode_payload(&[0x06, 0xFF]).unwrap();
        assert_eq!(resp, Response::Current(-250));
    }

    #[test]
    fn test_reading_payload_must_be_two_bytes() {
        assert!(ResponseKind::Voltage.decode_payload(&[0x0A]).is_err());
        assert!(ResponseKind::Voltage
            .decode_payload(&[0x0A, 0x00, 0x00])
            .is_err());
        assert!(ResponseKind::Current.decode_payload(&[]).is_err());
    }
}
