//! Frame encoding/decoding
//!
//! Implements the framed wire format spoken by the power supply firmware.
//!
//! Request frame:
//! - 1 byte: start byte (0xDD)
//! - 1 byte: command code
//! - 1 byte: payload length
//! - N bytes: payload
//! - 1 byte: checksum (XOR of code, length, and payload bytes)
//!
//! Response frame:
//! - 1 byte: start byte (0xEE)
//! - 1 byte: payload length
//! - N bytes: payload
//!
//! Responses carry no separately verifiable checksum byte; they are
//! validated structurally and by payload shape, and corruption is recovered
//! by the engine's retransmit loop.

use super::commands::Command;
use super::response::{Response, ResponseKind};
use super::ProtocolError;

/// Start byte of every outbound (host to device) frame
pub const REQUEST_START_BYTE: u8 = 0xDD;

/// Start byte of every inbound (device to host) frame
pub const RESPONSE_START_BYTE: u8 = 0xEE;

/// Compute the request checksum: XOR of code, length byte, and payload
pub fn checksum(code: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(code ^ payload.len() as u8, |acc, b| acc ^ b)
}

/// Encode a command into a complete request frame
pub fn encode(command: &Command) -> Vec<u8> {
    let code = command.code();
    let payload = command.payload();

    // All command payloads are at most 3 bytes; the length field is one byte
    debug_assert!(payload.len() <= super::MAX_PAYLOAD_SIZE);

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(REQUEST_START_BYTE);
    frame.push(code);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(&payload);
    frame.push(checksum(code, &payload));
    frame
}

/// Decode a complete candidate response frame
///
/// `data` must hold one whole frame: start byte, length byte, and exactly
/// the declared number of payload bytes. There is no partial or streaming
/// decode; the engine assembles candidate frames before calling this.
pub fn decode(data: &[u8], kind: ResponseKind) -> Result<Response, ProtocolError> {
    if data.len() < 2 {
        return Err(ProtocolError::LengthMismatch {
            declared: 0,
            actual: data.len(),
        });
    }

    if data[0] != RESPONSE_START_BYTE {
        return Err(ProtocolError::BadStartByte(data[0]));
    }

    let declared = data[1] as usize;
    if declared + 2 != data.len() {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: data.len(),
        });
    }

    kind.decode_payload(&data[2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::{Channel, ChannelMode};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_connect() {
        let frame = encode(&Command::Connect);
        // code 0x00, empty payload, checksum = 0x00 ^ 0x00
        assert_eq!(frame, vec![0xDD, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_set_voltage() {
        let frame = encode(&Command::SetVoltage {
            channel: Channel::Ch1,
            millivolts: 5000,
        });
        let expected_sum = 0x01 ^ 0x03 ^ 0x01 ^ 0x13 ^ 0x88;
        assert_eq!(
            frame,
            vec![0xDD, 0x01, 0x03, 0x01, 0x13, 0x88, expected_sum]
        );
    }

    #[test]
    fn test_encode_read_voltage() {
        let frame = encode(&Command::ReadVoltage(Channel::Ch0));
        assert_eq!(frame, vec![0xDD, 0x02, 0x01, 0x00, 0x02 ^ 0x01 ^ 0x00]);
    }

    #[test]
    fn test_encode_set_channel_mode() {
        let frame = encode(&Command::SetChannelMode {
            channel: Channel::Ch0,
            mode: ChannelMode::Standard,
        });
        assert_eq!(
            frame,
            vec![0xDD, 0x04, 0x02, 0x00, 0x01, 0x04 ^ 0x02 ^ 0x00 ^ 0x01]
        );
    }

    #[test]
    fn test_checksum_excludes_start_byte() {
        // Same code/payload must give the same checksum regardless of framing
        assert_eq!(checksum(0x02, &[0x00]), 0x02 ^ 0x01 ^ 0x00);
        assert_eq!(checksum(0x00, &[]), 0x00);
    }

    #[test]
    fn test_decode_voltage_frame() {
        // 10 mV little-endian
        let resp = decode(&[0xEE, 0x02, 0x0A, 0x00], ResponseKind::Voltage).unwrap();
        assert_eq!(resp, Response::Voltage(10));
    }

    #[test]
    fn test_decode_ack_frame() {
        let resp = decode(&[0xEE, 0x03, 0x41, 0x43, 0x4B], ResponseKind::Ack).unwrap();
        assert_eq!(resp, Response::Ack(true));
    }

    #[test]
    fn test_decode_rejects_wrong_start_byte() {
        let err = decode(&[0xDD, 0x02, 0x0A, 0x00], ResponseKind::Voltage).unwrap_err();
        assert!(matches!(err, ProtocolError::BadStartByte(0xDD)));
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        // Declares 3 payload bytes but carries 2
        let err = decode(&[0xEE, 0x03, 0x0A, 0x00], ResponseKind::Voltage).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthMismatch { .. }));

        // Truncated to nothing
        assert!(decode(&[0xEE], ResponseKind::Voltage).is_err());
    }

    #[test]
    fn test_decode_rejects_shape_mismatch() {
        // Structurally fine but an ACK is expected
        let err = decode(&[0xEE, 0x02, 0x0A, 0x00], ResponseKind::Ack).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidResponse));
    }

    #[test]
    fn test_roundtrip_semantics_for_readings() {
        // A device answering a voltage read with the encoded value must
        // decode back to the same semantic reading
        for mv in [0i16, 10, 5000, 12000, -1, -250] {
            let bytes = mv.to_le_bytes();
            let frame = [0xEE, 0x02, bytes[0], bytes[1]];
            assert_eq!(
                decode(&frame, ResponseKind::Voltage).unwrap(),
                Response::Voltage(mv)
            );
            assert_eq!(
                decode(&frame, ResponseKind::Current).unwrap(),
                Response::Current(mv)
            );
        }
    }
}
