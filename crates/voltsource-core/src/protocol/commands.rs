//! Protocol commands
//!
//! Defines the commands understood by the power supply firmware. Each
//! command knows its wire code, its payload bytes, and the kind of response
//! the device answers with.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::response::ResponseKind;

/// One of the two output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// First output channel (wire index 0)
    Ch0,
    /// Second output channel (wire index 1)
    Ch1,
}

impl Channel {
    /// Wire index of the channel
    pub fn index(&self) -> u8 {
        match self {
            Channel::Ch0 => 0,
            Channel::Ch1 => 1,
        }
    }

    /// Look up a channel by wire index
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Channel::Ch0),
            1 => Some(Channel::Ch1),
            _ => None,
        }
    }

    /// Both channels, in wire order
    pub fn all() -> [Channel; 2] {
        [Channel::Ch0, Channel::Ch1]
    }
}

/// Operating mode of an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Output disabled
    Disabled,
    /// Standard regulated output
    Standard,
}

impl ChannelMode {
    /// Wire value of the mode byte
    pub fn wire_byte(&self) -> u8 {
        match self {
            ChannelMode::Disabled => 0x00,
            ChannelMode::Standard => 0x01,
        }
    }
}

/// Commands understood by the power supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Connection handshake; the device answers with an acknowledgement
    Connect,

    /// Set the target output voltage of a channel, in millivolts
    SetVoltage {
        /// Target channel
        channel: Channel,
        /// Requested output voltage in millivolts
        millivolts: u16,
    },

    /// Read the measured output voltage of a channel
    ReadVoltage(Channel),

    /// Read the measured output current of a channel
    ReadCurrent(Channel),

    /// Switch a channel between disabled and standard mode
    SetChannelMode {
        /// Target channel
        channel: Channel,
        /// Requested mode
        mode: ChannelMode,
    },
}

impl Command {
    /// Wire code of the command (one byte)
    pub fn code(&self) -> u8 {
        match self {
            Command::Connect => 0x00,
            Command::SetVoltage { .. } => 0x01,
            Command::ReadVoltage(_) => 0x02,
            Command::ReadCurrent(_) => 0x03,
            Command::SetChannelMode { .. } => 0x04,
        }
    }

    /// Payload bytes of the command
    ///
    /// Multi-byte payload fields are big-endian on the wire.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::Connect => Vec::new(),
            Command::SetVoltage {
                channel,
                millivolts,
            } => {
                let mut mv = [0u8; 2];
                BigEndian::write_u16(&mut mv, *millivolts);
                vec![channel.index(), mv[0], mv[1]]
            }
            Command::ReadVoltage(channel) => vec![channel.index()],
            Command::ReadCurrent(channel) => vec![channel.index()],
            Command::SetChannelMode { channel, mode } => {
                vec![channel.index(), mode.wire_byte()]
            }
        }
    }

    /// The kind of response the device answers this command with
    pub fn response_kind(&self) -> ResponseKind {
        match self {
            Command::Connect => ResponseKind::Ack,
            Command::SetVoltage { .. } => ResponseKind::Ack,
            Command::ReadVoltage(_) => ResponseKind::Voltage,
            Command::ReadCurrent(_) => ResponseKind::Current,
            Command::SetChannelMode { .. } => ResponseKind::Ack,
        }
    }

    /// True for the connection handshake command
    ///
    /// The engine lets this command through while disconnected; everything
    /// else is dropped until a handshake succeeds.
    pub fn is_connect(&self) -> bool {
        matches!(self, Command::Connect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_channel_wire_index() {
        assert_eq!(Channel::Ch0.index(), 0);
        assert_eq!(Channel::Ch1.index(), 1);
        assert_eq!(Channel::from_index(0), Some(Channel::Ch0));
        assert_eq!(Channel::from_index(1), Some(Channel::Ch1));
        assert_eq!(Channel::from_index(2), None);
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::Connect.code(), 0x00);
        assert_eq!(
            Command::SetVoltage {
                channel: Channel::Ch0,
                millivolts: 0
            }
            .code(),
            0x01
        );
        assert_eq!(Command::ReadVoltage(Channel::Ch0).code(), 0x02);
        assert_eq!(Command::ReadCurrent(Channel::Ch0).code(), 0x03);
        assert_eq!(
            Command::SetChannelMode {
                channel: Channel::Ch0,
                mode: ChannelMode::Disabled
            }
            .code(),
            0x04
        );
    }

    #[test]
    fn test_set_voltage_payload_is_big_endian() {
        let cmd = Command::SetVoltage {
            channel: Channel::Ch1,
            millivolts: 5000,
        };
        assert_eq!(cmd.payload(), vec![0x01, 0x13, 0x88]);
    }

    #[test]
    fn test_set_voltage_payload_boundaries() {
        let zero = Command::SetVoltage {
            channel: Channel::Ch0,
            millivolts: 0,
        };
        assert_eq!(zero.payload(), vec![0x00, 0x00, 0x00]);

        let max = Command::SetVoltage {
            channel: Channel::Ch0,
            millivolts: 12000,
        };
        assert_eq!(max.payload(), vec![0x00, 0x2E, 0xE0]);
    }

    #[test]
    fn test_read_payloads_carry_channel_only() {
        assert_eq!(Command::ReadVoltage(Channel::Ch1).payload(), vec![0x01]);
        assert_eq!(Command::ReadCurrent(Channel::Ch0).payload(), vec![0x00]);
    }

    #[test]
    fn test_connect_payload_empty() {
        assert!(Command::Connect.payload().is_empty());
        assert!(Command::Connect.is_connect());
    }

    #[test]
    fn test_mode_wire_bytes() {
        assert_eq!(ChannelMode::Disabled.wire_byte(), 0x00);
        assert_eq!(ChannelMode::Standard.wire_byte(), 0x01);
        let cmd = Command::SetChannelMode {
            channel: Channel::Ch1,
            mode: ChannelMode::Standard,
        };
        assert_eq!(cmd.payload(), vec![0x01, 0x01]);
    }

    #[test]
    fn test_expected_response_kinds() {
        assert_eq!(Command::Connect.response_kind(), ResponseKind::Ack);
        assert_eq!(
            Command::ReadVoltage(Channel::Ch0).response_kind(),
            ResponseKind::Voltage
        );
        assert_eq!(
            Command::ReadCurrent(Channel::Ch1).response_kind(),
            ResponseKind::Current
        );
    }
}
