//! Serial Protocol Communication
//!
//! Implements the voltsource framed serial protocol and the background
//! connection engine that drives it.
//!
//! Requests are framed as `0xDD, code, len, payload, checksum`; responses as
//! `0xEE, len, payload`. A single worker thread owns the open port, retries
//! corrupted exchanges, and fans resolved responses out to registered
//! observers.

pub mod commands;
mod engine;
mod error;
mod frame;
pub mod response;
mod router;
pub mod serial;
mod transport;

pub use commands::{Channel, ChannelMode, Command};
pub use engine::{ConnectionConfig, ConnectionState, Engine};
pub use error::ProtocolError;
pub use frame::{decode, encode, REQUEST_START_BYTE, RESPONSE_START_BYTE};
pub use response::{Response, ResponseKind};
pub use router::{ReadingKey, ReadingKind, ReplyRouter, Sink, StatusSubscription};
pub use serial::{list_ports, open_port, PortInfo};
pub use transport::{SerialTransport, Transport};

/// Default baud rate for device communication
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Per-call response timeout in milliseconds, door-to-door including retries
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Maximum payload length; the frame length field is a single byte
pub const MAX_PAYLOAD_SIZE: usize = 255;
