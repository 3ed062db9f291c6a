//! # voltsource Core Library
//!
//! Host-side communication engine for the voltsource dual-channel bench
//! power supply.
//!
//! This library provides:
//! - The framed serial wire protocol (encode/decode with checksum)
//! - Typed commands and responses (voltage, current, channel mode)
//! - A background connection engine with retry/timeout handling
//! - Observer-based delivery of readings and connection status
//!
//! ## Example
//!
//! ```rust,ignore
//! use voltsource_core::protocol::{Channel, Command, Engine, ConnectionConfig};
//!
//! let engine = Engine::new(ConnectionConfig::default());
//! engine.connect("/dev/ttyUSB0");
//!
//! // Poll channel 0 once the status observer reports a connection
//! engine.send(Command::ReadVoltage(Channel::Ch0), None);
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        Channel, ChannelMode, Command, ConnectionConfig, ConnectionState, Engine, ProtocolError,
        ReadingKey, ReadingKind, Response, Sink,
    };
}
