//! # picolink Core Library
//!
//! Packet protocol engine for microcontrollers talking over a serial
//! transport (USB CDC or a plain UART).
//!
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding/decoding with an 8-bit CRC integrity check
//! - A blocking receive state machine with command dispatch
//! - Serial port discovery and configuration for USB CDC devices
//! - A byte-channel abstraction so the engine runs over serial, TCP
//!   bridges, or in-memory transports in tests
//!
//! The wire format is a fixed-sentinel frame:
//! `[0xAA][len_hi][len_lo][version][command][payload...][crc][0xBB]`
//! where `len` counts the whole frame and the CRC-8 covers the whole
//! frame with the CRC byte zeroed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use picolink_core::protocol::{Link, SerialChannel};
//!
//! // Open the device's CDC port and drive the link
//! let channel = SerialChannel::open("/dev/ttyACM0", None)?;
//! let mut link = Link::new(channel);
//!
//! link.send_open()?;
//! loop {
//!     link.receive_packet()?;
//! }
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        AckCode, Action, ByteChannel, Command, Link, LinkConfig, LinkState, Packet, ProtocolError,
        Received, SerialChannel,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
