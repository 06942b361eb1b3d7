//! Serial Packet Protocol
//!
//! Implements the picolink framing protocol: self-describing packets with
//! fixed start/end sentinels, a two-byte length field, and a CRC-8 checksum,
//! dispatched by a single-character command byte.

mod channel;
pub mod commands;
mod crc;
mod error;
mod link;
mod packet;
pub mod serial;

pub use channel::{ByteChannel, SerialChannel, TcpChannel};
pub use commands::{AckCode, Command};
pub use crc::compute_crc;
pub use error::ProtocolError;
pub use link::{Action, Link, LinkConfig, LinkState, Received};
pub use packet::Packet;
pub use serial::{clear_buffers, configure_port, list_ports, open_port, PortInfo};

/// Sentinel byte marking the beginning of a frame
pub const START_MARKER: u8 = 0xAA;

/// Sentinel byte terminating a frame
pub const END_MARKER: u8 = 0xBB;

/// Protocol version stamped into every frame; any other received value is a
/// validation error
pub const PROTOCOL_VERSION: u8 = 2;

/// Header size in bytes: start marker, length (2 bytes), version, command
pub const HEADER_SIZE: usize = 5;

/// Fixed per-frame overhead: header plus CRC byte plus end marker
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 2;

/// Largest payload a frame can carry: the two-byte length field counts the
/// whole frame, so payloads beyond this cannot be represented on the wire
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - FRAME_OVERHEAD;

/// Default baud rate for device communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;
