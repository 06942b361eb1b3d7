//! Protocol commands
//!
//! Defines the closed command vocabulary of the packet protocol and the
//! error codes carried by acknowledgment frames.

use serde::{Deserialize, Serialize};

/// Commands recognized by the dispatch state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Open the connection ('o')
    Open,

    /// Close the connection ('c')
    Close,

    /// Carry application data ('d')
    Data,

    /// Acknowledge a frame, payload is a one-byte error code ('a')
    Ack,

    /// Request the payload echoed back ('e')
    Echo,

    /// Run the external diagnostics hook ('t')
    Diagnostics,
}

impl Command {
    /// Get the single-character wire byte for this command
    pub fn wire_byte(&self) -> u8 {
        match self {
            Command::Open => b'o',
            Command::Close => b'c',
            Command::Data => b'd',
            Command::Ack => b'a',
            Command::Echo => b'e',
            Command::Diagnostics => b't',
        }
    }

    /// Decode a wire byte; any byte outside the closed set is unknown
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'o' => Some(Command::Open),
            b'c' => Some(Command::Close),
            b'd' => Some(Command::Data),
            b'a' => Some(Command::Ack),
            b'e' => Some(Command::Echo),
            b't' => Some(Command::Diagnostics),
            _ => None,
        }
    }
}

/// Error codes transmitted as the payload byte of an acknowledgment frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AckCode {
    /// Frame accepted
    NoError = 0,

    /// Checksum verification failed
    Crc = 1,

    /// Protocol version byte did not match
    Version = 2,

    /// End marker missing or incorrect
    Ending = 3,

    /// Command byte outside the recognized set
    Type = 4,

    /// Open requested while already connected
    Opened = 5,

    /// Close requested while already disconnected
    Closed = 6,
}

impl AckCode {
    /// Get the one-byte wire encoding of this code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Decode a received code byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AckCode::NoError),
            1 => Some(AckCode::Crc),
            2 => Some(AckCode::Version),
            3 => Some(AckCode::Ending),
            4 => Some(AckCode::Type),
            5 => Some(AckCode::Opened),
            6 => Some(AckCode::Closed),
            _ => None,
        }
    }

    /// Human-readable description, for logs and the host console
    pub fn describe(&self) -> &'static str {
        match self {
            AckCode::NoError => "success",
            AckCode::Crc => "CRC incorrect",
            AckCode::Version => "version incorrect",
            AckCode::Ending => "ending byte missing",
            AckCode::Type => "type unknown",
            AckCode::Opened => "connection already opened",
            AckCode::Closed => "connection already closed",
        }
    }
}
