//! Packet encoding/decoding
//!
//! Implements the binary frame format with CRC-8 integrity checking.
//!
//! Frame layout:
//! - 1 byte: start marker (0xAA)
//! - 2 bytes: total frame length (big-endian, counts the whole frame)
//! - 1 byte: protocol version
//! - 1 byte: command character
//! - N bytes: payload
//! - 1 byte: CRC-8 (over the whole frame with this byte zeroed)
//! - 1 byte: end marker (0xBB)

use byteorder::{BigEndian, ByteOrder};

use super::{
    compute_crc, Command, ProtocolError, END_MARKER, FRAME_OVERHEAD, HEADER_SIZE,
    PROTOCOL_VERSION, START_MARKER,
};

/// A protocol packet
///
/// Exists only transiently: constructed and serialized on the send side, or
/// parsed and dispatched on the receive side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw command byte; received frames may carry a byte outside the
    /// recognized [`Command`] set
    pub command: u8,
    /// Packet payload
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a new packet for a recognized command
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        Self {
            command: command.wire_byte(),
            payload,
        }
    }

    /// Total encoded frame size: payload plus the fixed overhead
    pub fn encoded_size(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Encode the packet to a complete wire frame.
    ///
    /// The length field is two bytes and counts the whole frame, so the
    /// payload must not exceed [`MAX_PAYLOAD_SIZE`](super::MAX_PAYLOAD_SIZE);
    /// the link's send path enforces this before encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let frame_len = self.encoded_size();
        let mut bytes = Vec::with_capacity(frame_len);

        // Header: start marker, length (big-endian), version, command
        bytes.push(START_MARKER);
        let mut len_bytes = [0u8; 2];
        BigEndian::write_u16(&mut len_bytes, frame_len as u16);
        bytes.extend_from_slice(&len_bytes);
        bytes.push(PROTOCOL_VERSION);
        bytes.push(self.command);

        // Payload
        bytes.extend_from_slice(&self.payload);

        // Footer: CRC placeholder, end marker
        bytes.push(0);
        bytes.push(END_MARKER);

        // Compute the CRC over the assembled frame (placeholder still zero)
        // and patch it into the slot
        let crc = compute_crc(&bytes);
        bytes[frame_len - 2] = crc;

        bytes
    }

    /// Decode a packet from a complete wire frame, validating structure and
    /// checksum.
    ///
    /// This is the strict decoder used host-side and in tests; any
    /// violation is an error. The engine's stream receiver is deliberately
    /// more lenient (it reports and proceeds). The CRC is recomputed over a
    /// copy with the CRC slot zeroed; the input is never mutated.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < FRAME_OVERHEAD {
            return Err(ProtocolError::Truncated {
                expected: FRAME_OVERHEAD,
                actual: data.len(),
            });
        }

        if data[0] != START_MARKER {
            return Err(ProtocolError::BadStartMarker(data[0]));
        }

        let declared_len = BigEndian::read_u16(&data[1..3]);
        if (declared_len as usize) < FRAME_OVERHEAD {
            return Err(ProtocolError::FrameTooShort(declared_len));
        }
        if data.len() < declared_len as usize {
            return Err(ProtocolError::Truncated {
                expected: declared_len as usize,
                actual: data.len(),
            });
        }
        let frame = &data[..declared_len as usize];

        if frame[3] != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: frame[3],
            });
        }

        let end = frame[frame.len() - 1];
        if end != END_MARKER {
            return Err(ProtocolError::BadEndMarker(end));
        }

        // Verify the checksum against a copy with the CRC slot zeroed
        let received_crc = frame[frame.len() - 2];
        let mut check = frame.to_vec();
        check[frame.len() - 2] = 0;
        let expected_crc = compute_crc(&check);

        if received_crc != expected_crc {
            return Err(ProtocolError::CrcMismatch {
                expected: expected_crc,
                actual: received_crc,
            });
        }

        Ok(Self {
            command: frame[4],
            payload: frame[HEADER_SIZE..frame.len() - 2].to_vec(),
        })
    }
}
