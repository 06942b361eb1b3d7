//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
///
/// Validation failures on received frames (bad CRC, wrong version, missing
/// end marker, unknown command) are deliberately *not* errors on the
/// engine's receive path: the link reports them with an acknowledgment
/// frame and keeps going. The variants here cover the transport failing and
/// the strict [`Packet::from_bytes`](super::Packet::from_bytes) decoder.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Read timeout")]
    Timeout,

    #[error("Frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid start marker: {0:#04x}")]
    BadStartMarker(u8),

    #[error("Invalid end marker: {0:#04x}")]
    BadEndMarker(u8),

    #[error("Declared frame length {0} is below the fixed overhead")]
    FrameTooShort(u16),

    #[error("Payload of {0} bytes does not fit the two-byte length field")]
    PayloadTooLarge(usize),

    #[error("CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch { expected: u8, actual: u8 },

    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::CrcMismatch {
            expected: 0xBC,
            actual: 0x12,
        };
        let msg = err.to_string();
        assert!(msg.contains("0xbc"));
        assert!(msg.contains("0x12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: ProtocolError = io.into();
        assert!(matches!(err, ProtocolError::IoError(_)));
    }
}
