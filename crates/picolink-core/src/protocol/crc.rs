//! CRC-8 checksum
//!
//! The sole integrity mechanism of the wire format: CRC-8 with polynomial
//! 0x07, initial value 0x00, no input/output reflection and no final XOR.
//! Both sides compute it over the full frame with the CRC byte zeroed.

/// Compute the CRC-8 checksum of a byte buffer.
///
/// Defined for any input length; the empty buffer yields 0.
pub fn compute_crc(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        // Polynomial division, one bit at a time
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x07; // x^8 + x^2 + x + 1
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
