//! Neptun frame checksum
//!
//! The controller uses the CRC16-CCITT "FALSE" variant:
//! 1. Polynomial 0x1021, initial value 0xFFFF
//! 2. Bytes fed MSB first, no input or output reflection
//! 3. No final XOR
//!
//! The checksum covers every byte of the frame before it (preamble included)
//! and is transmitted high byte first.

use tracing::trace;

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Calculate the CRC16-CCITT of `data`
///
/// # Examples
///
/// ```
/// use neptun_core::checksum;
///
/// assert_eq!(checksum::crc16_ccitt(b"123456789"), 0x29B1);
/// ```
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = INITIAL;

    for &byte in data {
        crc ^= u16::from(byte) << 8;

        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }

    trace!(
        len = data.len(),
        checksum = format!("0x{:04X}", crc),
        "Calculated checksum"
    );

    crc
}

/// Verify checksum
pub fn verify(data: &[u8], expected: u16) -> bool {
    crc16_ccitt(data) == expected
}
