// src/common/crc.rs

use super::error::BusError;
use crc::{Algorithm, Crc};

/// CRC algorithm used on both ends of every SmartBus link (CRC-8/MAXIM-DOW).
/// Polynomial: 0x31 (x^8 + x^5 + x^4 + 1)
/// Initial Value: 0x00
/// Input Reflected: true
/// Output Reflected: true
/// Final XOR: 0x00
/// Check Value: 0xA1 (for "123456789")
/// Residue: 0x00
pub const SMARTBUS_CRC: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0x00,
    refin: true,
    refout: true,
    xorout: 0x00,
    check: 0xA1,
    residue: 0x00,
};

// Create a Crc instance for the SmartBus algorithm for reuse.
const CRC_COMPUTER: Crc<u8> = Crc::<u8>::new(&SMARTBUS_CRC);

/// Calculates the SmartBus CRC8 for the given data buffer.
///
/// Used for both the RS-485 frame header (over its first seven bytes) and the
/// payload that follows it. The function is pure: the same bytes always
/// yield the same checksum.
#[inline]
pub fn crc8(data: &[u8]) -> u8 {
    CRC_COMPUTER.checksum(data)
}

/// Verifies that `data` hashes to `expected`.
///
/// # Returns
///
/// * `Ok(())` if the CRC is valid.
/// * `Err(BusError::CrcMismatch)` carrying both values otherwise.
pub fn verify_crc8(data: &[u8], expected: u8) -> Result<(), BusError> {
    let calculated = crc8(data);
    if calculated == expected {
        Ok(())
    } else {
        Err(BusError::CrcMismatch { expected, calculated })
    }
}
