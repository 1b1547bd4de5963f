// src/common/frame.rs

//! RS-485 link frame header.
//!
//! Layout (8 bytes, little-endian length):
//! - STX1, STX2: synchronization bytes
//! - DATA LENGTH (2 bytes): number of payload bytes that follow the header
//! - DATA CRC (1 byte): CRC8 of the payload
//! - ETX1, ETX2: trailing synchronization bytes
//! - PACKET CRC (1 byte): CRC8 of the seven bytes before it
//!
//! The payload is written right after the header and validated separately.

use super::crc::{crc8, verify_crc8};
use super::error::BusError;

/// First header synchronization byte.
pub const STX1: u8 = 0xAB;
/// Second header synchronization byte.
pub const STX2: u8 = 0xBA;
/// First trailing synchronization byte.
pub const ETX1: u8 = 0xDE;
/// Second trailing synchronization byte.
pub const ETX2: u8 = 0xAD;

/// Size of the encoded header in bytes.
pub const FRAME_SIZE: usize = 8;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

const ETX1_POS: usize = 5;
const ETX2_POS: usize = 6;
const PACKET_CRC_POS: usize = 7;

/// A validated RS-485 frame header.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Frame {
    /// Number of payload bytes following the header.
    pub data_length: u16,
    /// CRC8 of the payload.
    pub data_crc: u8,
}

impl Frame {
    /// Builds the header announcing `payload`.
    pub fn for_payload(payload: &[u8]) -> Result<Self, BusError> {
        let data_length = u16::try_from(payload.len())
            .map_err(|_| BusError::PayloadTooLarge { len: payload.len() })?;
        Ok(Self {
            data_length,
            data_crc: crc8(payload),
        })
    }

    /// Encodes the header, computing the packet CRC.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let len = self.data_length.to_le_bytes();
        let mut raw = [STX1, STX2, len[0], len[1], self.data_crc, ETX1, ETX2, 0];
        raw[PACKET_CRC_POS] = crc8(&raw[..PACKET_CRC_POS]);
        raw
    }

    /// Whether `window` starts with the two header sync bytes.
    #[inline]
    pub fn has_sync(window: &[u8]) -> bool {
        window.len() >= 2 && window[0] == STX1 && window[1] == STX2
    }

    /// Parses a full header window.
    ///
    /// Fails with `InvalidFrame` when any sync byte is wrong and with
    /// `CrcMismatch` when the header checksum does not match.
    pub fn parse(window: &[u8; FRAME_SIZE]) -> Result<Self, BusError> {
        if !Self::has_sync(window) || window[ETX1_POS] != ETX1 || window[ETX2_POS] != ETX2 {
            return Err(BusError::InvalidFrame);
        }
        verify_crc8(&window[..PACKET_CRC_POS], window[PACKET_CRC_POS])?;

        Ok(Self {
            data_length: u16::from_le_bytes([window[2], window[3]]),
            data_crc: window[4],
        })
    }

    /// Checks a received payload against the header.
    pub fn verify_payload(&self, payload: &[u8]) -> Result<(), BusError> {
        if payload.len() != usize::from(self.data_length) {
            return Err(BusError::LengthMismatch {
                expected: usize::from(self.data_length),
                got: payload.len(),
            });
        }
        verify_crc8(payload, self.data_crc)
    }
}
