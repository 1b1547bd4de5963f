// src/common/error.rs

use super::types::DataType;

/// Errors surfaced by the SmartBus core.
///
/// None of these are fatal. The link layer logs and drops bad frames, the
/// controller treats a silent address as "not present this pass", and slot
/// accessors degrade to sentinels. The variants exist so the layers that *do*
/// return `Result` can say what went wrong.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BusError {
    /// The serial port reported an error.
    #[error("Serial I/O error")]
    Io,

    /// The RS-485 driver-enable pin could not be switched.
    #[error("Direction pin error")]
    Pin,

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Received CRC does not match calculated CRC.
    #[error("CRC mismatch: expected {expected:#04x}, calculated {calculated:#04x}")]
    CrcMismatch { expected: u8, calculated: u8 },

    /// Frame sync bytes or header checksum are wrong.
    #[error("Invalid frame")]
    InvalidFrame,

    /// Payload does not fit the frame's 16-bit length field.
    #[error("Payload too large: {len} bytes")]
    PayloadTooLarge { len: usize },

    /// Slot data of one type was offered to a slot of another.
    #[error("Slot type mismatch: slot is {expected:?}, data is {got:?}")]
    TypeMismatch { expected: DataType, got: DataType },

    /// Slot data has the wrong width for the slot type.
    #[error("Slot data length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Wire code does not name a known data type.
    #[error("Unknown data type code: {0}")]
    UnknownDataType(u16),
}
