// src/common/types.rs

use core::cmp::Ordering;

// --- Slot Data Types ---

/// Data types a slot can carry. The discriminant is the `u16` wire code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum DataType {
    /// Temperature (3 bytes).
    Temperature = 0,
    /// Temperature + relative humidity (6 bytes).
    Humidity = 1,
    /// Illuminance, lux (4 bytes).
    Luminosity = 2,
    /// Soil moisture, temperature-shaped (3 bytes).
    SoilMoisture = 3,
    /// Discrete register / small counter (1 byte).
    Byte = 4,
    /// ADC reading or similar (2 bytes).
    Word = 5,
    /// Generic 32-bit value (4 bytes).
    DWord = 6,
}

/// Widest slot payload of any data type.
pub const MAX_SLOT_DATA_LEN: usize = 6;

impl DataType {
    /// Tries to convert a wire code into a DataType.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(DataType::Temperature),
            1 => Some(DataType::Humidity),
            2 => Some(DataType::Luminosity),
            3 => Some(DataType::SoilMoisture),
            4 => Some(DataType::Byte),
            5 => Some(DataType::Word),
            6 => Some(DataType::DWord),
            _ => None,
        }
    }

    /// Wire code of this data type.
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Returns the size in bytes of a value of this data type.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::Word => 2,
            DataType::Temperature | DataType::SoilMoisture => 3,
            DataType::Luminosity | DataType::DWord => 4,
            DataType::Humidity => 6,
        }
    }
}

// --- Temperature ---

/// Fixed-point reading: integer part plus hundredths.
///
/// Comparison uses `value * 100 ± decimal`, where the sign of `value` decides
/// whether the hundredths add or subtract. `{-5, 50}` is therefore -5.50.
#[derive(Debug, Copy, Clone, Default)]
pub struct Temperature {
    pub value: i16,
    pub decimal: u8,
}

/// Soil moisture shares the temperature layout.
pub type SoilMoisture = Temperature;

impl Temperature {
    /// Encoded width.
    pub const SIZE: usize = 3;

    /// Returned by typed accessors when the slot is not temperature-shaped.
    pub const SENTINEL: Temperature = Temperature { value: -1, decimal: 0xFF };

    pub const fn new(value: i16, decimal: u8) -> Self {
        Self { value, decimal }
    }

    /// Signed hundredths.
    pub fn raw(&self) -> i32 {
        let whole = i32::from(self.value) * 100;
        if whole < 0 {
            whole - i32::from(self.decimal)
        } else {
            whole + i32::from(self.decimal)
        }
    }

    pub fn to_le_bytes(self) -> [u8; 3] {
        let v = self.value.to_le_bytes();
        [v[0], v[1], self.decimal]
    }

    pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self {
            value: i16::from_le_bytes([bytes[0], bytes[1]]),
            decimal: bytes[2],
        }
    }
}

impl PartialEq for Temperature {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl Eq for Temperature {}

impl PartialOrd for Temperature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Temperature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw().cmp(&other.raw())
    }
}

// --- Humidity ---

/// Combined temperature and relative humidity reading.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Humidity {
    pub temperature: Temperature,
    pub humidity: Temperature,
}

impl Humidity {
    pub const SIZE: usize = 6;

    pub const SENTINEL: Humidity = Humidity {
        temperature: Temperature::SENTINEL,
        humidity: Temperature::SENTINEL,
    };

    pub fn to_le_bytes(self) -> [u8; 6] {
        let t = self.temperature.to_le_bytes();
        let h = self.humidity.to_le_bytes();
        [t[0], t[1], t[2], h[0], h[1], h[2]]
    }

    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        Self {
            temperature: Temperature::from_le_bytes([bytes[0], bytes[1], bytes[2]]),
            humidity: Temperature::from_le_bytes([bytes[3], bytes[4], bytes[5]]),
        }
    }
}
