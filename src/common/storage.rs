// src/common/storage.rs

//! Typed values in byte storage.
//!
//! A saved value is laid out as two sentinel bytes followed by the value in
//! little-endian order. A fresh or foreign memory area won't carry the
//! sentinels, which reads back as "nothing saved" instead of garbage.

use super::hal_traits::Storage;
use super::wire::WireValue;
use super::types::MAX_SLOT_DATA_LEN;

/// Bytes written in front of every saved value.
pub const SENTINEL: [u8; 2] = [0x24, 0x19];

/// Storage address of the persisted controller ID.
pub const CONTROLLER_ID_ADDRESS: u16 = 0;

/// Widest value the helpers handle.
const MAX_VALUE_SIZE: usize = MAX_SLOT_DATA_LEN;

/// Reads a sentinel-prefixed `T` at `address`, `None` if nothing was saved there.
pub fn read_value<T: WireValue, S: Storage + ?Sized>(storage: &mut S, address: u16) -> Option<T> {
    for (i, expected) in SENTINEL.iter().enumerate() {
        if storage.read(address.wrapping_add(i as u16)) != *expected {
            return None;
        }
    }

    let mut raw = [0u8; MAX_VALUE_SIZE];
    let start = address.wrapping_add(SENTINEL.len() as u16);
    for (i, byte) in raw[..T::SIZE].iter_mut().enumerate() {
        *byte = storage.read(start.wrapping_add(i as u16));
    }
    Some(T::read_le(&raw[..T::SIZE]))
}

/// Writes `value` at `address`, sentinels first.
pub fn write_value<T: WireValue, S: Storage + ?Sized>(storage: &mut S, address: u16, value: T) {
    let mut raw = [0u8; MAX_VALUE_SIZE];
    value.write_le(&mut raw[..T::SIZE]);

    for (i, byte) in SENTINEL.iter().chain(raw[..T::SIZE].iter()).enumerate() {
        storage.write(address.wrapping_add(i as u16), *byte);
    }
}

/// In-memory storage. Reads past the end return `0xFF` (erased EEPROM),
/// writes past the end are dropped.
impl<const N: usize> Storage for [u8; N] {
    fn read(&mut self, address: u16) -> u8 {
        self.get(usize::from(address)).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, address: u16, value: u8) {
        if let Some(slot) = self.get_mut(usize::from(address)) {
            *slot = value;
        }
    }
}
