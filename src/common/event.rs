// src/common/event.rs

use super::address::ModuleId;
use super::wire::{push_le, read_at};
use alloc::vec::Vec;

/// Event codes. The discriminant is the `u16` wire code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum EventType {
    /// A broadcast slot on the reporting module changed its data.
    SlotDataChanged = 0,
}

impl EventType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(EventType::SlotDataChanged),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// A module-originated notification.
///
/// Events only travel inside an `EventResponse` (module to controller) or an
/// `Event` message (controller rebroadcast). Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventType,
    data: Vec<u8>,
}

impl Event {
    pub fn new(kind: EventType, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// `SlotDataChanged` payload: `module_id:u8, slot_id:u16`.
    pub fn slot_data_changed(module_id: ModuleId, slot_id: u16) -> Self {
        let mut data = Vec::with_capacity(3);
        data.push(module_id.as_u8());
        push_le(&mut data, slot_id);
        Self::new(EventType::SlotDataChanged, data)
    }

    #[inline]
    pub fn kind(&self) -> EventType {
        self.kind
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Module and slot named by a `SlotDataChanged` event.
    pub fn changed_slot(&self) -> Option<(ModuleId, u16)> {
        if self.kind != EventType::SlotDataChanged || self.data.len() < 3 {
            return None;
        }
        Some((ModuleId::new(self.data[0]), read_at::<u16>(&self.data, 1)))
    }
}
