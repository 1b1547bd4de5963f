// src/common/message.rs

//! SmartBus message codec.
//!
//! Every message starts with a 7-byte header:
//! - CONTROLLER ID (4 bytes, LE)
//! - MODULE ID (1 byte, 0xFF = broadcast)
//! - TYPE (2 bytes, LE)
//!
//! followed by a payload whose shape is fixed by the type. Decoding never
//! fails: a buffer too short for the header yields a zeroed `Unknown` message,
//! and payload reads past the end yield defaults. Callers branch on
//! [`Message::kind`] before trusting any payload offset; the typed decoders
//! below do that for them.

use super::address::ModuleId;
use super::anydata::AnyData;
use super::event::{Event, EventType};
use super::wire::{push_le, read_at, WireValue};
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use log::debug;

/// Size of the message header in bytes.
pub const HEADER_SIZE: usize = 4 + 1 + 2;

/// Size of the `OnlineModulesList` bitmask (one bit per module address).
pub const ONLINE_MASK_LEN: usize = 32;

/// Message type codes. The numeric order is part of the wire contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u16)]
pub enum MessageType {
    #[default]
    Unknown = 0,
    Event,
    Scan,
    ScanResponse,
    Ping,
    Pong,
    BroadcastSlotRegister,
    ObserveSlotRegister,
    BroadcastSlotData,
    ObserveSlotData,
    AnyDataBroadcast,
    AnyDataRequest,
    AnyDataResponse,
    EventRequest,
    EventResponse,
    ConfigurationRequest,
    ConfigurationResponse,
    ConfigurationSlotRequest,
    ConfigurationSlotResponse,
    SaveConfigurationSlot,
    ConfigurationSlotSaved,
    RegistrationRequest,
    RegistrationResult,
    OnlineModulesList,
}

impl MessageType {
    /// Every type, indexed by wire code.
    pub const ALL: [MessageType; 24] = [
        MessageType::Unknown,
        MessageType::Event,
        MessageType::Scan,
        MessageType::ScanResponse,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::BroadcastSlotRegister,
        MessageType::ObserveSlotRegister,
        MessageType::BroadcastSlotData,
        MessageType::ObserveSlotData,
        MessageType::AnyDataBroadcast,
        MessageType::AnyDataRequest,
        MessageType::AnyDataResponse,
        MessageType::EventRequest,
        MessageType::EventResponse,
        MessageType::ConfigurationRequest,
        MessageType::ConfigurationResponse,
        MessageType::ConfigurationSlotRequest,
        MessageType::ConfigurationSlotResponse,
        MessageType::SaveConfigurationSlot,
        MessageType::ConfigurationSlotSaved,
        MessageType::RegistrationRequest,
        MessageType::RegistrationResult,
        MessageType::OnlineModulesList,
    ];

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Types whose payload is the slot-data layout.
    pub const fn carries_slot_data(self) -> bool {
        matches!(
            self,
            MessageType::BroadcastSlotData | MessageType::AnyDataBroadcast | MessageType::AnyDataResponse
        )
    }
}

/// Encodes a header followed by `payload`.
pub fn encode(controller_id: u32, module_id: ModuleId, kind: MessageType, payload: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(HEADER_SIZE + payload.len());
    push_le(&mut raw, controller_id);
    raw.push(module_id.as_u8());
    push_le(&mut raw, kind.code());
    raw.extend_from_slice(payload);
    raw
}

/// `ScanResponse` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    pub name: String,
    pub broadcast_slots: u8,
    pub observe_slots: u8,
}

/// Slot-data payload shared by `BroadcastSlotData`, `AnyDataBroadcast` and
/// `AnyDataResponse`. `data_type` stays a raw code so an unknown type can be
/// reported by whoever applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPayload {
    pub slot_id: u16,
    pub data_type: u16,
    pub has_data: bool,
    pub data: Vec<u8>,
}

/// A decoded message. Owns its raw bytes (header included); cloning is a deep copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub controller_id: u32,
    pub module_id: ModuleId,
    pub kind: MessageType,
    raw: Vec<u8>,
}

impl Message {
    /// Builds a message from header fields and a ready payload.
    pub fn new(controller_id: u32, module_id: ModuleId, kind: MessageType, payload: &[u8]) -> Self {
        Self {
            controller_id,
            module_id,
            kind,
            raw: encode(controller_id, module_id, kind, payload),
        }
    }

    /// Parses raw bytes received from a transport.
    ///
    /// Buffers shorter than [`HEADER_SIZE`] yield the zeroed `Unknown` message.
    /// An unrecognised type code keeps the header fields but reads as `Unknown`.
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.len() < HEADER_SIZE {
            debug!("message too short: {} bytes", bytes.len());
            return Self::default();
        }

        let code = read_at::<u16>(bytes, 5);
        let kind = MessageType::from_u16(code).unwrap_or_else(|| {
            debug!("unknown message type {}", code);
            MessageType::Unknown
        });

        Self {
            controller_id: read_at::<u32>(bytes, 0),
            module_id: ModuleId::new(bytes[4]),
            kind,
            raw: bytes.to_vec(),
        }
    }

    /// Full encoded message, header included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Bytes after the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.raw.get(HEADER_SIZE..).unwrap_or(&[])
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.module_id.is_broadcast()
    }

    #[inline]
    pub fn is_event(&self) -> bool {
        self.kind == MessageType::Event
    }

    /// Reads a value at `offset` into the payload, or `T::default()` if the
    /// read would run past the end. Never fails.
    #[inline]
    pub fn get<T: WireValue>(&self, offset: usize) -> T {
        read_at(self.payload(), offset)
    }

    /// `len` payload bytes at `offset`, or an empty slice if out of range.
    pub fn bytes_at(&self, offset: usize, len: usize) -> &[u8] {
        offset
            .checked_add(len)
            .and_then(|end| self.payload().get(offset..end))
            .unwrap_or(&[])
    }

    // --- Builders ---

    pub fn scan(controller_id: u32, module_id: ModuleId) -> Self {
        Self::new(controller_id, module_id, MessageType::Scan, &[])
    }

    /// Names longer than 255 bytes are truncated.
    pub fn scan_response(
        controller_id: u32,
        module_id: ModuleId,
        name: &str,
        broadcast_slots: u8,
        observe_slots: u8,
    ) -> Self {
        let name = &name.as_bytes()[..name.len().min(usize::from(u8::MAX))];
        let mut payload = Vec::with_capacity(name.len() + 3);
        payload.push(name.len() as u8);
        payload.extend_from_slice(name);
        payload.push(broadcast_slots);
        payload.push(observe_slots);
        Self::new(controller_id, module_id, MessageType::ScanResponse, &payload)
    }

    pub fn ping(controller_id: u32, module_id: ModuleId) -> Self {
        Self::new(controller_id, module_id, MessageType::Ping, &[])
    }

    pub fn pong(controller_id: u32, module_id: ModuleId) -> Self {
        Self::new(controller_id, module_id, MessageType::Pong, &[])
    }

    pub fn broadcast_slot_register(controller_id: u32, module_id: ModuleId, slot_index: u8) -> Self {
        Self::new(controller_id, module_id, MessageType::BroadcastSlotRegister, &[slot_index])
    }

    pub fn observe_slot_register(controller_id: u32, module_id: ModuleId, slot_index: u8) -> Self {
        Self::new(controller_id, module_id, MessageType::ObserveSlotRegister, &[slot_index])
    }

    pub fn broadcast_slot_data(controller_id: u32, module_id: ModuleId, slot: &AnyData) -> Self {
        Self::new(controller_id, module_id, MessageType::BroadcastSlotData, &slot_payload(slot))
    }

    /// Frequencies beyond `u32::MAX` milliseconds saturate.
    pub fn observe_slot_data(controller_id: u32, module_id: ModuleId, slot_id: u16, frequency: Duration) -> Self {
        let mut payload = Vec::with_capacity(6);
        push_le(&mut payload, slot_id);
        push_le(&mut payload, u32::try_from(frequency.as_millis()).unwrap_or(u32::MAX));
        Self::new(controller_id, module_id, MessageType::ObserveSlotData, &payload)
    }

    pub fn any_data_broadcast(controller_id: u32, module_id: ModuleId, slot: &AnyData) -> Self {
        Self::new(controller_id, module_id, MessageType::AnyDataBroadcast, &slot_payload(slot))
    }

    pub fn any_data_request(controller_id: u32, module_id: ModuleId, slot_id: u16) -> Self {
        Self::new(controller_id, module_id, MessageType::AnyDataRequest, &slot_id.to_le_bytes())
    }

    pub fn any_data_response(controller_id: u32, module_id: ModuleId, slot: &AnyData) -> Self {
        Self::new(controller_id, module_id, MessageType::AnyDataResponse, &slot_payload(slot))
    }

    pub fn event_request(controller_id: u32, module_id: ModuleId) -> Self {
        Self::new(controller_id, module_id, MessageType::EventRequest, &[])
    }

    /// `hasEvent` is 0 and the trailing fields are absent when `event` is `None`.
    pub fn event_response(controller_id: u32, module_id: ModuleId, event: Option<&Event>) -> Self {
        let mut payload = Vec::new();
        match event {
            Some(e) => {
                payload.push(1);
                push_event(&mut payload, e);
            }
            None => payload.push(0),
        }
        Self::new(controller_id, module_id, MessageType::EventResponse, &payload)
    }

    /// Controller rebroadcast of an event raised by `originator`.
    pub fn event(controller_id: u32, module_id: ModuleId, originator: ModuleId, event: &Event) -> Self {
        let mut payload = Vec::new();
        payload.push(originator.as_u8());
        push_event(&mut payload, event);
        Self::new(controller_id, module_id, MessageType::Event, &payload)
    }

    pub fn registration_request(controller_id: u32) -> Self {
        Self::new(controller_id, ModuleId::BROADCAST, MessageType::RegistrationRequest, &[])
    }

    pub fn registration_result(controller_id: u32, module_id: ModuleId) -> Self {
        Self::new(controller_id, module_id, MessageType::RegistrationResult, &[])
    }

    pub fn online_modules_list<I>(controller_id: u32, module_id: ModuleId, online: I) -> Self
    where
        I: IntoIterator<Item = ModuleId>,
    {
        let mut mask = [0u8; ONLINE_MASK_LEN];
        for id in online {
            let n = usize::from(id.as_u8());
            mask[n / 8] |= 1 << (n % 8);
        }
        Self::new(controller_id, module_id, MessageType::OnlineModulesList, &mask)
    }

    // --- Typed decoders ---

    /// `ScanResponse` payload, `None` for any other type or a truncated payload.
    pub fn scan_info(&self) -> Option<ScanInfo> {
        if self.kind != MessageType::ScanResponse {
            return None;
        }
        let name_len = usize::from(self.get::<u8>(0));
        if self.payload().len() < 1 + name_len + 2 {
            return None;
        }
        Some(ScanInfo {
            name: String::from_utf8_lossy(self.bytes_at(1, name_len)).into_owned(),
            broadcast_slots: self.get::<u8>(1 + name_len),
            observe_slots: self.get::<u8>(2 + name_len),
        })
    }

    /// Slot-data payload of `BroadcastSlotData`, `AnyDataBroadcast` or `AnyDataResponse`.
    pub fn slot_data(&self) -> Option<SlotPayload> {
        if !self.kind.carries_slot_data() || self.payload().len() < 7 {
            return None;
        }
        let data_len = usize::from(self.get::<u16>(5));
        if self.payload().len() < 7 + data_len {
            return None;
        }
        Some(SlotPayload {
            slot_id: self.get::<u16>(0),
            data_type: self.get::<u16>(2),
            has_data: self.get::<u8>(4) != 0,
            data: self.bytes_at(7, data_len).to_vec(),
        })
    }

    /// `(slot_id, frequency)` of an `ObserveSlotData` message.
    pub fn observe_slot(&self) -> Option<(u16, Duration)> {
        if self.kind != MessageType::ObserveSlotData || self.payload().len() < 6 {
            return None;
        }
        Some((
            self.get::<u16>(0),
            Duration::from_millis(u64::from(self.get::<u32>(2))),
        ))
    }

    /// Slot index of a `BroadcastSlotRegister` / `ObserveSlotRegister` request.
    pub fn slot_index(&self) -> Option<u8> {
        match self.kind {
            MessageType::BroadcastSlotRegister | MessageType::ObserveSlotRegister
                if !self.payload().is_empty() =>
            {
                Some(self.get::<u8>(0))
            }
            _ => None,
        }
    }

    /// Slot ID of an `AnyDataRequest`.
    pub fn slot_id(&self) -> Option<u16> {
        if self.kind != MessageType::AnyDataRequest || self.payload().len() < 2 {
            return None;
        }
        Some(self.get::<u16>(0))
    }

    /// Event carried by an `EventResponse`.
    ///
    /// `Some(None)` means the module had nothing to report (or reported an
    /// event code this side does not know), `None` means the message is not a
    /// well-formed `EventResponse`.
    pub fn read_event_response(&self) -> Option<Option<Event>> {
        if self.kind != MessageType::EventResponse || self.payload().is_empty() {
            return None;
        }
        if self.get::<u8>(0) == 0 {
            return Some(None);
        }
        parse_event(self, 1).map(|(_, e)| e)
    }

    /// Originator and event of a controller `Event` message.
    pub fn read_event(&self) -> Option<(ModuleId, Event)> {
        if self.kind != MessageType::Event || self.payload().is_empty() {
            return None;
        }
        let originator = ModuleId::new(self.get::<u8>(0));
        match parse_event(self, 1) {
            Some((_, Some(e))) => Some((originator, e)),
            _ => None,
        }
    }

    /// Modules flagged online in an `OnlineModulesList`.
    pub fn online_modules(&self) -> Option<Vec<ModuleId>> {
        if self.kind != MessageType::OnlineModulesList || self.payload().len() < ONLINE_MASK_LEN {
            return None;
        }
        let mask = self.bytes_at(0, ONLINE_MASK_LEN);
        Some(
            (0..=u8::MAX)
                .filter(|n| mask[usize::from(*n) / 8] & (1 << (n % 8)) != 0)
                .map(ModuleId::new)
                .collect(),
        )
    }
}

fn slot_payload(slot: &AnyData) -> Vec<u8> {
    let data = slot.data();
    let mut payload = Vec::with_capacity(7 + data.len());
    push_le(&mut payload, slot.id());
    push_le(&mut payload, slot.kind().code());
    payload.push(u8::from(slot.has_data()));
    push_le(&mut payload, data.len() as u16);
    payload.extend_from_slice(data);
    payload
}

fn push_event(payload: &mut Vec<u8>, event: &Event) {
    let data = &event.data()[..event.data().len().min(usize::from(u16::MAX))];
    push_le(payload, event.kind().code());
    push_le(payload, data.len() as u16);
    payload.extend_from_slice(data);
}

/// Reads `eventType:u16, dataLen:u16, data` at `offset`. Returns the bytes
/// consumed and the event, which is `None` for an unknown code.
fn parse_event(m: &Message, offset: usize) -> Option<(usize, Option<Event>)> {
    let payload = m.payload();
    if payload.len() < offset + 4 {
        return None;
    }
    let code = m.get::<u16>(offset);
    let data_len = usize::from(m.get::<u16>(offset + 2));
    if payload.len() < offset + 4 + data_len {
        return None;
    }
    let data = m.bytes_at(offset + 4, data_len).to_vec();
    let event = match EventType::from_u16(code) {
        Some(kind) => Some(Event::new(kind, data)),
        None => {
            debug!("unknown event type {}", code);
            None
        }
    };
    Some((4 + data_len, event))
}
