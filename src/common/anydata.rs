// src/common/anydata.rs

use super::error::BusError;
use super::message::SlotPayload;
use super::types::{DataType, Humidity, Temperature, MAX_SLOT_DATA_LEN};
use alloc::rc::Rc;
use arrayvec::ArrayVec;
use core::fmt;
use core::time::Duration;
use log::{debug, warn};

/// Receives change notifications from the slots it is registered on.
///
/// Called synchronously from inside the setter, so implementations must not
/// try to borrow the slot back.
pub trait SlotObserver {
    fn slot_changed(&self, slot_id: u16);
}

/// A typed, fixed-width slot value with change tracking.
///
/// The slot's [`DataType`] is fixed at construction. Typed setters silently
/// refuse values of another type and typed getters return an all-ones
/// sentinel instead. A setter that stores new content marks the slot as
/// triggered and notifies the observer; storing identical content is a no-op.
pub struct AnyData {
    kind: DataType,
    id: u16,
    data: ArrayVec<u8, MAX_SLOT_DATA_LEN>,
    has_data: bool,
    triggered: bool,
    observer: Option<Rc<dyn SlotObserver>>,
}

impl AnyData {
    pub fn new(kind: DataType, id: u16) -> Self {
        let mut data = ArrayVec::new();
        data.extend(core::iter::repeat(0).take(kind.size_in_bytes()));
        Self {
            kind,
            id,
            data,
            has_data: false,
            triggered: false,
            observer: None,
        }
    }

    /// Builds a slot mirror from a received slot-data payload.
    pub fn from_payload(payload: &SlotPayload) -> Result<Self, BusError> {
        let kind = DataType::from_u16(payload.data_type).ok_or(BusError::UnknownDataType(payload.data_type))?;
        let mut slot = Self::new(kind, payload.slot_id);
        slot.apply(payload)?;
        Ok(slot)
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> DataType {
        self.kind
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// Raw value bytes, always `kind().size_in_bytes()` long.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_observer(&mut self, observer: Option<Rc<dyn SlotObserver>>) {
        self.observer = observer;
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn clear_trigger(&mut self) {
        self.triggered = false;
    }

    /// Drops the current value. Triggers and notifies only if the slot had data.
    pub fn reset(&mut self) {
        if !self.has_data {
            return;
        }
        self.has_data = false;
        self.triggered = true;
        self.propagate();
    }

    // --- Typed setters ---

    pub fn set_byte(&mut self, value: u8) {
        if self.accepts(&[DataType::Byte]) {
            self.store(&[value]);
        }
    }

    pub fn set_word(&mut self, value: u16) {
        if self.accepts(&[DataType::Word]) {
            self.store(&value.to_le_bytes());
        }
    }

    /// Accepts `DWord` and `Luminosity` slots.
    pub fn set_dword(&mut self, value: u32) {
        if self.accepts(&[DataType::DWord, DataType::Luminosity]) {
            self.store(&value.to_le_bytes());
        }
    }

    /// Accepts `Temperature` and `SoilMoisture` slots.
    pub fn set_temperature(&mut self, value: Temperature) {
        if self.accepts(&[DataType::Temperature, DataType::SoilMoisture]) {
            self.store(&value.to_le_bytes());
        }
    }

    pub fn set_humidity(&mut self, value: Humidity) {
        if self.accepts(&[DataType::Humidity]) {
            self.store(&value.to_le_bytes());
        }
    }

    // --- Typed getters ---

    pub fn as_byte(&self) -> u8 {
        match self.kind {
            DataType::Byte => self.data[0],
            _ => u8::MAX,
        }
    }

    pub fn as_word(&self) -> u16 {
        match self.kind {
            DataType::Word => u16::from_le_bytes([self.data[0], self.data[1]]),
            _ => u16::MAX,
        }
    }

    pub fn as_dword(&self) -> u32 {
        match self.kind {
            DataType::DWord | DataType::Luminosity => {
                u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
            }
            _ => u32::MAX,
        }
    }

    pub fn as_temperature(&self) -> Temperature {
        match self.kind {
            DataType::Temperature | DataType::SoilMoisture => {
                Temperature::from_le_bytes([self.data[0], self.data[1], self.data[2]])
            }
            _ => Temperature::SENTINEL,
        }
    }

    pub fn as_humidity(&self) -> Humidity {
        match self.kind {
            DataType::Humidity => {
                let mut raw = [0u8; Humidity::SIZE];
                raw.copy_from_slice(&self.data);
                Humidity::from_le_bytes(raw)
            }
            _ => Humidity::SENTINEL,
        }
    }

    /// Stores bytes received from the bus.
    ///
    /// Type or width mismatches are rejected and leave the slot untouched.
    /// Changed content raises the trigger but does not notify the observer.
    pub fn set_raw(&mut self, kind: DataType, bytes: &[u8]) -> Result<(), BusError> {
        if kind != self.kind {
            warn!("slot {}: refusing {:?} data for {:?} slot", self.id, kind, self.kind);
            return Err(BusError::TypeMismatch { expected: self.kind, got: kind });
        }
        if bytes.len() != self.data.len() {
            warn!("slot {}: expected {} bytes, got {}", self.id, self.data.len(), bytes.len());
            return Err(BusError::LengthMismatch { expected: self.data.len(), got: bytes.len() });
        }

        let changed = !self.has_data || self.data.as_slice() != bytes;
        self.data.copy_from_slice(bytes);
        self.has_data = true;
        if changed {
            self.triggered = true;
        }
        Ok(())
    }

    /// Applies a received slot-data payload: data when `has_data`, reset otherwise.
    pub fn apply(&mut self, payload: &SlotPayload) -> Result<(), BusError> {
        if payload.slot_id != self.id {
            debug!("slot {}: payload is for slot {}", self.id, payload.slot_id);
        }
        let kind = DataType::from_u16(payload.data_type).ok_or(BusError::UnknownDataType(payload.data_type))?;
        if payload.has_data {
            self.set_raw(kind, &payload.data)
        } else if kind != self.kind {
            Err(BusError::TypeMismatch { expected: self.kind, got: kind })
        } else {
            self.reset();
            Ok(())
        }
    }

    fn accepts(&self, kinds: &[DataType]) -> bool {
        let ok = kinds.contains(&self.kind);
        if !ok {
            debug!("slot {}: {:?} slot cannot hold {:?}", self.id, self.kind, kinds[0]);
        }
        ok
    }

    fn store(&mut self, bytes: &[u8]) {
        if self.has_data && self.data.as_slice() == bytes {
            return;
        }
        self.data.copy_from_slice(bytes);
        self.has_data = true;
        self.triggered = true;
        self.propagate();
    }

    fn propagate(&self) {
        if let Some(observer) = &self.observer {
            observer.slot_changed(self.id);
        }
    }
}

impl fmt::Debug for AnyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyData")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("data", &self.data.as_slice())
            .field("has_data", &self.has_data)
            .field("triggered", &self.triggered)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

// --- Observe-slot timer ---

/// An observe slot: a mirror of someone else's data, refreshed by the
/// controller at `frequency`. When no data arrives within `timeout` the value
/// is reset. A `None` timeout never expires.
#[derive(Debug)]
pub struct AnyDataTimer {
    pub data: AnyData,
    last_data_at: Option<Duration>,
    timeout: Option<Duration>,
    frequency: Duration,
}

impl AnyDataTimer {
    pub fn new(data: AnyData, frequency: Duration, timeout: Option<Duration>) -> Self {
        Self {
            data,
            last_data_at: None,
            timeout,
            frequency,
        }
    }

    #[inline]
    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Stores fresh data and restarts the timeout.
    pub fn feed(&mut self, kind: DataType, bytes: &[u8], now: Duration) -> Result<(), BusError> {
        self.data.set_raw(kind, bytes)?;
        self.last_data_at = Some(now);
        Ok(())
    }

    /// Resets the value if the timeout elapsed. Returns `true` when it did.
    pub fn check(&mut self, now: Duration) -> bool {
        match (self.last_data_at, self.timeout) {
            (Some(last), Some(timeout)) if now.saturating_sub(last) > timeout => {
                debug!("observe slot {}: no data for {:?}", self.data.id(), timeout);
                self.data.reset();
                self.last_data_at = None;
                true
            }
            _ => false,
        }
    }
}
