// src/controller/roster.rs

use crate::common::{
    address::ModuleId,
    anydata::AnyData,
    error::BusError,
    message::{ScanInfo, SlotPayload},
};
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

/// A module's subscription to someone else's broadcast slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveSubscription {
    pub slot_id: u16,
    /// Minimum time between two deliveries.
    pub frequency: Duration,
    last_sent: Option<Duration>,
}

impl ObserveSubscription {
    pub fn new(slot_id: u16, frequency: Duration) -> Self {
        Self {
            slot_id,
            frequency,
            last_sent: None,
        }
    }

    pub fn is_due(&self, now: Duration) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.frequency,
        }
    }

    pub(super) fn mark_sent(&mut self, now: Duration) {
        self.last_sent = Some(now);
    }
}

/// Controller-side record of an online module.
#[derive(Debug)]
pub struct ModuleInfo {
    module_id: ModuleId,
    transport: usize,
    name: String,
    broadcast_slot_count: u8,
    observe_slot_count: u8,
    broadcast_slots: Vec<AnyData>,
    observe_slots: Vec<ObserveSubscription>,
    missed_answers: u8,
}

impl ModuleInfo {
    pub fn new(module_id: ModuleId, transport: usize, info: ScanInfo) -> Self {
        Self {
            module_id,
            transport,
            name: info.name,
            broadcast_slot_count: info.broadcast_slots,
            observe_slot_count: info.observe_slots,
            broadcast_slots: Vec::new(),
            observe_slots: Vec::new(),
            missed_answers: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> ModuleId {
        self.module_id
    }

    /// Index of the transport the module answered on.
    #[inline]
    pub fn transport(&self) -> usize {
        self.transport
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Broadcast slots the module declared in its scan response.
    #[inline]
    pub fn broadcast_slot_count(&self) -> u8 {
        self.broadcast_slot_count
    }

    /// Observe slots the module declared in its scan response.
    #[inline]
    pub fn observe_slot_count(&self) -> u8 {
        self.observe_slot_count
    }

    /// Mirrors of the module's broadcast slots, filled during slot negotiation.
    pub fn broadcast_slots(&self) -> &[AnyData] {
        &self.broadcast_slots
    }

    pub fn observe_slots(&self) -> &[ObserveSubscription] {
        &self.observe_slots
    }

    pub fn broadcast_slot(&self, slot_id: u16) -> Option<&AnyData> {
        self.broadcast_slots.iter().find(|s| s.id() == slot_id)
    }

    #[inline]
    pub fn missed_answers(&self) -> u8 {
        self.missed_answers
    }

    /// Updates the mirror of a broadcast slot, creating it on first sight.
    pub fn store_slot(&mut self, payload: &SlotPayload) -> Result<(), BusError> {
        match self.broadcast_slots.iter_mut().find(|s| s.id() == payload.slot_id) {
            Some(slot) => slot.apply(payload),
            None => {
                self.broadcast_slots.push(AnyData::from_payload(payload)?);
                Ok(())
            }
        }
    }

    /// Adds a subscription, replacing an earlier one for the same slot.
    pub fn subscribe(&mut self, subscription: ObserveSubscription) {
        match self.observe_slots.iter_mut().find(|s| s.slot_id == subscription.slot_id) {
            Some(existing) => *existing = subscription,
            None => self.observe_slots.push(subscription),
        }
    }

    pub(super) fn due_subscription(&self, now: Duration) -> Option<usize> {
        self.observe_slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_due(now))
            .min_by_key(|(_, s)| s.last_sent)
            .map(|(i, _)| i)
    }

    pub(super) fn subscription_mut(&mut self, index: usize) -> Option<&mut ObserveSubscription> {
        self.observe_slots.get_mut(index)
    }

    pub(super) fn record_answer(&mut self) {
        self.missed_answers = 0;
    }

    /// Counts one unanswered poll, returning the running total.
    pub(super) fn record_miss(&mut self) -> u8 {
        self.missed_answers = self.missed_answers.saturating_add(1);
        self.missed_answers
    }
}

/// Online modules, in discovery order. Rebuilt by every scan.
#[derive(Debug, Default)]
pub struct Roster {
    modules: Vec<ModuleInfo>,
}

impl Roster {
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn push(&mut self, module: ModuleInfo) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModuleInfo> {
        self.modules.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ModuleInfo> {
        self.modules.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> ModuleInfo {
        self.modules.remove(index)
    }

    pub fn as_slice(&self) -> &[ModuleInfo] {
        &self.modules
    }

    /// Looks up a broadcast slot mirror on any module.
    pub fn find_broadcast_slot(&self, slot_id: u16) -> Option<&AnyData> {
        self.modules.iter().find_map(|m| m.broadcast_slot(slot_id))
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::DataType;
    use alloc::vec;

    fn info(name: &str, broadcast: u8, observe: u8) -> ScanInfo {
        ScanInfo {
            name: name.into(),
            broadcast_slots: broadcast,
            observe_slots: observe,
        }
    }

    fn byte_payload(slot_id: u16, value: u8) -> SlotPayload {
        SlotPayload {
            slot_id,
            data_type: DataType::Byte.code(),
            has_data: true,
            data: vec![value],
        }
    }

    #[test]
    fn test_store_slot_creates_then_updates() {
        let mut module = ModuleInfo::new(ModuleId::new(1), 0, info("S1", 1, 0));
        module.store_slot(&byte_payload(10, 1)).unwrap();
        module.store_slot(&byte_payload(10, 2)).unwrap();

        assert_eq!(module.broadcast_slots().len(), 1);
        assert_eq!(module.broadcast_slot(10).unwrap().as_byte(), 2);
    }

    #[test]
    fn test_store_slot_rejects_type_change() {
        let mut module = ModuleInfo::new(ModuleId::new(1), 0, info("S1", 1, 0));
        module.store_slot(&byte_payload(10, 1)).unwrap();
        let word = SlotPayload {
            data_type: DataType::Word.code(),
            data: vec![1, 2],
            ..byte_payload(10, 0)
        };
        assert!(module.store_slot(&word).is_err());
        assert_eq!(module.broadcast_slot(10).unwrap().as_byte(), 1);
    }

    #[test]
    fn test_subscription_due() {
        let mut sub = ObserveSubscription::new(5, Duration::from_millis(100));
        assert!(sub.is_due(Duration::ZERO));
        sub.mark_sent(Duration::from_millis(10));
        assert!(!sub.is_due(Duration::from_millis(109)));
        assert!(sub.is_due(Duration::from_millis(110)));
    }

    #[test]
    fn test_longest_waiting_subscription_goes_first() {
        let mut module = ModuleInfo::new(ModuleId::new(1), 0, info("S1", 0, 2));
        module.subscribe(ObserveSubscription::new(5, Duration::ZERO));
        module.subscribe(ObserveSubscription::new(6, Duration::ZERO));

        let now = Duration::from_millis(10);
        assert_eq!(module.due_subscription(now), Some(0));
        module.subscription_mut(0).unwrap().mark_sent(now);
        assert_eq!(module.due_subscription(now), Some(1));
        module.subscription_mut(1).unwrap().mark_sent(now + Duration::from_millis(1));
        assert_eq!(module.due_subscription(now + Duration::from_millis(2)), Some(0));
    }

    #[test]
    fn test_subscribe_replaces() {
        let mut module = ModuleInfo::new(ModuleId::new(1), 0, info("S1", 0, 1));
        module.subscribe(ObserveSubscription::new(5, Duration::from_millis(100)));
        module.subscribe(ObserveSubscription::new(5, Duration::from_millis(200)));
        assert_eq!(module.observe_slots().len(), 1);
        assert_eq!(module.observe_slots()[0].frequency, Duration::from_millis(200));
    }

    #[test]
    fn test_missed_answers() {
        let mut module = ModuleInfo::new(ModuleId::new(1), 0, info("S1", 0, 0));
        assert_eq!(module.record_miss(), 1);
        assert_eq!(module.record_miss(), 2);
        module.record_answer();
        assert_eq!(module.missed_answers(), 0);
    }

    #[test]
    fn test_find_broadcast_slot_across_modules() {
        let mut roster = Roster::default();
        let mut a = ModuleInfo::new(ModuleId::new(1), 0, info("A", 1, 0));
        a.store_slot(&byte_payload(10, 1)).unwrap();
        let mut b = ModuleInfo::new(ModuleId::new(2), 0, info("B", 1, 0));
        b.store_slot(&byte_payload(20, 2)).unwrap();
        roster.push(a);
        roster.push(b);

        assert_eq!(roster.find_broadcast_slot(20).unwrap().as_byte(), 2);
        assert!(roster.find_broadcast_slot(30).is_none());
        roster.clear();
        assert!(roster.is_empty());
    }
}
