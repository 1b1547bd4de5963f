// src/module/events.rs

use crate::common::{
    address::ModuleId,
    anydata::SlotObserver,
    event::Event,
    timing::EVENT_QUEUE_CAPACITY,
};
use core::cell::RefCell;
use heapless::Deque;
use log::{debug, trace};

/// Events waiting for the controller's next `EventRequest`.
///
/// Registered as the observer of the module's broadcast slots, so it has to
/// work through `&self`. An event equal to one already queued is dropped;
/// when full, the oldest event makes room.
#[derive(Debug)]
pub struct EventQueue {
    module_id: ModuleId,
    events: RefCell<Deque<Event, EVENT_QUEUE_CAPACITY>>,
}

impl EventQueue {
    pub fn new(module_id: ModuleId) -> Self {
        Self {
            module_id,
            events: RefCell::new(Deque::new()),
        }
    }

    pub fn push(&self, event: Event) {
        let mut events = self.events.borrow_mut();
        if events.iter().any(|queued| *queued == event) {
            trace!("event already queued");
            return;
        }
        if events.is_full() {
            debug!("event queue full, dropping oldest");
            events.pop_front();
        }
        // Cannot fail, a slot was freed above.
        let _ = events.push_back(event);
    }

    /// Next event in arrival order.
    pub fn pop(&self) -> Option<Event> {
        self.events.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl SlotObserver for EventQueue {
    fn slot_changed(&self, slot_id: u16) {
        self.push(Event::slot_data_changed(self.module_id, slot_id));
    }
}
