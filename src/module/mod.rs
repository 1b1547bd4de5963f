// src/module/mod.rs

//! Bus slave.
//!
//! A [`SmartModule`] never talks first. Each [`SmartModule::update`] polls its
//! transport, handles at most one request addressed to it and answers on the
//! same transport. Changes to its broadcast slots are queued as events until
//! the controller asks for them.

use crate::common::{
    address::ModuleId,
    anydata::{AnyData, AnyDataTimer, SlotObserver},
    error::BusError,
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::{Message, MessageType},
    storage::{read_value, write_value, CONTROLLER_ID_ADDRESS},
    types::DataType,
};
use crate::transport::Transport;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use log::{debug, info, trace, warn};

mod events;

pub use events::EventQueue;

/// Represents a SmartBus module (bus slave).
pub struct SmartModule<T, S, C, H = ()> {
    id: ModuleId,
    name: String,
    controller_id: Option<u32>,
    transport: T,
    storage: S,
    clock: C,
    hooks: H,
    broadcast_slots: Vec<AnyData>,
    observe_slots: Vec<AnyDataTimer>,
    events: Rc<EventQueue>,
    registration_deadline: Option<Duration>,
}

impl<T, S, C, H> SmartModule<T, S, C, H>
where
    T: Transport,
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    pub fn new(name: &str, id: ModuleId, transport: T, storage: S, clock: C, hooks: H) -> Self {
        SmartModule {
            id,
            name: String::from(name),
            controller_id: None,
            transport,
            storage,
            clock,
            hooks,
            broadcast_slots: Vec::new(),
            observe_slots: Vec::new(),
            events: Rc::new(EventQueue::new(id)),
            registration_deadline: None,
        }
    }

    /// Recalls the controller this module was registered with and starts the
    /// transport.
    pub fn begin(&mut self) -> Result<(), BusError> {
        if let Some(saved) = read_value::<u32, _>(&mut self.storage, CONTROLLER_ID_ADDRESS) {
            info!("module {}: bound to controller {}", self.id, saved);
            self.controller_id = Some(saved);
        }
        self.transport.begin()
    }

    /// Binds the module to `controller_id` without a registration exchange.
    pub fn link_to_controller(&mut self, controller_id: u32) {
        self.controller_id = Some(controller_id);
        write_value(&mut self.storage, CONTROLLER_ID_ADDRESS, controller_id);
    }

    /// Declares a slot this module publishes. Its index is the declaration order.
    pub fn broadcast(&mut self, kind: DataType, slot_id: u16) -> &mut AnyData {
        let mut slot = AnyData::new(kind, slot_id);
        slot.set_observer(Some(self.events.clone() as Rc<dyn SlotObserver>));
        self.broadcast_slots.push(slot);
        let last = self.broadcast_slots.len() - 1;
        &mut self.broadcast_slots[last]
    }

    /// Declares a slot of another module this one wants to receive every
    /// `frequency`. With a `timeout`, the value is reset when nothing arrives
    /// for that long.
    pub fn observe(&mut self, kind: DataType, slot_id: u16, frequency: Duration, timeout: Option<Duration>) {
        self.observe_slots
            .push(AnyDataTimer::new(AnyData::new(kind, slot_id), frequency, timeout));
    }

    pub fn slot(&self, slot_id: u16) -> Option<&AnyData> {
        self.broadcast_slots.iter().find(|s| s.id() == slot_id)
    }

    /// Published slot, for the application to store new readings in.
    pub fn slot_mut(&mut self, slot_id: u16) -> Option<&mut AnyData> {
        self.broadcast_slots.iter_mut().find(|s| s.id() == slot_id)
    }

    /// Latest value received for an observed slot.
    pub fn observed(&self, slot_id: u16) -> Option<&AnyData> {
        self.observe_slots.iter().map(|t| &t.data).find(|s| s.id() == slot_id)
    }

    /// Accepts the next `RegistrationRequest` for `timeout`.
    pub fn start_registration(&mut self, timeout: Duration) {
        info!("module {}: registration mode for {:?}", self.id, timeout);
        self.registration_deadline = Some(self.clock.uptime() + timeout);
    }

    pub fn is_registering(&self) -> bool {
        self.registration_deadline.is_some()
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller_id(&self) -> Option<u32> {
        self.controller_id
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn update(&mut self) {
        self.transport.update();

        let now = self.clock.uptime();
        for timer in self.observe_slots.iter_mut() {
            timer.check(now);
        }

        if let Some(deadline) = self.registration_deadline {
            if now >= deadline {
                info!("module {}: registration mode expired", self.id);
                self.registration_deadline = None;
                self.hooks.registration(false);
            }
        }

        let message = match self.transport.read().map(Message::decode) {
            Some(message) => message,
            None => return,
        };
        self.transport.wipe();
        self.handle(message);
    }

    fn handle(&mut self, message: Message) {
        if message.kind == MessageType::RegistrationRequest {
            self.handle_registration(&message);
            return;
        }

        let controller_id = match self.controller_id {
            Some(id) => id,
            None => {
                trace!("module {}: not registered, ignoring {:?}", self.id, message.kind);
                return;
            }
        };
        if message.controller_id != controller_id || !message.module_id.reaches(self.id) {
            return;
        }

        // Broadcast requests are never answered, several modules would talk at once.
        let unicast = message.module_id == self.id;

        match message.kind {
            MessageType::Scan if unicast => {
                let broadcast = u8::try_from(self.broadcast_slots.len()).unwrap_or(u8::MAX);
                let observe = u8::try_from(self.observe_slots.len()).unwrap_or(u8::MAX);
                let reply = Message::scan_response(controller_id, self.id, &self.name, broadcast, observe);
                self.reply(reply);
            }

            MessageType::Ping if unicast => self.reply(Message::pong(controller_id, self.id)),

            MessageType::BroadcastSlotRegister if unicast => {
                let reply = message
                    .slot_index()
                    .and_then(|i| self.broadcast_slots.get(usize::from(i)))
                    .map(|slot| Message::broadcast_slot_data(controller_id, self.id, slot));
                match reply {
                    Some(reply) => self.reply(reply),
                    None => warn!("module {}: no broadcast slot {:?}", self.id, message.slot_index()),
                }
            }

            MessageType::ObserveSlotRegister if unicast => {
                let reply = message
                    .slot_index()
                    .and_then(|i| self.observe_slots.get(usize::from(i)))
                    .map(|t| Message::observe_slot_data(controller_id, self.id, t.data.id(), t.frequency()));
                match reply {
                    Some(reply) => self.reply(reply),
                    None => warn!("module {}: no observe slot {:?}", self.id, message.slot_index()),
                }
            }

            MessageType::AnyDataRequest if unicast => {
                let slot_id = match message.slot_id() {
                    Some(slot_id) => slot_id,
                    None => return,
                };
                let id = self.id;
                let reply = self.slot_mut(slot_id).map(|slot| {
                    slot.clear_trigger();
                    Message::any_data_response(controller_id, id, slot)
                });
                match reply {
                    Some(reply) => self.reply(reply),
                    None => warn!("module {}: no broadcast slot with ID {}", self.id, slot_id),
                }
            }

            MessageType::EventRequest if unicast => {
                let event = self.events.pop();
                self.reply(Message::event_response(controller_id, self.id, event.as_ref()));
            }

            MessageType::AnyDataBroadcast => self.update_observed(&message),

            kind => debug!("module {}: {:?} not handled", self.id, kind),
        }
    }

    fn handle_registration(&mut self, message: &Message) {
        if self.registration_deadline.is_none() {
            trace!("module {}: registration request outside registration mode", self.id);
            return;
        }

        info!("module {}: registered with controller {}", self.id, message.controller_id);
        self.registration_deadline = None;
        self.link_to_controller(message.controller_id);
        self.reply(Message::registration_result(message.controller_id, self.id));
        self.hooks.registration(true);
    }

    fn update_observed(&mut self, message: &Message) {
        let payload = match message.slot_data() {
            Some(payload) => payload,
            None => return,
        };
        let now = self.clock.uptime();
        let timer = match self.observe_slots.iter_mut().find(|t| t.data.id() == payload.slot_id) {
            Some(timer) => timer,
            None => {
                trace!("module {}: slot {} not observed here", self.id, payload.slot_id);
                return;
            }
        };

        let kind = match DataType::from_u16(payload.data_type) {
            Some(kind) => kind,
            None => {
                warn!("module {}: slot {} has unknown type {}", self.id, payload.slot_id, payload.data_type);
                return;
            }
        };

        if !payload.has_data {
            timer.data.reset();
            return;
        }
        if let Err(e) = timer.feed(kind, &payload.data, now) {
            warn!("module {}: observed slot {} rejected: {}", self.id, payload.slot_id, e);
        }
    }

    fn reply(&mut self, message: Message) {
        if let Err(e) = self.transport.write(message.as_bytes()) {
            warn!("module {}: sending {:?} failed: {}", self.id, message.kind, e);
        }
    }
}
