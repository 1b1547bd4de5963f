// src/controller/mod.rs

//! Bus master.
//!
//! The controller owns the transports and drives every exchange on the bus.
//! Work happens in [`Controller::update`], which polls each transport and
//! then advances the state machine by exactly one step:
//!
//! ```text
//! Scan ──► AskSlots ──► Normal ◄──► Registration
//!  ▲                      │
//!  └──────── scan() ──────┘
//! ```

use crate::common::{
    address::ModuleId,
    anydata::AnyData,
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::Message,
    storage::{read_value, write_value, CONTROLLER_ID_ADDRESS},
};
use crate::transport::Transport;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use log::{debug, info, warn};

mod normal;
mod registration;
pub mod roster;
mod scan;
mod slots;

pub use roster::{ModuleInfo, ObserveSubscription, Roster};

/// Coarse controller state, for callers that want to know what the bus is doing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControllerMode {
    Idle,
    Scan,
    AskSlots,
    Normal,
    Registration,
}

/// Request/response pair on one transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RoundTrip {
    Send,
    Wait { started: Duration, timeout: Duration },
}

/// Scan inner state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScanStep {
    AskModule,
    WaitForModuleAnswer { started: Duration, timeout: Duration },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ScanCursor {
    transport: usize,
    module: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SlotKind {
    Broadcast,
    Observe,
}

/// Position in slot negotiation: roster index, slot family, slot index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct SlotCursor {
    module: usize,
    kind: SlotKind,
    index: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PollStep {
    Idle,
    WaitForEvent { started: Duration, timeout: Duration },
    WaitForSlotData { slot_id: u16, started: Duration, timeout: Duration },
}

/// Normal-mode cursor: roster index being polled and what we wait for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Poll {
    module: usize,
    step: PollStep,
}

impl Poll {
    const START: Poll = Poll {
        module: 0,
        step: PollStep::Idle,
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ControllerState {
    Idle,
    Scan { cursor: ScanCursor, step: ScanStep },
    AskSlots { cursor: SlotCursor, step: RoundTrip },
    Normal(Poll),
    Registration { transport: usize, step: RoundTrip, deadline: Duration },
}

/// Outcome of checking a transport for the answer to a request.
enum Reply {
    Pending,
    TimedOut,
    Received(Message),
}

/// Represents a SmartBus controller (bus master).
pub struct Controller<'a, S, C, H = ()> {
    id: u32,
    name: String,
    storage: S,
    clock: C,
    hooks: H,
    transports: Vec<Box<dyn Transport + 'a>>,
    roster: Roster,
    max_modules: u8,
    state: ControllerState,
}

impl<'a, S, C, H> Controller<'a, S, C, H>
where
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    pub fn new(id: u32, name: &str, storage: S, clock: C, hooks: H) -> Self {
        Controller {
            id,
            name: String::from(name),
            storage,
            clock,
            hooks,
            transports: Vec::new(),
            roster: Roster::default(),
            max_modules: ModuleId::MAX_UNICAST + 1,
            state: ControllerState::Idle,
        }
    }

    pub fn add_transport<T: Transport + 'a>(&mut self, transport: T) {
        self.transports.push(Box::new(transport));
    }

    /// Recalls a saved controller ID, starts the transports and begins a scan
    /// of addresses `0..max_modules` on each of them.
    pub fn begin(&mut self, max_modules: u8) {
        self.max_modules = max_modules;

        if let Some(saved) = read_value::<u32, _>(&mut self.storage, CONTROLLER_ID_ADDRESS) {
            info!("controller: saved ID {}", saved);
            self.id = saved;
        }

        for (index, transport) in self.transports.iter_mut().enumerate() {
            if let Err(e) = transport.begin() {
                warn!("controller: transport #{} failed to start: {}", index, e);
            }
        }

        self.scan();
    }

    /// Polls every transport, then advances the state machine one step.
    pub fn update(&mut self) {
        for transport in self.transports.iter_mut() {
            transport.update();
        }

        let state = self.state;
        self.state = match state {
            ControllerState::Idle => ControllerState::Idle,
            ControllerState::Scan { cursor, step } => self.update_scan(cursor, step),
            ControllerState::AskSlots { cursor, step } => self.update_ask_slots(cursor, step),
            ControllerState::Normal(poll) => self.update_normal(poll),
            ControllerState::Registration {
                transport,
                step,
                deadline,
            } => self.update_registration(transport, step, deadline),
        };
    }

    /// Drops the roster and starts discovery from the first address of the
    /// first transport. Safe to call at any time.
    pub fn scan(&mut self) {
        self.state = self.start_scan();
    }

    /// Sets and persists a new controller ID.
    pub fn set_id(&mut self, id: u32) {
        self.id = id;
        write_value(&mut self.storage, CONTROLLER_ID_ADDRESS, id);
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ControllerMode {
        match self.state {
            ControllerState::Idle => ControllerMode::Idle,
            ControllerState::Scan { .. } => ControllerMode::Scan,
            ControllerState::AskSlots { .. } => ControllerMode::AskSlots,
            ControllerState::Normal(_) => ControllerMode::Normal,
            ControllerState::Registration { .. } => ControllerMode::Registration,
        }
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        self.roster.as_slice()
    }

    pub fn module_count(&self) -> usize {
        self.roster.len()
    }

    pub fn module(&self, index: usize) -> Option<&ModuleInfo> {
        self.roster.get(index)
    }

    /// Latest known value of a broadcast slot on any module.
    pub fn find_broadcast_slot(&self, slot_id: u16) -> Option<&AnyData> {
        self.roster.find_broadcast_slot(slot_id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    // --- Round-trip helpers ---

    /// Sends a request after discarding any stale packet. Returns the start
    /// time and how long to wait for the answer.
    fn send(&mut self, transport: usize, message: &Message) -> (Duration, Duration) {
        let started = self.clock.uptime();
        let link = &mut self.transports[transport];
        link.wipe();
        if let Err(e) = link.write(message.as_bytes()) {
            warn!("controller: sending {:?} on transport #{} failed: {}", message.kind, transport, e);
        }
        (started, link.reading_timeout())
    }

    /// Checks for the answer to a request sent at `started`.
    fn poll_reply(&mut self, transport: usize, started: Duration, timeout: Duration) -> Reply {
        if self.clock.uptime().saturating_sub(started) >= timeout {
            return Reply::TimedOut;
        }

        let link = &mut self.transports[transport];
        match link.read().map(Message::decode) {
            Some(message) => {
                link.wipe();
                Reply::Received(message)
            }
            None => Reply::Pending,
        }
    }

    /// Whether `message` is an answer of the expected kind from `module`.
    fn is_answer(&self, message: &Message, module: ModuleId) -> bool {
        let matches = message.controller_id == self.id && message.module_id == module;
        if !matches {
            debug!(
                "controller: ignoring {:?} from {} for controller {}",
                message.kind, message.module_id, message.controller_id
            );
        }
        matches
    }

    fn enter_normal(&mut self) -> ControllerState {
        info!("controller: {} module(s) online, normal polling", self.roster.len());
        self.hooks.scanning(false);
        ControllerState::Normal(Poll::START)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests;
