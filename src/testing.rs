// src/testing.rs

//! Mocks shared by the controller and module unit tests.

use crate::common::{error::BusError, hal_traits::Clock, message::Message};
use crate::transport::Transport;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::time::Duration;

/// Clock whose time only moves when a test says so. Clones share the time.
#[derive(Debug, Clone, Default)]
pub struct MockClock(Rc<Cell<Duration>>);

impl MockClock {
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for MockClock {
    fn uptime(&self) -> Duration {
        self.0.get()
    }
}

type Responder = Box<dyn FnMut(&Message) -> Option<Message>>;

#[derive(Default)]
struct LinkState {
    sent: Vec<Message>,
    pending: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    begun: bool,
}

/// Packet-level transport mock.
///
/// Every write is decoded and logged. A responder, when set, is asked for a
/// reply which becomes readable on the next `update()`.
pub struct MockTransport {
    state: Rc<RefCell<LinkState>>,
    inbox: Option<Vec<u8>>,
    timeout: Duration,
}

/// Test-side handle on a [`MockTransport`].
#[derive(Clone)]
pub struct MockLink(Rc<RefCell<LinkState>>);

impl MockTransport {
    pub fn new(timeout: Duration) -> (Self, MockLink) {
        let state = Rc::new(RefCell::new(LinkState::default()));
        (
            MockTransport {
                state: state.clone(),
                inbox: None,
                timeout,
            },
            MockLink(state),
        )
    }
}

impl MockLink {
    pub fn respond_with<F>(&self, f: F)
    where
        F: FnMut(&Message) -> Option<Message> + 'static,
    {
        self.0.borrow_mut().responder = Some(Box::new(f));
    }

    pub fn push(&self, message: &Message) {
        self.0.borrow_mut().pending.push_back(message.as_bytes().to_vec());
    }

    pub fn sent(&self) -> Vec<Message> {
        self.0.borrow().sent.clone()
    }

    pub fn last_sent(&self) -> Option<Message> {
        self.0.borrow().sent.last().cloned()
    }

    pub fn clear_sent(&self) {
        self.0.borrow_mut().sent.clear();
    }

    pub fn begun(&self) -> bool {
        self.0.borrow().begun
    }
}

impl Transport for MockTransport {
    fn begin(&mut self) -> Result<(), BusError> {
        self.state.borrow_mut().begun = true;
        Ok(())
    }

    fn update(&mut self) {
        if self.inbox.is_none() {
            self.inbox = self.state.borrow_mut().pending.pop_front();
        }
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let message = Message::decode(payload);
        let mut state = self.state.borrow_mut();
        let reply = state.responder.as_mut().and_then(|r| r(&message));
        state.sent.push(message);
        if let Some(reply) = reply {
            state.pending.push_back(reply.as_bytes().to_vec());
        }
        Ok(())
    }

    fn available(&self) -> bool {
        self.inbox.is_some()
    }

    fn read(&self) -> Option<&[u8]> {
        self.inbox.as_deref()
    }

    fn wipe(&mut self) {
        self.inbox = None;
    }

    fn reading_timeout(&self) -> Duration {
        self.timeout
    }
}
