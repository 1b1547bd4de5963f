// src/controller/tests.rs

use super::*;
use crate::common::{
    event::Event,
    message::MessageType,
    storage::{read_value, write_value},
    types::DataType,
};
use crate::testing::{MockClock, MockLink, MockTransport};
use alloc::vec;
use alloc::vec::Vec;

const CID: u32 = 0x00C0_FFEE;
const TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct RecordingHooks {
    scanning: Vec<bool>,
    registration: Vec<bool>,
}

impl LifecycleHooks for RecordingHooks {
    fn scanning(&mut self, active: bool) {
        self.scanning.push(active);
    }

    fn registration(&mut self, success: bool) {
        self.registration.push(success);
    }
}

type TestController = Controller<'static, [u8; 32], MockClock, RecordingHooks>;

fn controller(clock: &MockClock) -> TestController {
    Controller::new(CID, "main", [0xFF; 32], clock.clone(), RecordingHooks::default())
}

fn with_links(clock: &MockClock, count: usize) -> (TestController, Vec<MockLink>) {
    let mut c = controller(clock);
    let mut links = Vec::new();
    for _ in 0..count {
        let (transport, link) = MockTransport::new(TIMEOUT);
        c.add_transport(transport);
        links.push(link);
    }
    (c, links)
}

fn run_until(c: &mut TestController, clock: &MockClock, mut done: impl FnMut(&TestController) -> bool) {
    for _ in 0..20_000 {
        if done(c) {
            return;
        }
        c.update();
        clock.advance_ms(5);
    }
    panic!("controller never reached the expected state");
}

fn run_for(c: &mut TestController, clock: &MockClock, ms: u64) {
    for _ in 0..ms / 5 {
        c.update();
        clock.advance_ms(5);
    }
}

fn sent_of(link: &MockLink, kind: MessageType) -> Vec<Message> {
    link.sent().into_iter().filter(|m| m.kind == kind).collect()
}

fn byte_slot(id: u16, value: u8) -> AnyData {
    let mut slot = AnyData::new(DataType::Byte, id);
    slot.set_byte(value);
    slot
}

#[test]
fn test_zero_transports_goes_straight_to_normal() {
    let clock = MockClock::default();
    let mut c = controller(&clock);
    c.begin(3);

    assert_eq!(c.mode(), ControllerMode::Normal);
    assert_eq!(c.module_count(), 0);
    assert_eq!(c.hooks().scanning, vec![true, false]);
}

#[test]
fn test_begin_starts_transports() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 2);
    c.begin(1);
    assert!(links.iter().all(|l| l.begun()));
    assert_eq!(c.mode(), ControllerMode::Scan);
}

#[test]
fn test_scan_probes_every_address_on_every_transport() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 2);
    c.begin(4);
    run_until(&mut c, &clock, |c| c.mode() != ControllerMode::Scan);

    for link in &links {
        let probes = sent_of(link, MessageType::Scan);
        assert_eq!(probes.len(), 4);
        for (n, probe) in probes.iter().enumerate() {
            assert_eq!(probe.module_id, ModuleId::new(n as u8));
            assert_eq!(probe.controller_id, CID);
        }
    }
    assert_eq!(c.mode(), ControllerMode::Normal);
    assert_eq!(c.hooks().scanning, vec![true, false]);
}

#[test]
fn test_scan_finds_single_module() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        (m.kind == MessageType::Scan && m.module_id == ModuleId::new(1))
            .then(|| Message::scan_response(m.controller_id, m.module_id, "S1", 2, 0))
    });

    c.begin(3);
    run_until(&mut c, &clock, |c| c.mode() != ControllerMode::Scan);

    let probed: Vec<u8> = sent_of(&links[0], MessageType::Scan)
        .iter()
        .map(|m| m.module_id.as_u8())
        .collect();
    assert_eq!(probed, vec![0, 1, 2]);

    assert_eq!(c.module_count(), 1);
    let module = c.module(0).unwrap();
    assert_eq!(module.id(), ModuleId::new(1));
    assert_eq!(module.name(), "S1");
    assert_eq!(module.broadcast_slot_count(), 2);
    assert_eq!(module.observe_slot_count(), 0);
    assert_eq!(module.transport(), 0);
    assert_eq!(c.mode(), ControllerMode::AskSlots);
}

#[test]
fn test_scan_ignores_foreign_answers() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| match m.module_id.as_u8() {
        // Wrong controller.
        0 => Some(Message::scan_response(m.controller_id + 1, m.module_id, "X", 0, 0)),
        // Wrong module.
        1 => Some(Message::scan_response(m.controller_id, ModuleId::new(9), "Y", 0, 0)),
        // Wrong kind.
        _ => Some(Message::pong(m.controller_id, m.module_id)),
    });

    c.begin(3);
    run_until(&mut c, &clock, |c| c.mode() != ControllerMode::Scan);
    assert_eq!(c.module_count(), 0);
    // Every probe was answered, so none had to wait for its timeout.
    assert!(clock.uptime() < TIMEOUT);
}

#[test]
fn test_slot_negotiation_builds_mirrors() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        if m.module_id != ModuleId::new(1) {
            return None;
        }
        match m.kind {
            MessageType::Scan => Some(Message::scan_response(m.controller_id, m.module_id, "S1", 2, 1)),
            MessageType::BroadcastSlotRegister => {
                let index = m.slot_index()?;
                let slot = byte_slot(100 + u16::from(index), 10 + index);
                Some(Message::broadcast_slot_data(m.controller_id, m.module_id, &slot))
            }
            MessageType::ObserveSlotRegister => Some(Message::observe_slot_data(
                m.controller_id,
                m.module_id,
                300,
                Duration::from_millis(250),
            )),
            _ => None,
        }
    });

    c.begin(2);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);

    let requests: Vec<(MessageType, Option<u8>)> = links[0]
        .sent()
        .iter()
        .filter(|m| m.slot_index().is_some())
        .map(|m| (m.kind, m.slot_index()))
        .collect();
    assert_eq!(
        requests,
        vec![
            (MessageType::BroadcastSlotRegister, Some(0)),
            (MessageType::BroadcastSlotRegister, Some(1)),
            (MessageType::ObserveSlotRegister, Some(0)),
        ]
    );

    let module = c.module(0).unwrap();
    assert_eq!(module.broadcast_slots().len(), 2);
    assert_eq!(module.broadcast_slot(100).unwrap().as_byte(), 10);
    assert_eq!(module.broadcast_slot(101).unwrap().as_byte(), 11);
    assert_eq!(module.observe_slots(), &[ObserveSubscription::new(300, Duration::from_millis(250))]);
    assert_eq!(c.find_broadcast_slot(101).unwrap().as_byte(), 11);
    assert_eq!(c.hooks().scanning, vec![true, false]);
}

#[test]
fn test_slot_negotiation_survives_silent_slot() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        if m.module_id != ModuleId::new(0) {
            return None;
        }
        match m.kind {
            MessageType::Scan => Some(Message::scan_response(m.controller_id, m.module_id, "S0", 2, 0)),
            MessageType::BroadcastSlotRegister if m.slot_index() == Some(1) => {
                Some(Message::broadcast_slot_data(m.controller_id, m.module_id, &byte_slot(7, 1)))
            }
            _ => None,
        }
    });

    c.begin(1);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    let module = c.module(0).unwrap();
    assert_eq!(module.broadcast_slots().len(), 1);
    assert!(module.broadcast_slot(7).is_some());
}

#[test]
fn test_normal_polling_refreshes_changed_slot() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    let mut reported = false;
    links[0].respond_with(move |m| {
        let (cid, id) = (m.controller_id, m.module_id);
        if id != ModuleId::new(1) {
            return None;
        }
        match m.kind {
            MessageType::Scan => Some(Message::scan_response(cid, id, "S1", 1, 0)),
            MessageType::BroadcastSlotRegister => Some(Message::broadcast_slot_data(cid, id, &byte_slot(100, 7))),
            MessageType::EventRequest if !reported => {
                reported = true;
                let event = Event::slot_data_changed(id, 100);
                Some(Message::event_response(cid, id, Some(&event)))
            }
            MessageType::EventRequest => Some(Message::event_response(cid, id, None)),
            MessageType::AnyDataRequest => Some(Message::any_data_response(cid, id, &byte_slot(100, 9))),
            _ => None,
        }
    });

    c.begin(2);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    assert_eq!(c.find_broadcast_slot(100).unwrap().as_byte(), 7);

    run_until(&mut c, &clock, |c| c.find_broadcast_slot(100).map(|s| s.as_byte()) == Some(9));

    let requests = sent_of(&links[0], MessageType::AnyDataRequest);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].slot_id(), Some(100));

    // Polling keeps going and the module stays on the roster.
    run_for(&mut c, &clock, 500);
    assert_eq!(c.module_count(), 1);
    assert_eq!(c.module(0).unwrap().missed_answers(), 0);
    assert!(sent_of(&links[0], MessageType::EventRequest).len() > 2);
}

#[test]
fn test_missed_answers_drop_module() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        (m.kind == MessageType::Scan && m.module_id == ModuleId::new(0))
            .then(|| Message::scan_response(m.controller_id, m.module_id, "quiet", 0, 0))
    });

    c.begin(1);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    assert_eq!(c.module_count(), 1);

    run_until(&mut c, &clock, |c| c.module_count() == 0);
    run_for(&mut c, &clock, 500);

    let polls = sent_of(&links[0], MessageType::EventRequest);
    assert_eq!(polls.len(), usize::from(crate::common::timing::MAX_MISSED_ANSWERS));
    assert_eq!(c.mode(), ControllerMode::Normal);
}

#[test]
fn test_observe_subscription_is_delivered() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        let (cid, id) = (m.controller_id, m.module_id);
        match (id.as_u8(), m.kind) {
            (1, MessageType::Scan) => Some(Message::scan_response(cid, id, "publisher", 1, 0)),
            (2, MessageType::Scan) => Some(Message::scan_response(cid, id, "observer", 0, 1)),
            (1, MessageType::BroadcastSlotRegister) => Some(Message::broadcast_slot_data(cid, id, &byte_slot(100, 7))),
            (2, MessageType::ObserveSlotRegister) => {
                Some(Message::observe_slot_data(cid, id, 100, Duration::from_millis(100)))
            }
            (_, MessageType::EventRequest) => Some(Message::event_response(cid, id, None)),
            _ => None,
        }
    });

    c.begin(3);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    run_until(&mut c, &clock, |_| !sent_of(&links[0], MessageType::AnyDataBroadcast).is_empty());

    let delivered = sent_of(&links[0], MessageType::AnyDataBroadcast);
    assert_eq!(delivered[0].module_id, ModuleId::new(2));
    let payload = delivered[0].slot_data().unwrap();
    assert_eq!(payload.slot_id, 100);
    assert_eq!(payload.data, vec![7]);

    // Not more often than the subscription asks for.
    let start = clock.uptime();
    run_for(&mut c, &clock, 1000);
    let count = sent_of(&links[0], MessageType::AnyDataBroadcast).len();
    let elapsed_periods = ((clock.uptime() - start).as_millis() / 100) as usize;
    assert!(count >= 2);
    assert!(count <= elapsed_periods + 1);
}

#[test]
fn test_zero_frequency_subscription_keeps_round_robin() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        let (cid, id) = (m.controller_id, m.module_id);
        match (id.as_u8(), m.kind) {
            (0, MessageType::Scan) => Some(Message::scan_response(cid, id, "publisher", 1, 0)),
            (1, MessageType::Scan) => Some(Message::scan_response(cid, id, "observer", 0, 1)),
            (0, MessageType::BroadcastSlotRegister) => Some(Message::broadcast_slot_data(cid, id, &byte_slot(100, 7))),
            (1, MessageType::ObserveSlotRegister) => Some(Message::observe_slot_data(cid, id, 100, Duration::ZERO)),
            (_, MessageType::EventRequest) => Some(Message::event_response(cid, id, None)),
            _ => None,
        }
    });

    c.begin(2);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    links[0].clear_sent();
    run_for(&mut c, &clock, 2000);

    let polls = sent_of(&links[0], MessageType::EventRequest);
    let publisher_polls = polls.iter().filter(|m| m.module_id == ModuleId::new(0)).count();
    let observer_polls = polls.len() - publisher_polls;
    assert!(publisher_polls > 10);
    assert!(observer_polls > 10);

    // One delivery per visit to the observer, no more.
    let deliveries = sent_of(&links[0], MessageType::AnyDataBroadcast);
    assert!(deliveries.iter().all(|m| m.module_id == ModuleId::new(1)));
    assert!(deliveries.len() <= observer_polls + 1);
    assert!(deliveries.len() + 1 >= observer_polls);
    assert_eq!(c.module_count(), 2);
}

#[test]
fn test_rescan_discards_roster() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    let mut answering = true;
    links[0].respond_with(move |m| {
        if m.kind == MessageType::EventRequest {
            return Some(Message::event_response(m.controller_id, m.module_id, None));
        }
        let reply = (answering && m.kind == MessageType::Scan && m.module_id == ModuleId::new(0))
            .then(|| Message::scan_response(m.controller_id, m.module_id, "S0", 0, 0));
        if reply.is_some() {
            answering = false;
        }
        reply
    });

    c.begin(1);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    assert_eq!(c.module_count(), 1);

    c.scan();
    assert_eq!(c.mode(), ControllerMode::Scan);
    assert_eq!(c.module_count(), 0);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);
    assert_eq!(c.module_count(), 0);
    assert_eq!(c.hooks().scanning, vec![true, false, true, false]);
}

#[test]
fn test_registration_success_triggers_rescan() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 1);
    links[0].respond_with(|m| {
        (m.kind == MessageType::RegistrationRequest)
            .then(|| Message::registration_result(m.controller_id, ModuleId::new(4)))
    });

    c.begin(2);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);

    c.start_registration(Duration::from_secs(1));
    assert_eq!(c.mode(), ControllerMode::Registration);
    run_until(&mut c, &clock, |c| c.mode() != ControllerMode::Registration);

    let requests = sent_of(&links[0], MessageType::RegistrationRequest);
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_broadcast());
    assert_eq!(c.hooks().registration, vec![true]);
    assert_eq!(c.mode(), ControllerMode::Scan);
    assert_eq!(c.hooks().scanning, vec![true, false, true]);
}

#[test]
fn test_registration_timeout_resumes_normal() {
    let clock = MockClock::default();
    let (mut c, links) = with_links(&clock, 2);
    c.begin(1);
    run_until(&mut c, &clock, |c| c.mode() == ControllerMode::Normal);

    c.start_registration(Duration::from_millis(300));
    run_until(&mut c, &clock, |c| c.mode() != ControllerMode::Registration);

    assert_eq!(c.mode(), ControllerMode::Normal);
    assert_eq!(c.hooks().registration, vec![false]);
    // Transports take turns.
    assert!(!sent_of(&links[0], MessageType::RegistrationRequest).is_empty());
    assert!(!sent_of(&links[1], MessageType::RegistrationRequest).is_empty());
    // Resuming does not count as finishing a scan.
    assert_eq!(c.hooks().scanning, vec![true, false]);
}

#[test]
fn test_registration_without_transports_fails_at_once() {
    let clock = MockClock::default();
    let mut c = controller(&clock);
    c.begin(1);
    c.start_registration(Duration::from_secs(1));
    assert_eq!(c.hooks().registration, vec![false]);
    assert_eq!(c.mode(), ControllerMode::Normal);
}

#[test]
fn test_begin_recalls_saved_id() {
    let clock = MockClock::default();
    let mut storage = [0xFFu8; 32];
    write_value(&mut storage, 0, 77u32);

    let mut c: TestController = Controller::new(CID, "main", storage, clock.clone(), RecordingHooks::default());
    c.begin(1);
    assert_eq!(c.id(), 77);
    assert_eq!(c.name(), "main");
}

#[test]
fn test_set_id_persists() {
    let clock = MockClock::default();
    let mut c = controller(&clock);
    c.set_id(0xABCD);
    assert_eq!(c.id(), 0xABCD);

    let mut storage = *c.storage();
    assert_eq!(read_value::<u32, _>(&mut storage, 0), Some(0xABCD));
}

#[test]
fn test_unsaved_id_is_kept() {
    let clock = MockClock::default();
    let mut c = controller(&clock);
    c.begin(1);
    assert_eq!(c.id(), CID);
}

#[test]
fn test_borrowed_transport() {
    let clock = MockClock::default();
    let (mut transport, link) = MockTransport::new(TIMEOUT);
    {
        let mut c = Controller::new(CID, "main", [0xFFu8; 32], clock.clone(), ());
        c.add_transport(&mut transport);
        c.begin(1);
        c.update();
    }
    assert!(link.begun());
    assert_eq!(link.sent()[0].kind, MessageType::Scan);
}
