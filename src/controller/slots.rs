// src/controller/slots.rs

use super::{Controller, ControllerState, ObserveSubscription, Reply, RoundTrip, SlotCursor, SlotKind};
use crate::common::{
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::{Message, MessageType},
};
use log::{debug, info, warn};

// Implementation block for slot negotiation
impl<'a, S, C, H> Controller<'a, S, C, H>
where
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    /// Starts asking every online module for its slots, or goes straight to
    /// normal polling when there is nobody to ask.
    pub(super) fn start_ask_slots(&mut self) -> ControllerState {
        let first = SlotCursor {
            module: 0,
            kind: SlotKind::Broadcast,
            index: 0,
        };
        match self.pending_slot(first) {
            Some(cursor) => {
                info!("controller: asking {} module(s) for slots", self.roster.len());
                ControllerState::AskSlots {
                    cursor,
                    step: RoundTrip::Send,
                }
            }
            None => self.enter_normal(),
        }
    }

    pub(super) fn update_ask_slots(&mut self, cursor: SlotCursor, step: RoundTrip) -> ControllerState {
        let (module_id, transport) = match self.roster.get(cursor.module) {
            Some(module) => (module.id(), module.transport()),
            None => return self.enter_normal(),
        };

        match step {
            RoundTrip::Send => {
                let request = match cursor.kind {
                    SlotKind::Broadcast => Message::broadcast_slot_register(self.id, module_id, cursor.index),
                    SlotKind::Observe => Message::observe_slot_register(self.id, module_id, cursor.index),
                };
                debug!("controller: asking {} for {:?} slot {}", module_id, cursor.kind, cursor.index);
                let (started, timeout) = self.send(transport, &request);
                ControllerState::AskSlots {
                    cursor,
                    step: RoundTrip::Wait { started, timeout },
                }
            }

            RoundTrip::Wait { started, timeout } => match self.poll_reply(transport, started, timeout) {
                Reply::Pending => ControllerState::AskSlots { cursor, step },
                Reply::TimedOut => {
                    warn!("controller: {} did not describe {:?} slot {}", module_id, cursor.kind, cursor.index);
                    self.next_slot(cursor)
                }
                Reply::Received(answer) => {
                    if self.is_answer(&answer, module_id) {
                        self.record_slot(cursor, &answer);
                    }
                    self.next_slot(cursor)
                }
            },
        }
    }

    fn record_slot(&mut self, cursor: SlotCursor, answer: &Message) {
        let module = match self.roster.get_mut(cursor.module) {
            Some(module) => module,
            None => return,
        };

        match cursor.kind {
            SlotKind::Broadcast => match answer.slot_data() {
                Some(payload) if answer.kind == MessageType::BroadcastSlotData => {
                    if let Err(e) = module.store_slot(&payload) {
                        warn!("controller: bad slot {} from {}: {}", payload.slot_id, module.id(), e);
                    }
                }
                _ => debug!("controller: unexpected {:?} while asking for a broadcast slot", answer.kind),
            },
            SlotKind::Observe => match answer.observe_slot() {
                Some((slot_id, frequency)) => {
                    module.subscribe(ObserveSubscription::new(slot_id, frequency));
                }
                None => debug!("controller: unexpected {:?} while asking for an observe slot", answer.kind),
            },
        }
    }

    fn next_slot(&mut self, cursor: SlotCursor) -> ControllerState {
        let after = SlotCursor {
            index: cursor.index + 1,
            ..cursor
        };
        match self.pending_slot(after) {
            Some(next) => ControllerState::AskSlots {
                cursor: next,
                step: RoundTrip::Send,
            },
            None => self.enter_normal(),
        }
    }

    /// First slot at or after `cursor` that a module has declared.
    fn pending_slot(&self, mut cursor: SlotCursor) -> Option<SlotCursor> {
        while let Some(module) = self.roster.get(cursor.module) {
            match cursor.kind {
                SlotKind::Broadcast if cursor.index < module.broadcast_slot_count() => return Some(cursor),
                SlotKind::Broadcast => {
                    cursor.kind = SlotKind::Observe;
                    cursor.index = 0;
                }
                SlotKind::Observe if cursor.index < module.observe_slot_count() => return Some(cursor),
                SlotKind::Observe => {
                    cursor = SlotCursor {
                        module: cursor.module + 1,
                        kind: SlotKind::Broadcast,
                        index: 0,
                    };
                }
            }
        }
        None
    }
}
