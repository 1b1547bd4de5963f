// src/controller/normal.rs

use super::{Controller, ControllerState, Poll, PollStep, Reply};
use crate::common::{
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::{Message, MessageType},
    timing::MAX_MISSED_ANSWERS,
};
use log::{debug, warn};

// Implementation block for steady-state polling
impl<'a, S, C, H> Controller<'a, S, C, H>
where
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    pub(super) fn update_normal(&mut self, poll: Poll) -> ControllerState {
        let (module_id, transport) = match self.roster.get(poll.module) {
            Some(module) => (module.id(), module.transport()),
            None => return ControllerState::Normal(Poll::START),
        };

        match poll.step {
            PollStep::Idle => {
                // At most one delivery per visit, then the poll itself.
                self.deliver_observed_slot(poll.module);
                let (started, timeout) = self.send(transport, &Message::event_request(self.id, module_id));
                ControllerState::Normal(Poll {
                    step: PollStep::WaitForEvent { started, timeout },
                    ..poll
                })
            }

            PollStep::WaitForEvent { started, timeout } => match self.poll_reply(transport, started, timeout) {
                Reply::Pending => ControllerState::Normal(poll),
                Reply::TimedOut => self.missed_answer(poll.module),
                Reply::Received(answer) => {
                    if answer.kind != MessageType::EventResponse || !self.is_answer(&answer, module_id) {
                        return ControllerState::Normal(poll);
                    }
                    if let Some(module) = self.roster.get_mut(poll.module) {
                        module.record_answer();
                    }

                    let changed = answer
                        .read_event_response()
                        .flatten()
                        .and_then(|event| event.changed_slot());
                    match changed {
                        Some((origin, slot_id)) => {
                            debug!("controller: slot {} of {} changed", slot_id, origin);
                            let request = Message::any_data_request(self.id, module_id, slot_id);
                            let (started, timeout) = self.send(transport, &request);
                            ControllerState::Normal(Poll {
                                step: PollStep::WaitForSlotData {
                                    slot_id,
                                    started,
                                    timeout,
                                },
                                ..poll
                            })
                        }
                        None => self.next_poll(poll.module),
                    }
                }
            },

            PollStep::WaitForSlotData {
                slot_id,
                started,
                timeout,
            } => match self.poll_reply(transport, started, timeout) {
                Reply::Pending => ControllerState::Normal(poll),
                Reply::TimedOut => self.missed_answer(poll.module),
                Reply::Received(answer) => {
                    if answer.kind != MessageType::AnyDataResponse || !self.is_answer(&answer, module_id) {
                        return ControllerState::Normal(poll);
                    }
                    if let Some(module) = self.roster.get_mut(poll.module) {
                        module.record_answer();
                        match answer.slot_data() {
                            Some(payload) if payload.slot_id == slot_id => {
                                if let Err(e) = module.store_slot(&payload) {
                                    warn!("controller: bad slot {} from {}: {}", slot_id, module_id, e);
                                }
                            }
                            _ => debug!("controller: {} answered with another slot", module_id),
                        }
                    }
                    self.next_poll(poll.module)
                }
            },
        }
    }

    /// Sends the longest-waiting due observe subscription of the module at `index`.
    fn deliver_observed_slot(&mut self, index: usize) {
        let now = self.clock.uptime();
        let (module_id, transport, sub_index, slot_id) = match self.roster.get(index) {
            Some(module) => match module.due_subscription(now) {
                Some(sub) => (module.id(), module.transport(), sub, module.observe_slots()[sub].slot_id),
                None => return,
            },
            None => return,
        };

        if let Some(subscription) = self.roster.get_mut(index).and_then(|m| m.subscription_mut(sub_index)) {
            subscription.mark_sent(now);
        }

        let message = match self.roster.find_broadcast_slot(slot_id) {
            Some(slot) => Message::any_data_broadcast(self.id, module_id, slot),
            None => {
                debug!("controller: nobody publishes slot {} observed by {}", slot_id, module_id);
                return;
            }
        };

        let link = &mut self.transports[transport];
        if let Err(e) = link.write(message.as_bytes()) {
            warn!("controller: delivering slot {} to {} failed: {}", slot_id, module_id, e);
        }
    }

    fn next_poll(&self, index: usize) -> ControllerState {
        let next = if index + 1 >= self.roster.len() { 0 } else { index + 1 };
        ControllerState::Normal(Poll {
            module: next,
            step: PollStep::Idle,
        })
    }

    fn missed_answer(&mut self, index: usize) -> ControllerState {
        let missed = match self.roster.get_mut(index) {
            Some(module) => module.record_miss(),
            None => return ControllerState::Normal(Poll::START),
        };

        if missed < MAX_MISSED_ANSWERS {
            debug!("controller: module at roster #{} missed {} answer(s)", index, missed);
            return self.next_poll(index);
        }

        let gone = self.roster.remove(index);
        warn!("controller: module {} \"{}\" stopped answering, dropped", gone.id(), gone.name());
        let next = if index >= self.roster.len() { 0 } else { index };
        ControllerState::Normal(Poll {
            module: next,
            step: PollStep::Idle,
        })
    }
}
