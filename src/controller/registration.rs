// src/controller/registration.rs

use super::{Controller, ControllerState, Poll, Reply, RoundTrip};
use crate::common::{
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::{Message, MessageType},
};
use core::time::Duration;
use log::{debug, info, warn};

// Implementation block for module registration
impl<'a, S, C, H> Controller<'a, S, C, H>
where
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    /// Looks for a module in registration mode for at most `timeout`.
    ///
    /// A `RegistrationRequest` is broadcast on each transport in turn. The
    /// first `RegistrationResult` ends the window with
    /// `hooks.registration(true)` and a fresh scan; running out of time calls
    /// `hooks.registration(false)` and resumes normal polling.
    pub fn start_registration(&mut self, timeout: Duration) {
        if self.transports.is_empty() {
            warn!("controller: no transport to register modules on");
            self.hooks.registration(false);
            return;
        }

        info!("controller: registration window open for {:?}", timeout);
        self.state = ControllerState::Registration {
            transport: 0,
            step: RoundTrip::Send,
            deadline: self.clock.uptime() + timeout,
        };
    }

    pub(super) fn update_registration(
        &mut self,
        transport: usize,
        step: RoundTrip,
        deadline: Duration,
    ) -> ControllerState {
        if self.clock.uptime() >= deadline {
            info!("controller: registration window closed, no module registered");
            self.hooks.registration(false);
            return ControllerState::Normal(Poll::START);
        }

        match step {
            RoundTrip::Send => {
                let (started, timeout) = self.send(transport, &Message::registration_request(self.id));
                ControllerState::Registration {
                    transport,
                    step: RoundTrip::Wait { started, timeout },
                    deadline,
                }
            }

            RoundTrip::Wait { started, timeout } => match self.poll_reply(transport, started, timeout) {
                Reply::Pending => ControllerState::Registration {
                    transport,
                    step,
                    deadline,
                },
                Reply::TimedOut => ControllerState::Registration {
                    transport: (transport + 1) % self.transports.len(),
                    step: RoundTrip::Send,
                    deadline,
                },
                Reply::Received(answer) => {
                    if answer.kind == MessageType::RegistrationResult && answer.controller_id == self.id {
                        info!("controller: module {} registered", answer.module_id);
                        self.hooks.registration(true);
                        return self.start_scan();
                    }
                    debug!("controller: ignoring {:?} during registration", answer.kind);
                    ControllerState::Registration {
                        transport,
                        step,
                        deadline,
                    }
                }
            },
        }
    }
}
