// src/controller/scan.rs

use super::{Controller, ControllerState, ModuleInfo, Reply, ScanCursor, ScanStep};
use crate::common::{
    address::ModuleId,
    hal_traits::{Clock, LifecycleHooks, Storage},
    message::Message,
};
use log::{debug, info};

// Implementation block for module discovery
impl<'a, S, C, H> Controller<'a, S, C, H>
where
    S: Storage,
    C: Clock,
    H: LifecycleHooks,
{
    pub(super) fn start_scan(&mut self) -> ControllerState {
        info!("controller: scan started");
        self.hooks.scanning(true);
        self.roster.clear();

        if self.transports.is_empty() || self.max_modules == 0 {
            info!("controller: nothing to scan");
            return self.start_ask_slots();
        }

        ControllerState::Scan {
            cursor: ScanCursor { transport: 0, module: 0 },
            step: ScanStep::AskModule,
        }
    }

    pub(super) fn update_scan(&mut self, cursor: ScanCursor, step: ScanStep) -> ControllerState {
        match step {
            ScanStep::AskModule => {
                debug!("controller: probing module #{} on transport #{}", cursor.module, cursor.transport);
                let probe = Message::scan(self.id, ModuleId::new(cursor.module));
                let (started, timeout) = self.send(cursor.transport, &probe);
                ControllerState::Scan {
                    cursor,
                    step: ScanStep::WaitForModuleAnswer { started, timeout },
                }
            }

            ScanStep::WaitForModuleAnswer { started, timeout } => {
                match self.poll_reply(cursor.transport, started, timeout) {
                    Reply::Pending => ControllerState::Scan { cursor, step },
                    Reply::TimedOut => {
                        debug!("controller: module #{} not answering", cursor.module);
                        self.next_probe(cursor)
                    }
                    Reply::Received(answer) => {
                        let probed = ModuleId::new(cursor.module);
                        if let Some(scan_info) = answer.scan_info().filter(|_| self.is_answer(&answer, probed)) {
                            info!(
                                "controller: found module {} \"{}\" ({} broadcast, {} observe slots)",
                                probed, scan_info.name, scan_info.broadcast_slots, scan_info.observe_slots
                            );
                            self.roster.push(ModuleInfo::new(probed, cursor.transport, scan_info));
                        }
                        self.next_probe(cursor)
                    }
                }
            }
        }
    }

    /// Moves to the next address, wrapping to the next transport at
    /// `max_modules`. Past the last transport the scan is done.
    fn next_probe(&mut self, cursor: ScanCursor) -> ControllerState {
        let mut next = cursor;
        next.module += 1;
        if next.module >= self.max_modules {
            next.transport += 1;
            next.module = 0;
        }

        if next.transport >= self.transports.len() {
            info!(
                "controller: scan done, probed {} address(es) per transport, found {}",
                self.max_modules,
                self.roster.len()
            );
            return self.start_ask_slots();
        }

        ControllerState::Scan {
            cursor: next,
            step: ScanStep::AskModule,
        }
    }
}
