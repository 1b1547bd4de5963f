// src/transport/mod.rs

use crate::common::error::BusError;
use core::time::Duration;

pub mod rs485;

pub use rs485::Rs485;

/// A packet link between the controller and its modules.
///
/// Transports are polled: `update()` moves bytes from the hardware into at
/// most one pending packet, which stays readable until `wipe()` is called.
/// The trait is object safe so a controller can drive several different
/// transports through `Box<dyn Transport>`.
pub trait Transport {
    /// Prepares the hardware. Called once before the first `update()`.
    fn begin(&mut self) -> Result<(), BusError>;

    /// Processes whatever input is pending. Never blocks.
    fn update(&mut self);

    /// Sends one packet.
    fn write(&mut self, payload: &[u8]) -> Result<(), BusError>;

    /// Whether a complete packet is waiting.
    fn available(&self) -> bool;

    /// The waiting packet, if any.
    fn read(&self) -> Option<&[u8]>;

    /// Discards the waiting packet.
    fn wipe(&mut self);

    /// How long a peer may take to answer on this link.
    fn reading_timeout(&self) -> Duration;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn begin(&mut self) -> Result<(), BusError> {
        (**self).begin()
    }

    fn update(&mut self) {
        (**self).update()
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), BusError> {
        (**self).write(payload)
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn read(&self) -> Option<&[u8]> {
        (**self).read()
    }

    fn wipe(&mut self) {
        (**self).wipe()
    }

    fn reading_timeout(&self) -> Duration {
        (**self).reading_timeout()
    }
}
