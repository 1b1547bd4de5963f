// src/common/hal_traits.rs

use core::fmt::Debug;
use core::time::Duration;

/// Monotonic time source.
///
/// Every timeout in the crate is a difference of two `uptime()` readings, so
/// the origin does not matter. Implementations must never go backwards.
pub trait Clock {
    /// Time since some fixed point (usually boot).
    fn uptime(&self) -> Duration;
}

/// Abstraction for non-blocking, byte-oriented serial communication.
///
/// The RS-485 transport only needs raw 8-bit bytes. Direction switching is
/// done separately through an `embedded_hal::digital::OutputPin`.
pub trait SerialPort {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if no byte is available yet.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if the write buffer is full.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmit buffer.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` while transmission is in progress.
    /// The driver-enable pin must not be released before this returns `Ok`.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// Byte-addressed persistent storage (EEPROM or similar).
///
/// Typed access with sentinel handling lives in [`crate::common::storage`].
pub trait Storage {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

/// Notifications the application may want to react to (LEDs, displays...).
///
/// Both methods default to no-ops; `()` implements the trait for callers that
/// do not care.
pub trait LifecycleHooks {
    /// Called with `true` when a scan starts and `false` once the bus is back
    /// to normal polling.
    fn scanning(&mut self, _active: bool) {}

    /// Called once per registration window with its outcome.
    fn registration(&mut self, _success: bool) {}
}

impl LifecycleHooks for () {}
