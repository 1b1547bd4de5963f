// src/lib.rs

#![no_std] // Specify no_std at the crate root

extern crate alloc;

pub mod common;
pub mod controller;
pub mod module;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use common::{BusError, Message, MessageType, ModuleId};
pub use controller::Controller;
pub use module::SmartModule;
pub use transport::{Rs485, Transport};
