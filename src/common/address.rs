// src/common/address.rs

use core::fmt;

/// Address of a module on the bus.
///
/// `0..=254` address single modules, `255` is the broadcast address and is
/// never assigned to a real module.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct ModuleId(u8);

impl ModuleId {
    pub const BROADCAST: ModuleId = ModuleId(0xFF);

    /// Highest address a real module can have.
    pub const MAX_UNICAST: u8 = 0xFE;

    #[inline]
    pub const fn new(id: u8) -> Self {
        ModuleId(id)
    }

    #[inline]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_broadcast(&self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Whether a message sent to `self` should be handled by module `own`.
    #[inline]
    pub const fn reaches(&self, own: ModuleId) -> bool {
        self.is_broadcast() || self.0 == own.0
    }
}

impl From<u8> for ModuleId {
    fn from(value: u8) -> Self {
        ModuleId(value)
    }
}

impl From<ModuleId> for u8 {
    fn from(value: ModuleId) -> Self {
        value.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "#broadcast")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
