// src/common/timing.rs

use core::time::Duration;

// === Link Layer ===

/// Default idle time allowed between two payload bytes of one RS-485 packet.
/// Also how long the controller waits for a reply to a single request.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(50);

/// Upper bound for each blocking step of an RS-485 write (one byte, or the
/// final flush). Serial ports that cannot keep up within this are reported as
/// timed out.
pub const TRANSMIT_TIMEOUT: Duration = Duration::from_millis(20);

// === Controller ===

/// Consecutive unanswered polls after which a module is dropped from the roster.
pub const MAX_MISSED_ANSWERS: u8 = 3;

/// Default length of a registration window.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

// === Module ===

/// Events a module keeps for the controller to pick up.
pub const EVENT_QUEUE_CAPACITY: usize = 16;
