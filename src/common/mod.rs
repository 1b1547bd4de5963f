// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod address;
pub mod anydata;
pub mod crc;
pub mod error;
pub mod event;
pub mod frame;
pub mod hal_traits;
pub mod message;
pub mod storage;
pub mod timing;
pub mod types;
pub mod wire;

// --- Re-export key types/traits/functions for easier access ---

// From address.rs
pub use address::ModuleId;

// From anydata.rs
pub use anydata::{AnyData, AnyDataTimer, SlotObserver};

// From crc.rs
pub use crc::{crc8, verify_crc8};

// From error.rs
pub use error::BusError;

// From event.rs
pub use event::{Event, EventType};

// From frame.rs
pub use frame::Frame;

// From hal_traits.rs
pub use hal_traits::{Clock, LifecycleHooks, SerialPort, Storage};

// From message.rs
pub use message::{Message, MessageType, ScanInfo, SlotPayload};

// From types.rs
pub use types::{DataType, Humidity, SoilMoisture, Temperature};

// From wire.rs
pub use wire::WireValue;

// timing.rs and storage.rs are reached through their module paths,
// e.g. `common::timing::MAX_MISSED_ANSWERS`.
