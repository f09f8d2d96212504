//! External capabilities consumed by the engine.
//!
//! The engine mutates no shared state of its own beyond its queues and the
//! per-actor lock table; timelines, notifications and entities live behind
//! these traits, implemented by the owning server process. In-memory
//! implementations are provided for tests and federation-disabled setups.

pub mod delivery;
pub mod notification;
pub mod storage;

pub use delivery::{ActivityDelivery, NoOpDelivery};
pub use notification::{MemoryNotifications, Notification, NotificationKind, NotificationSink};
pub use storage::{MemoryStorage, Storage};
