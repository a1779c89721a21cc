//! `marketplace-events` — the notification model.
//!
//! Commands on the registry and store ledgers return their results
//! synchronously; the types in this crate exist for external observers that
//! want a durable audit trail on top of that: a `Notification` trait for the
//! emitted records, an `Envelope` carrying stream metadata, a pub/sub bus,
//! and projection support for read models.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;
pub mod notification;
pub mod projection;

pub use bus::{NotificationBus, Subscription};
pub use envelope::Envelope;
pub use in_memory_bus::{InMemoryBus, InMemoryBusError};
pub use notification::Notification;
pub use projection::{Projection, ProjectionError, ProjectionRunner, StreamCursor};
