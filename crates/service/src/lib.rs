//! `marketplace-service` — the application facade.
//!
//! This crate assembles the pure domain aggregates into a callable service:
//! per-entity locking, the external funds-transfer seam, the append-only
//! notification log, and the pub/sub fan-out for observers. The driver layer
//! (UI, wallet, payment collection) talks to [`Marketplace`] and to nothing
//! else.

pub mod catalog;
pub mod log;
pub mod marketplace;
pub mod payment;

pub use catalog::CatalogProjection;
pub use log::{LogError, NotificationLog, PendingNotification};
pub use marketplace::{Marketplace, ProductView};
pub use payment::{FundsTransfer, RecordingTransfer, TransferError};

// Re-exported for drivers so one import surface covers the whole API.
pub use marketplace_access::Role;
pub use marketplace_core::{Identity, MarketError, MarketResult, StoreId};
pub use marketplace_store::ProductId;
