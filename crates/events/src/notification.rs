use chrono::{DateTime, Utc};

/// An observable record emitted by a successful operation.
///
/// Notifications are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Notification: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable notification name/kind identifier (e.g. "store.product.added").
    fn kind(&self) -> &'static str;

    /// Schema version for this notification kind.
    fn schema_version(&self) -> u32;

    /// When the operation occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
