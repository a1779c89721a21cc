//! Store directory read model.
//!
//! The shopper-facing listing: every created store with its name, in global
//! listing order. Disposable; rebuilt from the registry stream on demand.

use serde_json::Value as JsonValue;

use marketplace_core::StoreId;
use marketplace_events::{Envelope, Projection};
use marketplace_registry::RegistryEvent;

/// Builds the store directory from registry notifications.
///
/// Idempotent at the domain level: a redelivered `StoreCreated` for a store
/// already in the directory is a no-op.
#[derive(Debug, Default)]
pub struct CatalogProjection {
    directory: Vec<(StoreId, String)>,
}

impl CatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every created store with its name, in creation/listing order.
    pub fn directory(&self) -> &[(StoreId, String)] {
        &self.directory
    }
}

impl Projection for CatalogProjection {
    type Payload = JsonValue;

    fn apply(&mut self, envelope: &Envelope<JsonValue>) {
        // Non-registry payloads and non-StoreCreated events fall through.
        if let Ok(RegistryEvent::StoreCreated(e)) =
            serde_json::from_value(envelope.payload().clone())
        {
            if !self.directory.iter().any(|(id, _)| *id == e.store_id) {
                self.directory.push((e.store_id, e.name));
            }
        }
    }
}
