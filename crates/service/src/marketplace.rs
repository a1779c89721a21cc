//! The marketplace facade.
//!
//! One explicitly constructed service object per deployment. It owns the
//! registry and every store ledger behind per-entity locks, stamps business
//! time at the boundary, runs the dispatch pipeline (decide → move funds if
//! needed → append → publish → apply), and exposes the typed operations the
//! driver layer calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use marketplace_access::Role;
use marketplace_core::{
    Aggregate, AggregateRoot, ExpectedVersion, Identity, MarketError, MarketResult, RegistryId,
    StoreId,
};
use marketplace_events::{
    Envelope, InMemoryBus, Notification, NotificationBus, ProjectionRunner, Subscription,
};
use marketplace_registry::{
    CreateStore, GrantAdmin, GrantStoreOwner, OpenRegistry, Registry, RegistryCommand,
};
use marketplace_store::{
    AddProduct, AddStock, AvailabilityChecked, BuyProduct, OpenStore, ProductId, RemoveStock,
    StoreLedger, StoreLedgerCommand, StoreLedgerEvent, Withdraw,
};

use crate::catalog::CatalogProjection;
use crate::log::{NotificationLog, PendingNotification};
use crate::payment::FundsTransfer;

const REGISTRY_STREAM: &str = "registry";
const STORE_STREAM: &str = "store.ledger";

/// Stream type for observational notifications published on the bus but
/// never appended to an entity stream; their sequence number is always 0.
const QUERY_STREAM: &str = "store.ledger.query";

/// An owned snapshot of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductView {
    pub name: String,
    pub unit_price: u64,
    pub stock: u64,
}

fn poisoned<E>(_: E) -> MarketError {
    MarketError::validation("lock poisoned")
}

/// The deployment-wide service object.
///
/// Registry operations serialize against each other; operations on distinct
/// stores run independently (per-store mutexes). `create_store` is the only
/// path that touches both, always registry first, so lock order is fixed.
pub struct Marketplace<T: FundsTransfer> {
    registry_id: RegistryId,
    registry: Mutex<Registry>,
    stores: RwLock<HashMap<StoreId, Arc<Mutex<StoreLedger>>>>,
    log: NotificationLog,
    bus: InMemoryBus<Envelope<JsonValue>>,
    rail: T,
}

impl<T: FundsTransfer> Marketplace<T> {
    /// Open a new deployment.
    ///
    /// The explicit initialization step: `root_admin` receives the first
    /// `Admin` grant; `rail` is the external funds-transfer collaborator
    /// used by withdrawals.
    pub fn open(root_admin: Identity, rail: T) -> MarketResult<Self> {
        let registry_id = RegistryId::new();
        let service = Self {
            registry_id,
            registry: Mutex::new(Registry::empty(registry_id)),
            stores: RwLock::new(HashMap::new()),
            log: NotificationLog::new(),
            bus: InMemoryBus::new(),
            rail,
        };

        {
            let mut registry = service.registry.lock().map_err(poisoned)?;
            let command = RegistryCommand::OpenRegistry(OpenRegistry {
                registry_id,
                root_admin,
                occurred_at: Utc::now(),
            });
            let events = registry.handle(&command)?;
            let pre = registry.version();
            service.commit(*registry_id.as_uuid(), REGISTRY_STREAM, pre, &events)?;
            for event in &events {
                registry.apply(event);
            }
        }

        tracing::info!(%registry_id, "marketplace opened");
        Ok(service)
    }

    // ── commands ────────────────────────────────────────────────────────

    /// Grant `Admin` to `target`. Caller must be an admin.
    pub fn add_admin(&self, caller: Identity, target: Identity) -> MarketResult<()> {
        let mut registry = self.registry.lock().map_err(poisoned)?;
        let command = RegistryCommand::GrantAdmin(GrantAdmin {
            caller,
            target,
            occurred_at: Utc::now(),
        });
        let events = registry.handle(&command)?;
        let pre = registry.version();
        self.commit(*self.registry_id.as_uuid(), REGISTRY_STREAM, pre, &events)?;
        for event in &events {
            registry.apply(event);
        }
        tracing::debug!(op = "add_admin", %target, events = events.len(), "dispatched");
        Ok(())
    }

    /// Grant `StoreOwner` to `target`. Caller must be an admin.
    pub fn add_store_owner(&self, caller: Identity, target: Identity) -> MarketResult<()> {
        let mut registry = self.registry.lock().map_err(poisoned)?;
        let command = RegistryCommand::GrantStoreOwner(GrantStoreOwner {
            caller,
            target,
            occurred_at: Utc::now(),
        });
        let events = registry.handle(&command)?;
        let pre = registry.version();
        self.commit(*self.registry_id.as_uuid(), REGISTRY_STREAM, pre, &events)?;
        for event in &events {
            registry.apply(event);
        }
        tracing::debug!(op = "add_store_owner", %target, events = events.len(), "dispatched");
        Ok(())
    }

    /// Create a store owned by the caller and open its ledger.
    ///
    /// Caller must hold the `StoreOwner` role. Returns the reference the
    /// caller uses for every store-level operation afterwards.
    pub fn create_store(&self, caller: Identity, name: &str) -> MarketResult<StoreId> {
        let mut registry = self.registry.lock().map_err(poisoned)?;
        let store_id = StoreId::new();
        let at = Utc::now();

        let command = RegistryCommand::CreateStore(CreateStore {
            caller,
            store_id,
            name: name.to_string(),
            occurred_at: at,
        });
        let events = registry.handle(&command)?;
        let pre = registry.version();
        self.commit(*self.registry_id.as_uuid(), REGISTRY_STREAM, pre, &events)?;
        for event in &events {
            registry.apply(event);
        }

        // Open the ledger for the new store; the registry decision already
        // validated owner and name.
        let mut ledger = StoreLedger::empty(store_id);
        let open = StoreLedgerCommand::OpenStore(OpenStore {
            store_id,
            owner: caller,
            name: name.to_string(),
            occurred_at: at,
        });
        let opened = ledger.handle(&open)?;
        self.commit(*store_id.as_uuid(), STORE_STREAM, 0, &opened)?;
        for event in &opened {
            ledger.apply(event);
        }

        self.stores
            .write()
            .map_err(poisoned)?
            .insert(store_id, Arc::new(Mutex::new(ledger)));

        tracing::debug!(op = "create_store", %store_id, owner = %caller, "store opened");
        Ok(store_id)
    }

    /// Add a product to the caller's store catalog.
    pub fn add_new_product(
        &self,
        caller: Identity,
        store_id: StoreId,
        product_id: ProductId,
        name: &str,
        unit_price: u64,
        stock: u64,
    ) -> MarketResult<()> {
        self.dispatch_store(
            store_id,
            StoreLedgerCommand::AddProduct(AddProduct {
                caller,
                product_id,
                name: name.to_string(),
                unit_price,
                stock,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::debug!(op = "add_new_product", %store_id, %product_id, "dispatched");
        Ok(())
    }

    /// Raise a product's stock level. Returns the new level.
    pub fn add_product_stock(
        &self,
        caller: Identity,
        store_id: StoreId,
        product_id: ProductId,
        amount: u64,
    ) -> MarketResult<u64> {
        let events = self.dispatch_store(
            store_id,
            StoreLedgerCommand::AddStock(AddStock {
                caller,
                product_id,
                amount,
                occurred_at: Utc::now(),
            }),
        )?;
        match events.first() {
            Some(StoreLedgerEvent::StockIncreased(e)) => Ok(e.remaining_stock),
            _ => Err(MarketError::validation("stock increase emitted no event")),
        }
    }

    /// Lower a product's stock level. Returns the new level.
    pub fn remove_product(
        &self,
        caller: Identity,
        store_id: StoreId,
        product_id: ProductId,
        amount: u64,
    ) -> MarketResult<u64> {
        let events = self.dispatch_store(
            store_id,
            StoreLedgerCommand::RemoveStock(RemoveStock {
                caller,
                product_id,
                amount,
                occurred_at: Utc::now(),
            }),
        )?;
        match events.first() {
            Some(StoreLedgerEvent::StockDecreased(e)) => Ok(e.remaining_stock),
            _ => Err(MarketError::validation("stock decrease emitted no event")),
        }
    }

    /// Buy `quantity` units, tendering `payment` collected by the external
    /// payment layer. Returns the remaining stock.
    ///
    /// A refusal means the tendered funds were never absorbed; the error
    /// return is the refund instruction to that layer.
    pub fn buy_product(
        &self,
        caller: Identity,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
        payment: u64,
    ) -> MarketResult<u64> {
        let events = self.dispatch_store(
            store_id,
            StoreLedgerCommand::BuyProduct(BuyProduct {
                buyer: caller,
                product_id,
                quantity,
                payment,
                occurred_at: Utc::now(),
            }),
        )?;
        match events.first() {
            Some(StoreLedgerEvent::PurchaseCompleted(e)) => {
                tracing::debug!(op = "buy_product", %store_id, %product_id, payment, "purchase completed");
                Ok(e.remaining_stock)
            }
            _ => Err(MarketError::validation("purchase emitted no event")),
        }
    }

    /// Withdraw `amount` from the caller's store balance through the
    /// external rail. Returns the remaining balance.
    ///
    /// All-or-nothing: the decision is made first, then the rail moves the
    /// funds, and only then does the balance change. A rail refusal
    /// surfaces as `TransferFailed` with the balance untouched.
    pub fn withdraw_amount(
        &self,
        caller: Identity,
        store_id: StoreId,
        amount: u64,
    ) -> MarketResult<u64> {
        let handle = self.store(&store_id)?;
        let mut ledger = handle.lock().map_err(poisoned)?;

        let command = StoreLedgerCommand::Withdraw(Withdraw {
            caller,
            amount,
            occurred_at: Utc::now(),
        });
        let events = ledger.handle(&command)?;

        self.rail.transfer(&caller, amount).map_err(|e| {
            tracing::warn!(op = "withdraw_amount", %store_id, error = %e, "transfer refused; withdrawal rolled back");
            MarketError::transfer_failed(e.to_string())
        })?;

        let pre = ledger.version();
        self.commit(*store_id.as_uuid(), STORE_STREAM, pre, &events)?;
        for event in &events {
            ledger.apply(event);
        }

        match events.first() {
            Some(StoreLedgerEvent::WithdrawalCompleted(e)) => {
                tracing::debug!(op = "withdraw_amount", %store_id, amount, "withdrawal completed");
                Ok(e.remaining_balance)
            }
            _ => Err(MarketError::validation("withdrawal emitted no event")),
        }
    }

    // ── queries ─────────────────────────────────────────────────────────

    /// Classify a caller identity.
    pub fn role_of(&self, identity: &Identity) -> MarketResult<Role> {
        let registry = self.registry.lock().map_err(poisoned)?;
        Ok(registry.role_of(identity))
    }

    /// The stores visible to the caller (owners see their own; everyone
    /// else sees all).
    pub fn get_stores(&self, caller: &Identity) -> MarketResult<Vec<StoreId>> {
        let registry = self.registry.lock().map_err(poisoned)?;
        Ok(registry.visible_stores(caller))
    }

    /// A store's display name.
    pub fn get_store_name(&self, store_id: StoreId) -> MarketResult<String> {
        let handle = self.store(&store_id)?;
        let ledger = handle.lock().map_err(poisoned)?;
        Ok(ledger.store_name().to_string())
    }

    /// Snapshot of one catalog entry.
    pub fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> MarketResult<ProductView> {
        let handle = self.store(&store_id)?;
        let ledger = handle.lock().map_err(poisoned)?;
        let product = ledger.product(&product_id)?;
        Ok(ProductView {
            name: product.name.clone(),
            unit_price: product.unit_price,
            stock: product.stock,
        })
    }

    /// Whether at least `quantity` units are in stock.
    ///
    /// Publishes the observational `AvailabilityChecked` notification for
    /// observers; the ledger itself is untouched.
    pub fn check_availability(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
    ) -> MarketResult<bool> {
        let handle = self.store(&store_id)?;
        let available = {
            let ledger = handle.lock().map_err(poisoned)?;
            ledger.check_availability(&product_id, quantity)
        };

        let note = AvailabilityChecked {
            store_id,
            product_id,
            quantity,
            available,
            occurred_at: Utc::now(),
        };
        self.publish_observational(*store_id.as_uuid(), &note);

        Ok(available)
    }

    /// Collected balance of the caller's store.
    pub fn get_store_balance(&self, caller: &Identity, store_id: StoreId) -> MarketResult<u64> {
        let handle = self.store(&store_id)?;
        let ledger = handle.lock().map_err(poisoned)?;
        ledger.balance_for(caller)
    }

    /// The shopper-facing store directory (id + name, listing order),
    /// rebuilt from the registry stream.
    pub fn store_directory(&self) -> Vec<(StoreId, String)> {
        let stream_id = *self.registry_id.as_uuid();
        let envelopes = self.log.read_stream(stream_id);
        let mut runner = ProjectionRunner::new_for_stream(stream_id, CatalogProjection::new());
        if runner.run(&envelopes).is_err() {
            tracing::warn!("catalog rebuild halted on malformed registry stream");
        }
        runner.into_projection().directory().to_vec()
    }

    // ── observers ───────────────────────────────────────────────────────

    /// Subscribe to every notification published after this call.
    pub fn subscribe(&self) -> Subscription<Envelope<JsonValue>> {
        self.bus.subscribe()
    }

    /// The registry's audit trail, in sequence order.
    pub fn registry_notifications(&self) -> Vec<Envelope<JsonValue>> {
        self.log.read_stream(*self.registry_id.as_uuid())
    }

    /// One store's audit trail, in sequence order.
    pub fn store_notifications(&self, store_id: StoreId) -> Vec<Envelope<JsonValue>> {
        self.log.read_stream(*store_id.as_uuid())
    }

    // ── internals ───────────────────────────────────────────────────────

    fn store(&self, store_id: &StoreId) -> MarketResult<Arc<Mutex<StoreLedger>>> {
        self.stores
            .read()
            .map_err(poisoned)?
            .get(store_id)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    /// Dispatch a ledger command: decide, append, publish, apply.
    fn dispatch_store(
        &self,
        store_id: StoreId,
        command: StoreLedgerCommand,
    ) -> MarketResult<Vec<StoreLedgerEvent>> {
        let handle = self.store(&store_id)?;
        let mut ledger = handle.lock().map_err(poisoned)?;

        let events = ledger.handle(&command)?;
        let pre = ledger.version();
        self.commit(*store_id.as_uuid(), STORE_STREAM, pre, &events)?;
        for event in &events {
            ledger.apply(event);
        }
        Ok(events)
    }

    /// Append decided notifications to the log and fan them out on the bus.
    ///
    /// Runs before `apply`, so an append failure leaves aggregate state
    /// untouched and the caller sees the error.
    fn commit<N>(
        &self,
        stream_id: Uuid,
        stream_type: &str,
        pre_version: u64,
        events: &[N],
    ) -> MarketResult<()>
    where
        N: Notification + Serialize,
    {
        if events.is_empty() {
            return Ok(());
        }

        let mut pending = Vec::with_capacity(events.len());
        for event in events {
            pending.push(
                PendingNotification::from_notification(stream_id, stream_type, event).map_err(
                    |e| MarketError::validation(format!("serialize notification: {e}")),
                )?,
            );
        }

        let committed = self
            .log
            .append(pending, ExpectedVersion::Exact(pre_version))
            .map_err(|e| MarketError::validation(format!("notification log: {e}")))?;

        for envelope in committed {
            if self.bus.publish(envelope).is_err() {
                tracing::warn!("notification bus unavailable; observers missed an update");
            }
        }
        Ok(())
    }

    /// Publish an out-of-stream observational notification (sequence 0).
    fn publish_observational<N>(&self, stream_id: Uuid, note: &N)
    where
        N: Notification + Serialize,
    {
        let payload = match serde_json::to_value(note) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "observational notification dropped");
                return;
            }
        };
        let envelope = Envelope::new(
            Uuid::now_v7(),
            stream_id,
            QUERY_STREAM,
            0,
            note.kind(),
            note.schema_version(),
            note.occurred_at(),
            payload,
        );
        if self.bus.publish(envelope).is_err() {
            tracing::warn!("notification bus unavailable; observers missed an update");
        }
    }
}
