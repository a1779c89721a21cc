use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketplace_access::{Role, RoleTable, require_admin, require_store_owner};
use marketplace_core::{Aggregate, AggregateRoot, Identity, MarketError, RegistryId, StoreId};
use marketplace_events::Notification;

/// Aggregate root: Registry.
///
/// Process-wide singleton by convention (one per deployment), but constructed
/// and passed explicitly; nothing here is module-level state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    id: RegistryId,
    roles: RoleTable,
    stores_by_owner: HashMap<Identity, Vec<StoreId>>,
    store_names: HashMap<StoreId, String>,
    version: u64,
    created: bool,
}

impl Registry {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: RegistryId) -> Self {
        Self {
            id,
            roles: RoleTable::new(),
            stores_by_owner: HashMap::new(),
            store_names: HashMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RegistryId {
        self.id
    }

    /// Classify a caller identity. Total: unknown identities are `Shopper`.
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.roles.role_of(identity)
    }

    /// Stores created by one owner, in creation order.
    pub fn stores_of(&self, owner: &Identity) -> &[StoreId] {
        self.stores_by_owner
            .get(owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The stores visible to a caller.
    ///
    /// A `StoreOwner` sees only their own stores, in creation order. Everyone
    /// else (`Admin`, `Shopper`) sees every store: owners in the order they
    /// were first granted `StoreOwner`, each owner's stores in creation
    /// order. The asymmetry is load-bearing; the shopper listing and the
    /// owner dashboard of the driver layer are both built on it.
    pub fn visible_stores(&self, caller: &Identity) -> Vec<StoreId> {
        match self.role_of(caller) {
            Role::StoreOwner => self.stores_of(caller).to_vec(),
            Role::Admin | Role::Shopper => {
                let mut all = Vec::new();
                for owner in self.roles.owner_order() {
                    all.extend_from_slice(self.stores_of(owner));
                }
                all
            }
        }
    }

    pub fn store_name(&self, store_id: &StoreId) -> Option<&str> {
        self.store_names.get(store_id).map(String::as_str)
    }

    pub fn is_registered(&self, store_id: &StoreId) -> bool {
        self.store_names.contains_key(store_id)
    }

    fn ensure_opened(&self) -> Result<(), MarketError> {
        if !self.created {
            return Err(MarketError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for Registry {
    type Id = RegistryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenRegistry.
///
/// The explicit initialization step of a deployment; `root_admin` receives
/// the first `Admin` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRegistry {
    pub registry_id: RegistryId,
    pub root_admin: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: GrantAdmin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAdmin {
    pub caller: Identity,
    pub target: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: GrantStoreOwner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantStoreOwner {
    pub caller: Identity,
    pub target: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreateStore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStore {
    pub caller: Identity,
    pub store_id: StoreId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryCommand {
    OpenRegistry(OpenRegistry),
    GrantAdmin(GrantAdmin),
    GrantStoreOwner(GrantStoreOwner),
    CreateStore(CreateStore),
}

/// Event: RegistryOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOpened {
    pub registry_id: RegistryId,
    pub root_admin: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdminGranted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGranted {
    pub target: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StoreOwnerGranted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOwnerGranted {
    pub target: Identity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StoreCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCreated {
    pub owner: Identity,
    pub store_id: StoreId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    RegistryOpened(RegistryOpened),
    AdminGranted(AdminGranted),
    StoreOwnerGranted(StoreOwnerGranted),
    StoreCreated(StoreCreated),
}

impl Notification for RegistryEvent {
    fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::RegistryOpened(_) => "registry.opened",
            RegistryEvent::AdminGranted(_) => "registry.admin_granted",
            RegistryEvent::StoreOwnerGranted(_) => "registry.store_owner_granted",
            RegistryEvent::StoreCreated(_) => "registry.store.created",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RegistryEvent::RegistryOpened(e) => e.occurred_at,
            RegistryEvent::AdminGranted(e) => e.occurred_at,
            RegistryEvent::StoreOwnerGranted(e) => e.occurred_at,
            RegistryEvent::StoreCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Registry {
    type Command = RegistryCommand;
    type Event = RegistryEvent;
    type Error = MarketError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistryEvent::RegistryOpened(e) => {
                self.id = e.registry_id;
                self.roles.grant_admin(e.root_admin);
                self.created = true;
            }
            RegistryEvent::AdminGranted(e) => {
                self.roles.grant_admin(e.target);
            }
            RegistryEvent::StoreOwnerGranted(e) => {
                self.roles.grant_store_owner(e.target);
            }
            RegistryEvent::StoreCreated(e) => {
                self.stores_by_owner
                    .entry(e.owner)
                    .or_default()
                    .push(e.store_id);
                self.store_names.insert(e.store_id, e.name.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistryCommand::OpenRegistry(cmd) => self.handle_open(cmd),
            RegistryCommand::GrantAdmin(cmd) => self.handle_grant_admin(cmd),
            RegistryCommand::GrantStoreOwner(cmd) => self.handle_grant_store_owner(cmd),
            RegistryCommand::CreateStore(cmd) => self.handle_create_store(cmd),
        }
    }
}

impl Registry {
    fn handle_open(&self, cmd: &OpenRegistry) -> Result<Vec<RegistryEvent>, MarketError> {
        if self.created {
            return Err(MarketError::validation("registry already opened"));
        }
        Ok(vec![RegistryEvent::RegistryOpened(RegistryOpened {
            registry_id: cmd.registry_id,
            root_admin: cmd.root_admin,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant_admin(&self, cmd: &GrantAdmin) -> Result<Vec<RegistryEvent>, MarketError> {
        self.ensure_opened()?;
        require_admin(self.role_of(&cmd.caller))?;

        // Idempotent: an existing Admin grant emits nothing.
        if self.role_of(&cmd.target) == Role::Admin {
            return Ok(vec![]);
        }

        Ok(vec![RegistryEvent::AdminGranted(AdminGranted {
            target: cmd.target,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant_store_owner(
        &self,
        cmd: &GrantStoreOwner,
    ) -> Result<Vec<RegistryEvent>, MarketError> {
        self.ensure_opened()?;
        require_admin(self.role_of(&cmd.caller))?;

        if self.role_of(&cmd.target) == Role::StoreOwner {
            return Ok(vec![]);
        }

        Ok(vec![RegistryEvent::StoreOwnerGranted(StoreOwnerGranted {
            target: cmd.target,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_store(&self, cmd: &CreateStore) -> Result<Vec<RegistryEvent>, MarketError> {
        self.ensure_opened()?;
        require_store_owner(self.role_of(&cmd.caller))?;

        if cmd.name.trim().is_empty() {
            return Err(MarketError::validation("store name cannot be empty"));
        }
        if self.is_registered(&cmd.store_id) {
            return Err(MarketError::validation("store id already registered"));
        }

        Ok(vec![RegistryEvent::StoreCreated(StoreCreated {
            owner: cmd.caller,
            store_id: cmd.store_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
