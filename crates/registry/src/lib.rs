//! Registry domain module.
//!
//! This crate contains the business rules for role grants and the store
//! directory, implemented purely as deterministic domain logic (no IO, no
//! locks, no storage). The registry is the factory authority for store
//! ledgers: it decides which identities may create stores and remembers who
//! created what, but the ledgers themselves live in `marketplace-store`.

pub mod registry;

pub use registry::{
    AdminGranted, CreateStore, GrantAdmin, GrantStoreOwner, OpenRegistry, Registry,
    RegistryCommand, RegistryEvent, RegistryOpened, StoreCreated, StoreOwnerGranted,
};
