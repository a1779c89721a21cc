use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use marketplace_core::Identity;

use crate::Role;

/// Materialized role grants.
///
/// Only `Admin` and `StoreOwner` entries are stored; `role_of` computes the
/// `Shopper` default for everyone else. Grants are exclusive: a newer grant
/// overwrites the older one.
///
/// The table also records the order identities were *first* granted
/// `StoreOwner`. Store listings for non-owners walk owners in that order, so
/// it is part of observable behavior, not a storage detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    grants: HashMap<Identity, Role>,
    owner_order: Vec<Identity>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an identity. Total: never fails, never allocates.
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.grants.get(identity).copied().unwrap_or(Role::Shopper)
    }

    /// Grant `Admin`, overwriting any previous explicit grant.
    pub fn grant_admin(&mut self, target: Identity) {
        self.grants.insert(target, Role::Admin);
    }

    /// Grant `StoreOwner`, overwriting any previous explicit grant.
    ///
    /// An identity re-entering `StoreOwner` keeps its original position in
    /// the owner order; its stores stay registered under it either way.
    pub fn grant_store_owner(&mut self, target: Identity) {
        self.grants.insert(target, Role::StoreOwner);
        if !self.owner_order.contains(&target) {
            self.owner_order.push(target);
        }
    }

    /// Identities in the order they were first granted `StoreOwner`.
    pub fn owner_order(&self) -> &[Identity] {
        &self.owner_order
    }

    /// Whether the identity holds an explicit (stored) grant.
    pub fn has_explicit_grant(&self, identity: &Identity) -> bool {
        self.grants.contains_key(identity)
    }
}
