//! Pure authorization checks (checked at the command boundary).
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy check)

use marketplace_core::{Identity, MarketError, MarketResult};

use crate::Role;

/// Require the caller's resolved role to be `Admin`.
pub fn require_admin(role: Role) -> MarketResult<()> {
    if role.is_admin() {
        Ok(())
    } else {
        Err(MarketError::Unauthorized)
    }
}

/// Require the caller's resolved role to be `StoreOwner`.
pub fn require_store_owner(role: Role) -> MarketResult<()> {
    if role.is_store_owner() {
        Ok(())
    } else {
        Err(MarketError::Unauthorized)
    }
}

/// Require the caller to be the owning identity of an entity.
pub fn require_owner(caller: &Identity, owner: &Identity) -> MarketResult<()> {
    if caller == owner {
        Ok(())
    } else {
        Err(MarketError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_rejects_other_roles() {
        assert!(require_admin(Role::Admin).is_ok());
        assert_eq!(require_admin(Role::StoreOwner), Err(MarketError::Unauthorized));
        assert_eq!(require_admin(Role::Shopper), Err(MarketError::Unauthorized));
    }

    #[test]
    fn store_owner_check_rejects_other_roles() {
        assert!(require_store_owner(Role::StoreOwner).is_ok());
        assert_eq!(require_store_owner(Role::Admin), Err(MarketError::Unauthorized));
        assert_eq!(require_store_owner(Role::Shopper), Err(MarketError::Unauthorized));
    }

    #[test]
    fn owner_check_is_identity_equality() {
        let owner = Identity::new();
        let stranger = Identity::new();

        assert!(require_owner(&owner, &owner).is_ok());
        assert_eq!(require_owner(&stranger, &owner), Err(MarketError::Unauthorized));
    }
}
