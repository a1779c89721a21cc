use serde::{Deserialize, Serialize};

/// Role classification of a caller identity.
///
/// Roles are **mutually exclusive**: an identity holds exactly one role at
/// any time. `Admin` and `StoreOwner` are explicit grants; `Shopper` is the
/// computed default for any identity with no explicit grant and is never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    StoreOwner,
    Shopper,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_store_owner(self) -> bool {
        matches!(self, Role::StoreOwner)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // The driver layer keys its views off these wire strings.
        match self {
            Role::Admin => f.write_str("admin"),
            Role::StoreOwner => f.write_str("storeOwner"),
            Role::Shopper => f.write_str("shopper"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_wire_strings() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::StoreOwner.to_string(), "storeOwner");
        assert_eq!(Role::Shopper.to_string(), "shopper");
    }
}
