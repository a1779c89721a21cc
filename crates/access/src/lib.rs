//! `marketplace-access` — pure access-control boundary.
//!
//! This crate classifies caller identities into roles and provides the
//! authorization checks the registry and store ledgers enforce. It is
//! intentionally decoupled from storage and transport: no IO, no panics,
//! no business logic.

pub mod authorize;
pub mod roles;
pub mod table;

pub use authorize::{require_admin, require_owner, require_store_owner};
pub use roles::Role;
pub use table::RoleTable;
