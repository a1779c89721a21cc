//! Store ledger domain module.
//!
//! This crate contains the business rules for a single store: the product
//! catalog, stock levels, purchases, and the withdrawable balance. All logic
//! is deterministic domain code (no IO, no locks, no storage); the external
//! funds transfer for withdrawals is orchestrated by the service layer
//! between decision and state evolution.

pub mod ledger;

pub use ledger::{
    AddProduct, AddStock, AvailabilityChecked, BuyProduct, OpenStore, ProductAdded, ProductId,
    ProductRecord, PurchaseCompleted, RemoveStock, StockDecreased, StockIncreased, StoreLedger,
    StoreLedgerCommand, StoreLedgerEvent, StoreOpened, Withdraw, WithdrawalCompleted,
};
