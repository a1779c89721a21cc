//! Black-box tests for the full marketplace facade.
//!
//! Exercises the end-to-end flows a deployment sees: role grants and store
//! visibility through the registry, and the catalog/stock/purchase/
//! withdrawal lifecycle of a single store.

use std::sync::Arc;

use marketplace_service::{
    Identity, MarketError, Marketplace, ProductId, RecordingTransfer, Role,
};

fn marketplace() -> (Marketplace<Arc<RecordingTransfer>>, Arc<RecordingTransfer>, Identity) {
    let rail = Arc::new(RecordingTransfer::new());
    let admin = Identity::new();
    let marketplace = Marketplace::open(admin, rail.clone()).unwrap();
    (marketplace, rail, admin)
}

#[test]
fn admin_grant_is_recognized() {
    let (marketplace, _, admin) = marketplace();
    let mike = Identity::new();

    marketplace.add_admin(admin, mike).unwrap();

    assert_eq!(marketplace.role_of(&mike).unwrap(), Role::Admin);
}

#[test]
fn store_owner_grant_is_recognized() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();

    marketplace.add_store_owner(admin, peter).unwrap();

    assert_eq!(marketplace.role_of(&peter).unwrap(), Role::StoreOwner);
}

#[test]
fn ungranted_identity_is_a_shopper() {
    let (marketplace, _, _) = marketplace();
    let mary = Identity::new();

    assert_eq!(marketplace.role_of(&mary).unwrap(), Role::Shopper);
}

#[test]
fn grants_require_an_admin_caller() {
    let (marketplace, _, _) = marketplace();
    let mary = Identity::new();

    let err = marketplace.add_store_owner(mary, Identity::new()).unwrap_err();
    assert_eq!(err, MarketError::Unauthorized);

    let err = marketplace.add_admin(mary, Identity::new()).unwrap_err();
    assert_eq!(err, MarketError::Unauthorized);
}

#[test]
fn store_owner_creates_a_store() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();

    marketplace.create_store(peter, "TestStore").unwrap();

    let stores = marketplace.get_stores(&peter).unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(marketplace.get_store_name(stores[0]).unwrap(), "TestStore");
}

#[test]
fn non_owner_cannot_create_a_store() {
    let (marketplace, _, admin) = marketplace();
    let mary = Identity::new();

    let err = marketplace.create_store(mary, "TestStore").unwrap_err();
    assert_eq!(err, MarketError::Unauthorized);

    // Admins are not store-capable either.
    let err = marketplace.create_store(admin, "TestStore").unwrap_err();
    assert_eq!(err, MarketError::Unauthorized);

    assert!(marketplace.get_stores(&mary).unwrap().is_empty());
}

#[test]
fn owner_sees_own_stores_shopper_sees_all() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    let john = Identity::new();
    let mary = Identity::new();

    marketplace.add_store_owner(admin, peter).unwrap();
    for name in ["TestStore", "TestStore1", "TestStore2", "TestStore3"] {
        marketplace.create_store(peter, name).unwrap();
    }

    marketplace.add_store_owner(admin, john).unwrap();
    marketplace.create_store(john, "Johns store").unwrap();

    // Owners see only their own stores, in creation order.
    assert_eq!(marketplace.get_stores(&peter).unwrap().len(), 4);
    assert_eq!(marketplace.get_stores(&john).unwrap().len(), 1);

    // A shopper (and an admin) sees all five across both owners.
    let all = marketplace.get_stores(&mary).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(marketplace.get_stores(&admin).unwrap(), all);

    // Peter's stores list first (he was granted first), then John's.
    let names: Vec<String> = all
        .iter()
        .map(|id| marketplace.get_store_name(*id).unwrap())
        .collect();
    assert_eq!(
        names,
        ["TestStore", "TestStore1", "TestStore2", "TestStore3", "Johns store"]
    );
}

#[test]
fn store_directory_matches_the_shopper_listing() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();

    let first = marketplace.create_store(peter, "TestStore").unwrap();
    let second = marketplace.create_store(peter, "TestStore1").unwrap();

    assert_eq!(
        marketplace.store_directory(),
        vec![
            (first, "TestStore".to_string()),
            (second, "TestStore1".to_string())
        ]
    );
}

/// The full single-store lifecycle: Carrot at id 1, price 15, stock 10;
/// restock to 15; remove down to 5; availability check fails for 10; buy 5
/// for 75; withdraw the collected 75 through the rail.
#[test]
fn store_lifecycle_end_to_end() {
    let (marketplace, rail, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();

    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 10)
        .unwrap();
    let product = marketplace.get_product(store, ProductId(1)).unwrap();
    assert_eq!(product.name, "Carrot");
    assert_eq!(product.unit_price, 15);
    assert_eq!(product.stock, 10);

    let stock = marketplace
        .add_product_stock(peter, store, ProductId(1), 5)
        .unwrap();
    assert_eq!(stock, 15);

    let stock = marketplace
        .remove_product(peter, store, ProductId(1), 10)
        .unwrap();
    assert_eq!(stock, 5);

    assert!(!marketplace.check_availability(store, ProductId(1), 10).unwrap());
    assert!(marketplace.check_availability(store, ProductId(1), 5).unwrap());

    let stock = marketplace
        .buy_product(shopper, store, ProductId(1), 5, 75)
        .unwrap();
    assert_eq!(stock, 0);
    assert_eq!(marketplace.get_store_balance(&peter, store).unwrap(), 75);

    let remaining = marketplace.withdraw_amount(peter, store, 75).unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(marketplace.get_store_balance(&peter, store).unwrap(), 0);
    assert_eq!(rail.total_to(&peter), 75);
}

#[test]
fn incorrect_payment_leaves_stock_and_balance_unchanged() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 5)
        .unwrap();

    let err = marketplace
        .buy_product(shopper, store, ProductId(1), 5, 74)
        .unwrap_err();
    assert_eq!(err, MarketError::IncorrectPayment);

    assert_eq!(marketplace.get_product(store, ProductId(1)).unwrap().stock, 5);
    assert_eq!(marketplace.get_store_balance(&peter, store).unwrap(), 0);
}

#[test]
fn purchase_requires_available_stock() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 4)
        .unwrap();

    let err = marketplace
        .buy_product(shopper, store, ProductId(1), 5, 75)
        .unwrap_err();
    assert_eq!(err, MarketError::InsufficientStock);
    assert_eq!(marketplace.get_product(store, ProductId(1)).unwrap().stock, 4);
}

#[test]
fn balance_is_visible_to_the_owner_only() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();

    assert_eq!(marketplace.get_store_balance(&peter, store).unwrap(), 0);
    assert_eq!(
        marketplace.get_store_balance(&shopper, store).unwrap_err(),
        MarketError::Unauthorized
    );
}

#[test]
fn withdrawal_from_empty_balance_is_rejected() {
    let (marketplace, rail, admin) = marketplace();
    let peter = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();

    let err = marketplace.withdraw_amount(peter, store, 1).unwrap_err();
    assert_eq!(err, MarketError::InsufficientBalance);
    assert!(rail.completed().is_empty());
}

#[test]
fn failed_transfer_rolls_the_withdrawal_back() {
    let (marketplace, rail, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 5)
        .unwrap();
    marketplace
        .buy_product(shopper, store, ProductId(1), 5, 75)
        .unwrap();

    rail.set_refusing(true);
    let err = marketplace.withdraw_amount(peter, store, 75).unwrap_err();
    assert!(matches!(err, MarketError::TransferFailed(_)));

    // Nothing moved: balance intact, no transfer recorded, no notification.
    assert_eq!(marketplace.get_store_balance(&peter, store).unwrap(), 75);
    assert!(rail.completed().is_empty());
    assert!(
        !marketplace
            .store_notifications(store)
            .iter()
            .any(|e| e.kind() == "store.withdrawal.completed")
    );

    // The rail recovering makes the same withdrawal succeed.
    rail.set_refusing(false);
    assert_eq!(marketplace.withdraw_amount(peter, store, 75).unwrap(), 0);
    assert_eq!(rail.total_to(&peter), 75);
}

#[test]
fn repeated_queries_return_identical_results() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 10)
        .unwrap();

    let first = marketplace.get_product(store, ProductId(1)).unwrap();
    let second = marketplace.get_product(store, ProductId(1)).unwrap();
    assert_eq!(first, second);

    assert_eq!(
        marketplace.get_stores(&peter).unwrap(),
        marketplace.get_stores(&peter).unwrap()
    );
    assert_eq!(
        marketplace.get_store_balance(&peter, store).unwrap(),
        marketplace.get_store_balance(&peter, store).unwrap()
    );
}

#[test]
fn audit_trail_records_the_store_history_in_order() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    let shopper = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 10)
        .unwrap();
    marketplace
        .buy_product(shopper, store, ProductId(1), 2, 30)
        .unwrap();
    marketplace.withdraw_amount(peter, store, 30).unwrap();

    let trail = marketplace.store_notifications(store);
    let kinds: Vec<&str> = trail.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        [
            "store.opened",
            "store.product.added",
            "store.purchase.completed",
            "store.withdrawal.completed"
        ]
    );

    let seqs: Vec<u64> = trail.iter().map(|e| e.sequence_number()).collect();
    assert_eq!(seqs, [1, 2, 3, 4]);

    // Refused commands leave no trace.
    let _ = marketplace.buy_product(shopper, store, ProductId(1), 100, 1);
    assert_eq!(marketplace.store_notifications(store).len(), 4);
}

#[test]
fn registry_trail_skips_idempotent_grants() {
    let (marketplace, _, admin) = marketplace();
    let mike = Identity::new();

    marketplace.add_admin(admin, mike).unwrap();
    let before = marketplace.registry_notifications().len();

    // Re-granting an identity its current role succeeds without a record.
    marketplace.add_admin(admin, mike).unwrap();
    assert_eq!(marketplace.registry_notifications().len(), before);
}

#[test]
fn subscribers_observe_availability_checks() {
    let (marketplace, _, admin) = marketplace();
    let peter = Identity::new();
    marketplace.add_store_owner(admin, peter).unwrap();
    let store = marketplace.create_store(peter, "TestStore").unwrap();
    marketplace
        .add_new_product(peter, store, ProductId(1), "Carrot", 15, 5)
        .unwrap();

    let subscription = marketplace.subscribe();
    assert!(!marketplace.check_availability(store, ProductId(1), 10).unwrap());

    let envelope = subscription.try_recv().unwrap();
    assert_eq!(envelope.kind(), "store.product.availability_checked");
    // Observational: out of stream, never sequenced.
    assert_eq!(envelope.sequence_number(), 0);
    assert_eq!(
        envelope.payload().get("available").and_then(|v| v.as_bool()),
        Some(false)
    );

    // And the ledger itself was untouched.
    assert_eq!(marketplace.get_product(store, ProductId(1)).unwrap().stock, 5);
}
