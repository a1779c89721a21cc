use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketplace_core::{Aggregate, AggregateRoot, Identity, MarketError, StoreId};
use marketplace_events::Notification;

/// Product identifier, chosen by the store owner. Must be positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A catalog entry. Once inserted it is never removed; only `stock` mutates.
///
/// `unit_price` is in the smallest currency unit (e.g., cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub unit_price: u64,
    pub stock: u64,
}

/// Aggregate root: StoreLedger.
///
/// One instance per created store. Owner and name are set at opening and
/// immutable thereafter. `balance` equals the sum of completed purchase
/// proceeds minus completed withdrawals; stock and balance are unsigned and
/// every mutation is checked, so neither can underflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLedger {
    id: StoreId,
    owner: Option<Identity>,
    name: String,
    products: BTreeMap<ProductId, ProductRecord>,
    balance: u64,
    version: u64,
    created: bool,
}

impl StoreLedger {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: StoreId) -> Self {
        Self {
            id,
            owner: None,
            name: String::new(),
            products: BTreeMap::new(),
            balance: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StoreId {
        self.id
    }

    pub fn owner(&self) -> Option<Identity> {
        self.owner
    }

    /// The store's display name. No authorization required.
    pub fn store_name(&self) -> &str {
        &self.name
    }

    /// Look up a catalog entry.
    pub fn product(&self, product_id: &ProductId) -> Result<&ProductRecord, MarketError> {
        self.products.get(product_id).ok_or(MarketError::NotFound)
    }

    /// Whether at least `quantity` units of the product are in stock.
    ///
    /// Total: unknown products are simply unavailable. Pure; the
    /// observational notification is emitted by the service layer.
    pub fn check_availability(&self, product_id: &ProductId, quantity: u64) -> bool {
        self.products
            .get(product_id)
            .is_some_and(|p| p.stock >= quantity)
    }

    /// Collected balance, visible to the owner only.
    pub fn balance_for(&self, caller: &Identity) -> Result<u64, MarketError> {
        self.ensure_owner(caller)?;
        Ok(self.balance)
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.products.keys()
    }

    fn ensure_opened(&self) -> Result<(), MarketError> {
        if !self.created {
            return Err(MarketError::NotFound);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &Identity) -> Result<(), MarketError> {
        if self.owner.as_ref() != Some(caller) {
            return Err(MarketError::Unauthorized);
        }
        Ok(())
    }
}

impl AggregateRoot for StoreLedger {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenStore.
///
/// Issued by the service when the registry decides `StoreCreated`; the
/// opening values are the constructor arguments of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStore {
    pub store_id: StoreId,
    pub owner: Identity,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProduct {
    pub caller: Identity,
    pub product_id: ProductId,
    pub name: String,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStock {
    pub caller: Identity,
    pub product_id: ProductId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveStock {
    pub caller: Identity,
    pub product_id: ProductId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BuyProduct.
///
/// `payment` is the amount collected by the external payment layer. A
/// refusal means the funds were never absorbed into the store balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyProduct {
    pub buyer: Identity,
    pub product_id: ProductId,
    pub quantity: u64,
    pub payment: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub caller: Identity,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreLedgerCommand {
    OpenStore(OpenStore),
    AddProduct(AddProduct),
    AddStock(AddStock),
    RemoveStock(RemoveStock),
    BuyProduct(BuyProduct),
    Withdraw(Withdraw),
}

/// Event: StoreOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOpened {
    pub store_id: StoreId,
    pub owner: Identity,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAdded {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: u64,
    pub stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIncreased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIncreased {
    pub product_id: ProductId,
    pub remaining_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockDecreased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecreased {
    pub product_id: ProductId,
    pub remaining_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseCompleted.
///
/// The single point where money and stock move together; both changes land
/// in one `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCompleted {
    pub product_id: ProductId,
    pub buyer: Identity,
    pub quantity: u64,
    pub payment: u64,
    pub remaining_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WithdrawalCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalCompleted {
    pub owner: Identity,
    pub amount: u64,
    pub remaining_balance: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreLedgerEvent {
    StoreOpened(StoreOpened),
    ProductAdded(ProductAdded),
    StockIncreased(StockIncreased),
    StockDecreased(StockDecreased),
    PurchaseCompleted(PurchaseCompleted),
    WithdrawalCompleted(WithdrawalCompleted),
}

impl Notification for StoreLedgerEvent {
    fn kind(&self) -> &'static str {
        match self {
            StoreLedgerEvent::StoreOpened(_) => "store.opened",
            StoreLedgerEvent::ProductAdded(_) => "store.product.added",
            StoreLedgerEvent::StockIncreased(_) => "store.product.stock_increased",
            StoreLedgerEvent::StockDecreased(_) => "store.product.stock_decreased",
            StoreLedgerEvent::PurchaseCompleted(_) => "store.purchase.completed",
            StoreLedgerEvent::WithdrawalCompleted(_) => "store.withdrawal.completed",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StoreLedgerEvent::StoreOpened(e) => e.occurred_at,
            StoreLedgerEvent::ProductAdded(e) => e.occurred_at,
            StoreLedgerEvent::StockIncreased(e) => e.occurred_at,
            StoreLedgerEvent::StockDecreased(e) => e.occurred_at,
            StoreLedgerEvent::PurchaseCompleted(e) => e.occurred_at,
            StoreLedgerEvent::WithdrawalCompleted(e) => e.occurred_at,
        }
    }
}

/// Observational notification: a caller checked product availability.
///
/// Not part of the ledger stream (no state change, no version bump); the
/// service layer publishes it for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChecked {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub available: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Notification for AvailabilityChecked {
    fn kind(&self) -> &'static str {
        "store.product.availability_checked"
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Aggregate for StoreLedger {
    type Command = StoreLedgerCommand;
    type Event = StoreLedgerEvent;
    type Error = MarketError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StoreLedgerEvent::StoreOpened(e) => {
                self.id = e.store_id;
                self.owner = Some(e.owner);
                self.name = e.name.clone();
                self.created = true;
            }
            StoreLedgerEvent::ProductAdded(e) => {
                self.products.insert(
                    e.product_id,
                    ProductRecord {
                        name: e.name.clone(),
                        unit_price: e.unit_price,
                        stock: e.stock,
                    },
                );
            }
            StoreLedgerEvent::StockIncreased(e) => {
                if let Some(product) = self.products.get_mut(&e.product_id) {
                    product.stock = e.remaining_stock;
                }
            }
            StoreLedgerEvent::StockDecreased(e) => {
                if let Some(product) = self.products.get_mut(&e.product_id) {
                    product.stock = e.remaining_stock;
                }
            }
            StoreLedgerEvent::PurchaseCompleted(e) => {
                if let Some(product) = self.products.get_mut(&e.product_id) {
                    product.stock = e.remaining_stock;
                }
                self.balance += e.payment;
            }
            StoreLedgerEvent::WithdrawalCompleted(e) => {
                self.balance = e.remaining_balance;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StoreLedgerCommand::OpenStore(cmd) => self.handle_open(cmd),
            StoreLedgerCommand::AddProduct(cmd) => self.handle_add_product(cmd),
            StoreLedgerCommand::AddStock(cmd) => self.handle_add_stock(cmd),
            StoreLedgerCommand::RemoveStock(cmd) => self.handle_remove_stock(cmd),
            StoreLedgerCommand::BuyProduct(cmd) => self.handle_buy(cmd),
            StoreLedgerCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl StoreLedger {
    fn handle_open(&self, cmd: &OpenStore) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        if self.created {
            return Err(MarketError::validation("store already opened"));
        }
        if cmd.name.trim().is_empty() {
            return Err(MarketError::validation("store name cannot be empty"));
        }
        Ok(vec![StoreLedgerEvent::StoreOpened(StoreOpened {
            store_id: cmd.store_id,
            owner: cmd.owner,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_product(&self, cmd: &AddProduct) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        self.ensure_opened()?;
        self.ensure_owner(&cmd.caller)?;

        if cmd.product_id.0 == 0 {
            return Err(MarketError::validation("product id must be positive"));
        }
        if cmd.name.trim().is_empty() {
            return Err(MarketError::validation("product name cannot be empty"));
        }
        if self.products.contains_key(&cmd.product_id) {
            return Err(MarketError::DuplicateProduct);
        }

        Ok(vec![StoreLedgerEvent::ProductAdded(ProductAdded {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            unit_price: cmd.unit_price,
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_stock(&self, cmd: &AddStock) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        self.ensure_opened()?;
        self.ensure_owner(&cmd.caller)?;

        if cmd.amount == 0 {
            return Err(MarketError::validation("amount cannot be zero"));
        }
        let product = self.product(&cmd.product_id)?;
        let remaining_stock = product
            .stock
            .checked_add(cmd.amount)
            .ok_or(MarketError::Overflow)?;

        Ok(vec![StoreLedgerEvent::StockIncreased(StockIncreased {
            product_id: cmd.product_id,
            remaining_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_stock(&self, cmd: &RemoveStock) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        self.ensure_opened()?;
        self.ensure_owner(&cmd.caller)?;

        if cmd.amount == 0 {
            return Err(MarketError::validation("amount cannot be zero"));
        }
        let product = self.product(&cmd.product_id)?;
        if cmd.amount > product.stock {
            return Err(MarketError::InsufficientStock);
        }

        Ok(vec![StoreLedgerEvent::StockDecreased(StockDecreased {
            product_id: cmd.product_id,
            remaining_stock: product.stock - cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_buy(&self, cmd: &BuyProduct) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        self.ensure_opened()?;

        if cmd.quantity == 0 {
            return Err(MarketError::validation("quantity cannot be zero"));
        }
        let product = self.product(&cmd.product_id)?;
        if cmd.quantity > product.stock {
            return Err(MarketError::InsufficientStock);
        }

        let cost = product
            .unit_price
            .checked_mul(cmd.quantity)
            .ok_or(MarketError::Overflow)?;
        if cmd.payment != cost {
            return Err(MarketError::IncorrectPayment);
        }
        self.balance
            .checked_add(cmd.payment)
            .ok_or(MarketError::Overflow)?;

        Ok(vec![StoreLedgerEvent::PurchaseCompleted(PurchaseCompleted {
            product_id: cmd.product_id,
            buyer: cmd.buyer,
            quantity: cmd.quantity,
            payment: cmd.payment,
            remaining_stock: product.stock - cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<StoreLedgerEvent>, MarketError> {
        self.ensure_opened()?;
        self.ensure_owner(&cmd.caller)?;

        if cmd.amount == 0 {
            return Err(MarketError::validation("amount cannot be zero"));
        }
        if cmd.amount > self.balance {
            return Err(MarketError::InsufficientBalance);
        }

        Ok(vec![StoreLedgerEvent::WithdrawalCompleted(
            WithdrawalCompleted {
                owner: cmd.caller,
                amount: cmd.amount,
                remaining_balance: self.balance - cmd.amount,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}


#[cfg(test)]
mod properties {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        AddProduct { id: u64, unit_price: u64, stock: u64 },
        AddStock { id: u64, amount: u64 },
        RemoveStock { id: u64, amount: u64 },
        Buy { id: u64, quantity: u64, pay_exact: bool, slack: u64 },
        Withdraw { amount: u64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..4, 0u64..100, 0u64..50)
                .prop_map(|(id, unit_price, stock)| Op::AddProduct { id, unit_price, stock }),
            (1u64..4, 1u64..50).prop_map(|(id, amount)| Op::AddStock { id, amount }),
            (1u64..4, 1u64..50).prop_map(|(id, amount)| Op::RemoveStock { id, amount }),
            (1u64..4, 1u64..20, proptest::bool::ANY, 1u64..10)
                .prop_map(|(id, quantity, pay_exact, slack)| Op::Buy {
                    id,
                    quantity,
                    pay_exact,
                    slack,
                }),
            (1u64..2000).prop_map(|amount| Op::Withdraw { amount }),
        ]
    }

    proptest! {
        /// Any interleaving of valid and invalid commands keeps the ledger
        /// accounting identity: balance == sum of accepted payments minus
        /// sum of accepted withdrawals, and stock levels match the model.
        /// Refusals leave state untouched.
        #[test]
        fn ledger_accounting_holds(ops in proptest::collection::vec(op_strategy(), 1..64)) {
            let owner = Identity::new();
            let buyer = Identity::new();
            let at = Utc::now();

            let mut ledger = StoreLedger::empty(StoreId::new());
            let opened = ledger
                .handle(&StoreLedgerCommand::OpenStore(OpenStore {
                    store_id: ledger.id_typed(),
                    owner,
                    name: "PropStore".to_string(),
                    occurred_at: at,
                }))
                .unwrap();
            for event in &opened {
                ledger.apply(event);
            }

            let mut model_stock: BTreeMap<u64, u64> = BTreeMap::new();
            let mut model_prices: BTreeMap<u64, u64> = BTreeMap::new();
            let mut paid_in: u64 = 0;
            let mut paid_out: u64 = 0;

            for op in ops {
                let cmd = match op {
                    Op::AddProduct { id, unit_price, stock } => {
                        StoreLedgerCommand::AddProduct(AddProduct {
                            caller: owner,
                            product_id: ProductId(id),
                            name: format!("product-{id}"),
                            unit_price,
                            stock,
                            occurred_at: at,
                        })
                    }
                    Op::AddStock { id, amount } => StoreLedgerCommand::AddStock(AddStock {
                        caller: owner,
                        product_id: ProductId(id),
                        amount,
                        occurred_at: at,
                    }),
                    Op::RemoveStock { id, amount } => {
                        StoreLedgerCommand::RemoveStock(RemoveStock {
                            caller: owner,
                            product_id: ProductId(id),
                            amount,
                            occurred_at: at,
                        })
                    }
                    Op::Buy { id, quantity, pay_exact, slack } => {
                        let cost = model_prices
                            .get(&id)
                            .and_then(|price| price.checked_mul(quantity))
                            .unwrap_or(0);
                        let payment = if pay_exact { cost } else { cost.wrapping_add(slack) };
                        StoreLedgerCommand::BuyProduct(BuyProduct {
                            buyer,
                            product_id: ProductId(id),
                            quantity,
                            payment,
                            occurred_at: at,
                        })
                    }
                    Op::Withdraw { amount } => StoreLedgerCommand::Withdraw(Withdraw {
                        caller: owner,
                        amount,
                        occurred_at: at,
                    }),
                };

                let before = ledger.clone();
                match ledger.handle(&cmd) {
                    Ok(events) => {
                        for event in &events {
                            ledger.apply(event);
                        }
                        // Mirror the accepted command in the model.
                        match &cmd {
                            StoreLedgerCommand::AddProduct(c) => {
                                model_stock.insert(c.product_id.0, c.stock);
                                model_prices.insert(c.product_id.0, c.unit_price);
                            }
                            StoreLedgerCommand::AddStock(c) => {
                                *model_stock.get_mut(&c.product_id.0).unwrap() += c.amount;
                            }
                            StoreLedgerCommand::RemoveStock(c) => {
                                *model_stock.get_mut(&c.product_id.0).unwrap() -= c.amount;
                            }
                            StoreLedgerCommand::BuyProduct(c) => {
                                *model_stock.get_mut(&c.product_id.0).unwrap() -= c.quantity;
                                paid_in += c.payment;
                            }
                            StoreLedgerCommand::Withdraw(c) => {
                                paid_out += c.amount;
                            }
                            StoreLedgerCommand::OpenStore(_) => unreachable!(),
                        }
                    }
                    Err(_) => {
                        // A refusal must leave state untouched.
                        prop_assert_eq!(&ledger, &before);
                    }
                }

                prop_assert_eq!(ledger.balance_for(&owner).unwrap(), paid_in - paid_out);
                for (id, stock) in &model_stock {
                    prop_assert_eq!(ledger.product(&ProductId(*id)).unwrap().stock, *stock);
                }
            }
        }
    }
}
