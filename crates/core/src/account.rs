use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Price, Product, ProductId, Units};

/// Unique identifier for an agent
pub type AgentId = u32;

/// Economic role of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates raw materials out of thin air (no recipe resolution)
    Producer,
    /// Converts components into finished goods
    Manufacturer,
    /// End of the chain: buys and consumes
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Manufacturer => write!(f, "manufacturer"),
            Role::Consumer => write!(f, "consumer"),
        }
    }
}

/// Per-agent unit counts, shared between the agent's own task and the
/// matching engine (which credits/debits the counterparty during trade
/// settlement). Entries are locked individually.
#[derive(Debug, Default)]
pub struct Stock {
    units: DashMap<ProductId, Units>,
}

impl Stock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, product: ProductId, quantity: Units) {
        *self.units.entry(product).or_insert(0) += quantity;
    }

    /// Remove up to `quantity` units, clamping at what is actually held.
    /// Returns the number of units removed.
    pub fn remove(&self, product: ProductId, quantity: Units) -> Units {
        match self.units.get_mut(&product) {
            Some(mut held) => {
                let removed = quantity.min(*held);
                *held -= removed;
                removed
            }
            None => 0,
        }
    }

    pub fn quantity(&self, product: ProductId) -> Units {
        self.units.get(&product).map(|held| *held).unwrap_or(0)
    }

    /// Snapshot of all non-empty holdings.
    pub fn quantities(&self) -> HashMap<ProductId, Units> {
        self.units
            .iter()
            .filter(|entry| *entry.value() > 0)
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

/// Currency balance. No solvency check exists anywhere in the system:
/// balances may go negative, and producers are effectively unconstrained.
#[derive(Debug, Default)]
pub struct Wallet {
    balance: Mutex<Decimal>,
}

impl Wallet {
    pub fn new(initial: Decimal) -> Self {
        Self {
            balance: Mutex::new(initial),
        }
    }

    pub fn credit(&self, amount: Decimal) {
        *self.balance.lock() += amount;
    }

    pub fn debit(&self, amount: Decimal) {
        *self.balance.lock() -= amount;
    }

    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }
}

/// One agent's trading state. Shared as `Arc<AgentAccount>` between the
/// agent's own task and the engine; stock and wallet carry their own locks.
#[derive(Debug)]
pub struct AgentAccount {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    /// Fractional margin applied to reference prices to derive
    /// willingness-to-pay / willingness-to-accept limits.
    pub price_tolerance: Decimal,
    pub stock: Stock,
    pub wallet: Wallet,
}

impl AgentAccount {
    pub fn new(id: AgentId, name: impl Into<String>, role: Role, price_tolerance: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            price_tolerance,
            stock: Stock::new(),
            wallet: Wallet::new(Decimal::ZERO),
        }
    }

    /// Willingness-to-pay limit for buying one unit of `product`.
    pub fn bid_price(&self, product: &Product) -> Price {
        product.reference_price * (Decimal::ONE + self.price_tolerance)
    }

    /// Willingness-to-accept limit for selling one unit of `product`.
    pub fn ask_price(&self, product: &Product) -> Price {
        product.reference_price * (Decimal::ONE - self.price_tolerance)
    }
}
