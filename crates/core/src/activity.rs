use serde::{Deserialize, Serialize};

use crate::catalog::{ProductId, Units};

/// Verb an agent performs during its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Buy,
    Sell,
    Build,
    Consume,
}

/// One configured activity: a verb, a target product, and a quantity range.
///
/// The concrete quantity is drawn uniformly from `[min_quantity,
/// max_quantity)` once per execution; an empty range always yields
/// `min_quantity`. The activity list's order is its priority - the agent
/// loop never re-orders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub product: ProductId,
    pub min_quantity: Units,
    pub max_quantity: Units,
}
