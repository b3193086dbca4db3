use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use agora_core::{AgentAccount, Price, ProductId, Units};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// A limit order resting in a product book.
///
/// Owned exclusively by the engine's book once submitted; the issuer keeps
/// only an [`OrderHandle`]. The remaining quantity is monotonically
/// non-increasing and the order leaves its book exactly when it reaches
/// zero - it is never resurrected.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub product: ProductId,
    /// Fixed unit limit price, set at creation.
    pub limit_price: Price,
    /// Round in which the order was created.
    pub round: u64,
    issuer: Arc<AgentAccount>,
    remaining: Units,
    remaining_tx: watch::Sender<Units>,
}

impl Order {
    /// Create an order together with its completion handle.
    pub(crate) fn new(
        side: Side,
        issuer: Arc<AgentAccount>,
        product: ProductId,
        quantity: Units,
        limit_price: Price,
        round: u64,
    ) -> (Self, OrderHandle) {
        let id = Uuid::new_v4();
        let (remaining_tx, remaining_rx) = watch::channel(quantity);

        let order = Self {
            id,
            side,
            product,
            limit_price,
            round,
            issuer,
            remaining: quantity,
            remaining_tx,
        };
        let handle = OrderHandle {
            id,
            product,
            submitted: quantity,
            remaining_rx,
        };

        (order, handle)
    }

    pub fn issuer(&self) -> &Arc<AgentAccount> {
        &self.issuer
    }

    pub fn remaining(&self) -> Units {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Record a fill and broadcast the new remaining quantity to the
    /// issuer's handle.
    pub(crate) fn fill(&mut self, quantity: Units) {
        debug_assert!(quantity <= self.remaining);
        self.remaining -= quantity;
        self.remaining_tx.send_replace(self.remaining);
    }
}

/// How a bounded wait on an order ended. Callers inspect this but - as a
/// matter of contract - must tolerate under-fulfilment at every verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The order completed within the wait.
    Filled,
    /// The wait lapsed after some, but not all, quantity filled.
    PartiallyFilled { remaining: Units },
    /// The wait lapsed with no fill at all.
    TimedOut { remaining: Units },
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FillOutcome::Filled)
    }

    pub fn remaining(&self) -> Units {
        match self {
            FillOutcome::Filled => 0,
            FillOutcome::PartiallyFilled { remaining } | FillOutcome::TimedOut { remaining } => {
                *remaining
            }
        }
    }
}

/// Read/wait handle retained by the order's issuer.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    pub id: OrderId,
    pub product: ProductId,
    submitted: Units,
    remaining_rx: watch::Receiver<Units>,
}

impl OrderHandle {
    pub fn remaining(&self) -> Units {
        *self.remaining_rx.borrow()
    }

    pub fn submitted(&self) -> Units {
        self.submitted
    }

    /// Wait up to `timeout` for the order to complete. Never blocks
    /// indefinitely: absence of a counterparty is normal operation, and the
    /// caller proceeds with whatever partial fill occurred.
    pub async fn wait(&mut self, timeout: Duration) -> FillOutcome {
        let completed = self.remaining_rx.wait_for(|&remaining| remaining == 0);
        // Discard the `watch::Ref` on success so `result` holds no borrow of
        // `self.remaining_rx`; the match only cares about success vs. failure.
        let result = tokio::time::timeout(timeout, completed)
            .await
            .map(|r| r.map(|_| ()));
        match result {
            Ok(Ok(_)) => FillOutcome::Filled,
            // Book dropped during shutdown: report whatever state was last
            // broadcast instead of erroring.
            Ok(Err(_)) | Err(_) => {
                let remaining = self.remaining();
                if remaining == 0 {
                    FillOutcome::Filled
                } else if remaining < self.submitted {
                    FillOutcome::PartiallyFilled { remaining }
                } else {
                    FillOutcome::TimedOut { remaining }
                }
            }
        }
    }
}
