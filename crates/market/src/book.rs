use std::collections::{BTreeMap, VecDeque};

use agora_core::Price;

use crate::order::{Order, Side};

/// Price key for BTreeMap ordering: bids iterate highest price first,
/// asks lowest price first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PriceKey {
    price: Price,
    side: Side,
}

impl PriceKey {
    fn new(side: Side, price: Price) -> Self {
        Self { price, side }
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.side {
            // Bids: higher price first (reverse order)
            Side::Bid => other.price.cmp(&self.price),
            // Asks: lower price first (natural order)
            Side::Ask => self.price.cmp(&other.price),
        }
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Resting orders for a single product: one priority queue per side, FIFO
/// within a price level so equal-priced orders stay distinct and fill in
/// arrival order.
///
/// Invariant: the book never holds a completed order - fully filled orders
/// are popped inside the match loop, and zero-quantity orders are rejected
/// before insertion.
#[derive(Debug, Default)]
pub struct ProductBook {
    bids: BTreeMap<PriceKey, VecDeque<Order>>,
    asks: BTreeMap<PriceKey, VecDeque<Order>>,
}

impl ProductBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order at the back of its price level.
    pub fn push(&mut self, order: Order) {
        let key = PriceKey::new(order.side, order.limit_price);
        let levels = match order.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        levels.entry(key).or_default().push_back(order);
    }

    /// Best resting price on a side: highest bid, lowest ask.
    pub fn best_price(&self, side: Side) -> Option<Price> {
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        levels.first_key_value().map(|(key, _)| key.price)
    }

    /// Whether the best bid meets or exceeds the best ask.
    pub fn is_crossed(&self) -> bool {
        match (self.best_price(Side::Bid), self.best_price(Side::Ask)) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Number of resting orders on both sides.
    pub fn order_count(&self) -> usize {
        self.bids.values().map(VecDeque::len).sum::<usize>()
            + self.asks.values().map(VecDeque::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Execute crossing trades in strict price priority: while both sides
    /// are non-empty and the best bid's limit is at least the best ask's,
    /// hand the pair to `execute` (which fills at least one of them
    /// completely or partially), then pop whichever orders completed.
    /// Returns the number of executions.
    pub fn match_crossing<F>(&mut self, mut execute: F) -> usize
    where
        F: FnMut(&mut Order, &mut Order),
    {
        let mut executions = 0;

        loop {
            let (Some(mut bid_level), Some(mut ask_level)) =
                (self.bids.first_entry(), self.asks.first_entry())
            else {
                break;
            };
            if bid_level.key().price < ask_level.key().price {
                break;
            }

            let (Some(bid), Some(ask)) =
                (bid_level.get_mut().front_mut(), ask_level.get_mut().front_mut())
            else {
                break;
            };

            execute(bid, ask);
            executions += 1;

            if bid_level.get().front().is_some_and(Order::is_complete) {
                bid_level.get_mut().pop_front();
            }
            if bid_level.get().is_empty() {
                bid_level.remove();
            }
            if ask_level.get().front().is_some_and(Order::is_complete) {
                ask_level.get_mut().pop_front();
            }
            if ask_level.get().is_empty() {
                ask_level.remove();
            }
        }

        executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{AgentAccount, ProductId, Role, Units};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn order(side: Side, quantity: Units, price: Decimal) -> Order {
        let issuer = Arc::new(AgentAccount::new(0, "tester", Role::Consumer, dec!(0)));
        let (order, _handle) = Order::new(side, issuer, ProductId(1), quantity, price, 1);
        order
    }

    fn fill_min(bid: &mut Order, ask: &mut Order) {
        let quantity = bid.remaining().min(ask.remaining());
        bid.fill(quantity);
        ask.fill(quantity);
    }

    #[test]
    fn best_price_ranks_bids_descending_and_asks_ascending() {
        let mut book = ProductBook::new();
        book.push(order(Side::Bid, 1, dec!(10)));
        book.push(order(Side::Bid, 1, dec!(12)));
        book.push(order(Side::Ask, 1, dec!(15)));
        book.push(order(Side::Ask, 1, dec!(13)));

        assert_eq!(book.best_price(Side::Bid), Some(dec!(12)));
        assert_eq!(book.best_price(Side::Ask), Some(dec!(13)));
        assert!(!book.is_crossed());
    }

    #[test]
    fn no_execution_when_prices_do_not_cross() {
        let mut book = ProductBook::new();
        book.push(order(Side::Bid, 5, dec!(9)));
        book.push(order(Side::Ask, 5, dec!(10)));

        assert_eq!(book.match_crossing(fill_min), 0);
        assert_eq!(book.order_count(), 2);
    }

    #[test]
    fn crossing_orders_fill_and_leave_the_book() {
        let mut book = ProductBook::new();
        book.push(order(Side::Bid, 5, dec!(12)));
        book.push(order(Side::Ask, 5, dec!(10)));

        assert_eq!(book.match_crossing(fill_min), 1);
        assert!(book.is_empty());
    }

    #[test]
    fn partial_remainder_rests_in_the_book() {
        let mut book = ProductBook::new();
        book.push(order(Side::Bid, 10, dec!(12)));
        book.push(order(Side::Ask, 4, dec!(10)));

        assert_eq!(book.match_crossing(fill_min), 1);
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.best_price(Side::Bid), Some(dec!(12)));
    }

    #[test]
    fn matches_sweep_price_levels_in_priority_order() {
        let mut book = ProductBook::new();
        book.push(order(Side::Ask, 10, dec!(9)));
        book.push(order(Side::Ask, 10, dec!(8)));
        book.push(order(Side::Bid, 15, dec!(10)));

        // The 8-priced ask fills completely first, then the 9-priced ask
        // absorbs the remaining 5.
        assert_eq!(book.match_crossing(fill_min), 2);
        assert_eq!(book.best_price(Side::Ask), Some(dec!(9)));
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn equal_priced_orders_fill_in_arrival_order() {
        let mut book = ProductBook::new();

        let issuer = Arc::new(AgentAccount::new(0, "tester", Role::Consumer, dec!(0)));
        let (first, first_handle) =
            Order::new(Side::Ask, issuer.clone(), ProductId(1), 5, dec!(10), 1);
        let (second, second_handle) = Order::new(Side::Ask, issuer, ProductId(1), 5, dec!(10), 1);
        book.push(first);
        book.push(second);
        book.push(order(Side::Bid, 5, dec!(10)));

        book.match_crossing(fill_min);

        assert_eq!(first_handle.remaining(), 0);
        assert_eq!(second_handle.remaining(), 5);
    }
}
