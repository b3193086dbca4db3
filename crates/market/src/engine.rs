use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{Level, debug, info};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use uuid::Uuid;

use agora_core::{AgentAccount, Catalog, Journal, Price, Product, ProductId, TradeHistory, Units};
use agora_sync::RoundBarrier;

use crate::book::ProductBook;
use crate::order::{Order, OrderHandle, OrderId, Side};

/// Executed trade between two resting orders.
///
/// Settlement is two-price: the buyer pays its own limit, the seller
/// receives its own limit, so `buy_price` and `sell_price` need not agree
/// and currency is not conserved across the trade.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: Uuid,
    pub product: ProductId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_price: Price,
    pub sell_price: Price,
    pub quantity: Units,
    pub round: u64,
    pub executed_at: DateTime<Utc>,
}

/// Central matching engine: one priority book per product, matched
/// continuously by a dedicated task.
///
/// `submit` is safe from any agent task; append and match/remove for a
/// product share that book's shard lock, so no update is ever lost between
/// a submit and a match pass.
pub struct MatchingEngine {
    catalog: Arc<Catalog>,
    books: DashMap<ProductId, ProductBook>,
    /// Set on submit, cleared when the engine picks the batch up.
    dirty: AtomicBool,
    /// Rung on submit to cut the engine's poll wait short.
    bell: Notify,
    poll_interval: Duration,
    journal: Arc<Journal>,
    history: Arc<TradeHistory>,
    trades: Mutex<Vec<Trade>>,
}

impl MatchingEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        journal: Arc<Journal>,
        history: Arc<TradeHistory>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            catalog,
            books: DashMap::new(),
            dirty: AtomicBool::new(false),
            bell: Notify::new(),
            poll_interval,
            journal,
            history,
            trades: Mutex::new(Vec::new()),
        }
    }

    /// Add a limit order to its product book and wake the engine task.
    ///
    /// A zero-quantity order completes immediately and never enters a book.
    /// Unmatched orders are not errors: the remainder rests in the book for
    /// future rounds.
    pub fn submit(
        &self,
        side: Side,
        issuer: Arc<AgentAccount>,
        product: ProductId,
        quantity: Units,
        limit_price: Price,
    ) -> OrderHandle {
        let round = self.journal.round();
        let (order, handle) = Order::new(side, issuer, product, quantity, limit_price, round);
        if quantity == 0 {
            return handle;
        }

        debug!(
            "order {}: {:?} {} x product {} @ {} (round {})",
            order.id, side, quantity, product, limit_price, round
        );

        self.books.entry(product).or_default().push(order);
        self.dirty.store(true, Ordering::Release);
        self.bell.notify_one();

        handle
    }

    /// Engine task loop: wait up to one poll interval for new orders; match
    /// everything when they arrive, signal round quiescence when they
    /// don't. Runs until the barrier's finished flag is set.
    pub async fn run(self: Arc<Self>, barrier: Arc<RoundBarrier>) {
        info!(
            "matching engine started (poll interval {:?})",
            self.poll_interval
        );

        while !barrier.is_finished() {
            match tokio::time::timeout(self.poll_interval, self.bell.notified()).await {
                Ok(()) => {
                    if self.dirty.swap(false, Ordering::AcqRel) {
                        self.match_all();
                    }
                }
                // A full poll window without new orders: the market has
                // gone quiescent for this round.
                Err(_) => barrier.market_quiescent(),
            }
        }

        info!("matching engine stopped after {} trades", self.trade_count());
    }

    /// One matching pass over every product with orders on both sides.
    pub fn match_all(&self) {
        for product in self.catalog.products() {
            let Some(mut book) = self.books.get_mut(&product.id) else {
                continue;
            };
            book.match_crossing(|bid, ask| self.execute_trade(product, bid, ask));
        }
    }

    /// Settle one crossing pair at `min(remaining)` quantity. No partial
    /// rollback ever happens: whatever does not match stays resting.
    fn execute_trade(&self, product: &Product, bid: &mut Order, ask: &mut Order) {
        let quantity = bid.remaining().min(ask.remaining());
        let round = self.journal.round();

        let buy_total = bid.limit_price * Decimal::from(quantity);
        let sell_total = ask.limit_price * Decimal::from(quantity);

        let buyer = Arc::clone(bid.issuer());
        let seller = Arc::clone(ask.issuer());

        // Stock moves 1:1; each wallet settles at its own limit price.
        buyer.stock.add(product.id, quantity);
        buyer.wallet.debit(buy_total);
        seller.stock.remove(product.id, quantity);
        seller.wallet.credit(sell_total);

        bid.fill(quantity);
        ask.fill(quantity);

        self.history.record_bought(round, product.id, quantity);
        self.history.record_sold(round, product.id, quantity);

        self.journal.append(
            Level::Info,
            format!(
                "{} bought {} units of {} for {} from {} {}",
                buyer.name, quantity, product.name, buy_total, seller.role, seller.name
            ),
        );
        self.journal.append(
            Level::Info,
            format!(
                "{} sold {} units of {} for {} to {} {}",
                seller.name, quantity, product.name, sell_total, buyer.role, buyer.name
            ),
        );

        debug!(
            "trade: {} x {} @ bid {} / ask {} (round {})",
            quantity, product.name, bid.limit_price, ask.limit_price, round
        );

        self.trades.lock().push(Trade {
            id: Uuid::new_v4(),
            product: product.id,
            buy_order_id: bid.id,
            sell_order_id: ask.id,
            buy_price: bid.limit_price,
            sell_price: ask.limit_price,
            quantity,
            round,
            executed_at: Utc::now(),
        });
    }

    /// All trades executed so far, in execution order.
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().clone()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.lock().len()
    }

    /// Orders currently resting in a product's book.
    pub fn resting_orders(&self, product: ProductId) -> usize {
        self.books
            .get(&product)
            .map(|book| book.order_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::FillOutcome;
    use agora_core::{Product, Role};
    use rust_decimal_macros::dec;

    const WOOD: ProductId = ProductId(1);

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![Product {
                id: WOOD,
                name: "wood".to_string(),
                reference_price: dec!(10),
                recipe: Vec::new(),
            }])
            .unwrap(),
        )
    }

    fn engine() -> Arc<MatchingEngine> {
        Arc::new(MatchingEngine::new(
            catalog(),
            Arc::new(Journal::new()),
            Arc::new(TradeHistory::new()),
            Duration::from_millis(100),
        ))
    }

    fn buyer() -> Arc<AgentAccount> {
        Arc::new(AgentAccount::new(0, "carpenter", Role::Manufacturer, dec!(0.2)))
    }

    fn seller_with_stock(units: Units) -> Arc<AgentAccount> {
        let account = Arc::new(AgentAccount::new(1, "mill", Role::Producer, dec!(0)));
        account.stock.add(WOOD, units);
        account
    }

    #[tokio::test]
    async fn full_cross_settles_both_sides_at_their_own_limits() {
        let engine = engine();
        let buyer = buyer();
        let seller = seller_with_stock(5);

        let mut buy = engine.submit(Side::Bid, buyer.clone(), WOOD, 5, dec!(12));
        let mut sell = engine.submit(Side::Ask, seller.clone(), WOOD, 5, dec!(10));

        engine.match_all();

        assert_eq!(buy.wait(Duration::from_millis(10)).await, FillOutcome::Filled);
        assert_eq!(sell.wait(Duration::from_millis(10)).await, FillOutcome::Filled);

        // Stock conservation: exactly five units moved seller -> buyer.
        assert_eq!(buyer.stock.quantity(WOOD), 5);
        assert_eq!(seller.stock.quantity(WOOD), 0);

        // Two-price settlement: buyer pays 5 x 12, seller receives 5 x 10.
        assert_eq!(buyer.wallet.balance(), dec!(-60));
        assert_eq!(seller.wallet.balance(), dec!(50));

        assert_eq!(engine.trade_count(), 1);
        let trade = &engine.trades()[0];
        assert_eq!(trade.quantity, 5);
        assert_eq!(trade.buy_price, dec!(12));
        assert_eq!(trade.sell_price, dec!(10));
        assert_eq!(engine.resting_orders(WOOD), 0);
    }

    #[tokio::test]
    async fn no_trade_when_bid_is_below_ask() {
        let engine = engine();
        let buyer = buyer();
        let seller = seller_with_stock(5);

        engine.submit(Side::Bid, buyer.clone(), WOOD, 5, dec!(9));
        engine.submit(Side::Ask, seller.clone(), WOOD, 5, dec!(10));

        engine.match_all();

        assert_eq!(engine.trade_count(), 0);
        assert_eq!(engine.resting_orders(WOOD), 2);
        assert_eq!(buyer.wallet.balance(), dec!(0));
        assert_eq!(seller.stock.quantity(WOOD), 5);
    }

    #[tokio::test]
    async fn partial_fill_leaves_the_remainder_resting() {
        let engine = engine();
        let buyer = buyer();
        let seller = seller_with_stock(4);

        let mut buy = engine.submit(Side::Bid, buyer.clone(), WOOD, 10, dec!(12));
        let mut sell = engine.submit(Side::Ask, seller.clone(), WOOD, 4, dec!(10));

        engine.match_all();

        assert_eq!(
            sell.wait(Duration::from_millis(10)).await,
            FillOutcome::Filled
        );
        assert_eq!(
            buy.wait(Duration::from_millis(10)).await,
            FillOutcome::PartiallyFilled { remaining: 6 }
        );
        assert_eq!(buyer.stock.quantity(WOOD), 4);
        assert_eq!(engine.resting_orders(WOOD), 1);

        // The remainder fills against a later counterparty.
        let late_seller = seller_with_stock(6);
        engine.submit(Side::Ask, late_seller, WOOD, 6, dec!(11));
        engine.match_all();

        assert_eq!(buy.wait(Duration::from_millis(10)).await, FillOutcome::Filled);
        assert_eq!(buyer.stock.quantity(WOOD), 10);
        assert_eq!(engine.resting_orders(WOOD), 0);
    }

    #[tokio::test]
    async fn zero_quantity_orders_complete_immediately() {
        let engine = engine();
        let mut handle = engine.submit(Side::Bid, buyer(), WOOD, 0, dec!(12));

        assert_eq!(
            handle.wait(Duration::from_millis(10)).await,
            FillOutcome::Filled
        );
        assert_eq!(engine.resting_orders(WOOD), 0);
    }

    #[tokio::test]
    async fn engine_task_matches_in_the_background_and_goes_quiescent() {
        let engine = engine();
        let barrier = Arc::new(RoundBarrier::new(0));
        let task = tokio::spawn(engine.clone().run(Arc::clone(&barrier)));

        barrier.start_round(1);

        let buyer = buyer();
        let seller = seller_with_stock(3);
        let mut buy = engine.submit(Side::Bid, buyer.clone(), WOOD, 3, dec!(12));
        engine.submit(Side::Ask, seller, WOOD, 3, dec!(10));

        assert_eq!(
            buy.wait(Duration::from_secs(2)).await,
            FillOutcome::Filled
        );
        assert_eq!(buyer.stock.quantity(WOOD), 3);

        // With no further orders the engine reports quiescence, which is
        // all the barrier still needs (zero agents registered).
        assert_eq!(
            barrier.advance_when_ready().await,
            agora_sync::WaitOutcome::Released
        );

        barrier.finish();
        task.await.unwrap();
    }
}
