//! Acquisition resolver: the four trading verbs an agent performs.
//!
//! One capability struct over the agent's account and the engine replaces
//! the usual scattered helpers: Buy issues orders, Consume and Build top up
//! shortfalls from the market with bounded waits, Sell manufactures its own
//! shortfall before quoting. Every verb tolerates under-fulfilment -
//! partial fills and timeouts are normal operation, never errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use agora_core::{
    AgentAccount, Catalog, Journal, Product, ProductId, RecipeLine, Role, TradeHistory, Units,
};
use agora_market::{MatchingEngine, OrderHandle, Side};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),
}

/// Trading capabilities of one agent, bound to the shared engine.
pub struct Trader {
    account: Arc<AgentAccount>,
    catalog: Arc<Catalog>,
    engine: Arc<MatchingEngine>,
    history: Arc<TradeHistory>,
    journal: Arc<Journal>,
    /// Fixed per-wait timeout for every bounded order wait.
    wait_timeout: Duration,
}

impl Trader {
    pub fn new(
        account: Arc<AgentAccount>,
        catalog: Arc<Catalog>,
        engine: Arc<MatchingEngine>,
        history: Arc<TradeHistory>,
        journal: Arc<Journal>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            account,
            catalog,
            engine,
            history,
            journal,
            wait_timeout,
        }
    }

    pub fn account(&self) -> &Arc<AgentAccount> {
        &self.account
    }

    fn product(&self, id: ProductId) -> Result<&Product, TradeError> {
        self.catalog.get(id).ok_or(TradeError::UnknownProduct(id))
    }

    /// Submit a buy order at the willingness-to-pay limit
    /// (`reference_price x (1 + tolerance)`). Does not block.
    pub fn buy(&self, product: ProductId, quantity: Units) -> Result<OrderHandle, TradeError> {
        let product = self.product(product)?;
        let limit = self.account.bid_price(product);

        self.history
            .record_desired_buy(self.journal.round(), product.id, quantity);
        debug!(
            "{} bids for {} x {} @ {}",
            self.account.name, quantity, product.name, limit
        );

        Ok(self.engine.submit(
            Side::Bid,
            Arc::clone(&self.account),
            product.id,
            quantity,
            limit,
        ))
    }

    /// Remove up to `quantity` units from stock, first buying any deficit
    /// from the market and waiting (bounded) for that single order.
    /// Consuming less than asked because the buy under-filled is silent.
    pub async fn consume(&self, product: ProductId, quantity: Units) -> Result<(), TradeError> {
        let entry = self.product(product)?;

        let available = self.account.stock.quantity(product);
        if available < quantity {
            let mut order = self.buy(product, quantity - available)?;
            let outcome = order.wait(self.wait_timeout).await;
            if !outcome.is_filled() {
                debug!(
                    "{}: buy before consume under-filled, {} still open",
                    self.account.name,
                    outcome.remaining()
                );
            }
        }

        let consumed = self.account.stock.remove(product, quantity);
        self.journal.info(format!(
            "{} consumed {} units of {}",
            self.account.name, consumed, entry.name
        ));
        Ok(())
    }

    /// Manufacture `quantity` units, buying missing components first.
    ///
    /// Producers are the single exception: they create the units
    /// unconditionally, with no recipe resolution. Everyone else expands
    /// the recipe, buys each component shortfall at its cost-share limit
    /// price, waits for each order in turn, and then builds however many
    /// units the stock that actually arrived supports - which may be zero
    /// (a silent no-op) or more than asked, since buildability is
    /// recomputed from stock alone.
    ///
    /// Returns the number of units actually built.
    pub async fn build(&self, product: ProductId, quantity: Units) -> Result<Units, TradeError> {
        let entry = self.product(product)?;

        if self.account.role == Role::Producer {
            self.account.stock.add(entry.id, quantity);
            self.journal.info(format!(
                "{} produced {} units of {}",
                self.account.name, quantity, entry.name
            ));
            return Ok(quantity);
        }

        if !entry.has_recipe() {
            return Ok(0);
        }

        // Per-unit component requirements, duplicate lines aggregated.
        let mut per_unit: BTreeMap<ProductId, Units> = BTreeMap::new();
        for line in &entry.recipe {
            *per_unit.entry(line.component).or_insert(0) += line.quantity;
        }

        // Order every component we are short of for the full batch.
        let round = self.journal.round();
        let mut pending: Vec<OrderHandle> = Vec::new();
        for (&component, &needed_per_unit) in &per_unit {
            let needed = needed_per_unit * quantity;
            let available = self.account.stock.quantity(component);
            if available < needed {
                let deficit = needed - available;
                let line = RecipeLine {
                    component,
                    quantity: needed_per_unit,
                };
                let limit = self.catalog.component_limit_price(entry, &line);

                self.history.record_desired_buy(round, component, deficit);
                debug!(
                    "{} bids for {} x component {} @ {} to build {}",
                    self.account.name, deficit, component, limit, entry.name
                );
                pending.push(self.engine.submit(
                    Side::Bid,
                    Arc::clone(&self.account),
                    component,
                    deficit,
                    limit,
                ));
            }
        }

        // Bounded-wait each order sequentially; under-fulfilment only
        // shrinks what gets built below.
        for mut order in pending {
            let outcome = order.wait(self.wait_timeout).await;
            if !outcome.is_filled() {
                debug!(
                    "{}: component order for product {} under-filled, {} still open",
                    self.account.name,
                    order.product,
                    outcome.remaining()
                );
            }
        }

        // Whatever stock is actually on hand decides the batch size.
        let mut buildable = Units::MAX;
        for (&component, &needed_per_unit) in &per_unit {
            let available = self.account.stock.quantity(component);
            buildable = buildable.min(available / needed_per_unit);
        }
        if buildable == 0 {
            debug!(
                "{} could not build any {} this round",
                self.account.name, entry.name
            );
            return Ok(0);
        }

        for (&component, &needed_per_unit) in &per_unit {
            self.account.stock.remove(component, needed_per_unit * buildable);
        }
        self.account.stock.add(entry.id, buildable);

        self.journal.info(format!(
            "{} built {} units of {}",
            self.account.name, buildable, entry.name
        ));
        Ok(buildable)
    }

    /// Offer `quantity` units at the willingness-to-accept limit
    /// (`reference_price x (1 - tolerance)`), building any shortfall first
    /// (never buying it). Selling zero units is a silent no-op.
    pub async fn sell(
        &self,
        product: ProductId,
        quantity: Units,
    ) -> Result<Option<OrderHandle>, TradeError> {
        let entry = self.product(product)?;

        let available = self.account.stock.quantity(product);
        if available < quantity {
            self.build(product, quantity - available).await?;
        }

        let to_sell = quantity.min(self.account.stock.quantity(product));
        if to_sell == 0 {
            return Ok(None);
        }

        let limit = self.account.ask_price(entry);
        self.history
            .record_desired_sell(self.journal.round(), entry.id, to_sell);
        debug!(
            "{} offers {} x {} @ {}",
            self.account.name, to_sell, entry.name, limit
        );

        Ok(Some(self.engine.submit(
            Side::Ask,
            Arc::clone(&self.account),
            entry.id,
            to_sell,
            limit,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_sync::RoundBarrier;
    use rust_decimal_macros::dec;

    const WOOD: ProductId = ProductId(1);
    const CHAIR: ProductId = ProductId(2);

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                Product {
                    id: WOOD,
                    name: "wood".to_string(),
                    reference_price: dec!(10),
                    recipe: Vec::new(),
                },
                Product {
                    id: CHAIR,
                    name: "chair".to_string(),
                    reference_price: dec!(50),
                    recipe: vec![RecipeLine {
                        component: WOOD,
                        quantity: 4,
                    }],
                },
            ])
            .unwrap(),
        )
    }

    struct Fixture {
        catalog: Arc<Catalog>,
        engine: Arc<MatchingEngine>,
        history: Arc<TradeHistory>,
        journal: Arc<Journal>,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = catalog();
            let journal = Arc::new(Journal::new());
            let history = Arc::new(TradeHistory::new());
            let engine = Arc::new(MatchingEngine::new(
                Arc::clone(&catalog),
                Arc::clone(&journal),
                Arc::clone(&history),
                Duration::from_millis(20),
            ));
            Self {
                catalog,
                engine,
                history,
                journal,
            }
        }

        fn trader(&self, name: &str, role: Role) -> Trader {
            let account = Arc::new(AgentAccount::new(0, name, role, dec!(0.2)));
            Trader::new(
                account,
                Arc::clone(&self.catalog),
                Arc::clone(&self.engine),
                Arc::clone(&self.history),
                Arc::clone(&self.journal),
                Duration::from_millis(50),
            )
        }
    }

    #[tokio::test]
    async fn build_consumes_components_and_adds_finished_goods() {
        let fixture = Fixture::new();
        let trader = fixture.trader("carpenter", Role::Manufacturer);
        trader.account().stock.add(WOOD, 10);

        let built = trader.build(CHAIR, 2).await.unwrap();

        assert_eq!(built, 2);
        assert_eq!(trader.account().stock.quantity(WOOD), 2);
        assert_eq!(trader.account().stock.quantity(CHAIR), 2);
    }

    #[tokio::test]
    async fn build_is_recomputed_from_stock_not_from_the_request() {
        let fixture = Fixture::new();
        let trader = fixture.trader("carpenter", Role::Manufacturer);
        trader.account().stock.add(WOOD, 100);

        // Plenty of wood on hand: the batch is whatever stock supports.
        let built = trader.build(CHAIR, 2).await.unwrap();

        assert_eq!(built, 25);
        assert_eq!(trader.account().stock.quantity(WOOD), 0);
        assert_eq!(trader.account().stock.quantity(CHAIR), 25);
    }

    #[tokio::test]
    async fn producers_build_unconditionally() {
        let fixture = Fixture::new();
        let trader = fixture.trader("mill", Role::Producer);

        let built = trader.build(WOOD, 5).await.unwrap();

        assert_eq!(built, 5);
        assert_eq!(trader.account().stock.quantity(WOOD), 5);
        // Even a product with a recipe needs no components from a producer.
        trader.build(CHAIR, 3).await.unwrap();
        assert_eq!(trader.account().stock.quantity(CHAIR), 3);
        assert_eq!(trader.account().stock.quantity(WOOD), 5);
    }

    #[tokio::test]
    async fn building_a_raw_material_is_a_noop_for_non_producers() {
        let fixture = Fixture::new();
        let trader = fixture.trader("carpenter", Role::Manufacturer);

        assert_eq!(trader.build(WOOD, 5).await.unwrap(), 0);
        assert_eq!(trader.account().stock.quantity(WOOD), 0);
    }

    #[tokio::test]
    async fn build_buys_missing_components_from_the_market() {
        let fixture = Fixture::new();
        let barrier = Arc::new(RoundBarrier::new(0));
        let engine_task =
            tokio::spawn(Arc::clone(&fixture.engine).run(Arc::clone(&barrier)));

        // A producer has wood resting on the book below the component
        // limit price (50 x 10 / 40 = 12.5 per unit).
        let mill = fixture.trader("mill", Role::Producer);
        mill.build(WOOD, 8).await.unwrap();
        mill.sell(WOOD, 8).await.unwrap();

        let carpenter = fixture.trader("carpenter", Role::Manufacturer);
        let built = carpenter.build(CHAIR, 2).await.unwrap();

        assert_eq!(built, 2);
        assert_eq!(carpenter.account().stock.quantity(CHAIR), 2);
        assert_eq!(carpenter.account().stock.quantity(WOOD), 0);
        assert_eq!(mill.account().stock.quantity(WOOD), 0);

        barrier.finish();
        engine_task.await.unwrap();
    }

    #[tokio::test]
    async fn consume_tolerates_an_empty_market() {
        let fixture = Fixture::new();
        let trader = fixture.trader("family", Role::Consumer);
        trader.account().stock.add(WOOD, 1);

        // Nobody is selling: the deficit buy times out, and consumption
        // silently takes what is there.
        trader.consume(WOOD, 3).await.unwrap();

        assert_eq!(trader.account().stock.quantity(WOOD), 0);
        assert_eq!(fixture.engine.resting_orders(WOOD), 1);
    }

    #[tokio::test]
    async fn consume_without_shortfall_skips_the_market() {
        let fixture = Fixture::new();
        let trader = fixture.trader("family", Role::Consumer);
        trader.account().stock.add(WOOD, 5);

        trader.consume(WOOD, 3).await.unwrap();

        assert_eq!(trader.account().stock.quantity(WOOD), 2);
        assert_eq!(fixture.engine.resting_orders(WOOD), 0);
    }

    #[tokio::test]
    async fn sell_builds_its_shortfall_instead_of_buying() {
        let fixture = Fixture::new();
        let trader = fixture.trader("carpenter", Role::Manufacturer);
        trader.account().stock.add(WOOD, 8);

        let handle = trader.sell(CHAIR, 2).await.unwrap();

        let handle = handle.expect("two chairs were buildable");
        assert_eq!(handle.submitted(), 2);
        // Stock holds the chairs until settlement; the wood is gone.
        assert_eq!(trader.account().stock.quantity(CHAIR), 2);
        assert_eq!(trader.account().stock.quantity(WOOD), 0);
        assert_eq!(fixture.engine.resting_orders(CHAIR), 1);
        // No buy order for wood was ever issued.
        assert_eq!(fixture.engine.resting_orders(WOOD), 0);
    }

    #[tokio::test]
    async fn selling_nothing_is_silent() {
        let fixture = Fixture::new();
        let trader = fixture.trader("family", Role::Consumer);

        // No stock and nothing buildable: no order reaches the book.
        let handle = trader.sell(CHAIR, 2).await.unwrap();

        assert!(handle.is_none());
        assert_eq!(fixture.engine.resting_orders(CHAIR), 0);
    }

    #[tokio::test]
    async fn buy_records_desired_demand() {
        let fixture = Fixture::new();
        fixture.journal.set_round(3);
        let trader = fixture.trader("family", Role::Consumer);

        trader.buy(WOOD, 7).unwrap();

        assert_eq!(fixture.history.record(3, WOOD).desired_buy, 7);
        assert_eq!(
            trader.buy(ProductId(9), 1).unwrap_err(),
            TradeError::UnknownProduct(ProductId(9))
        );
    }
}
