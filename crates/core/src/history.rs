use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::catalog::{Catalog, Price, ProductId, Units};

/// Aggregate counters for one product in one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductRecord {
    pub desired_buy: u64,
    pub bought: u64,
    pub desired_sell: u64,
    pub sold: u64,
}

/// Append/read collaborator tracking demand and fills per round.
///
/// The resolver appends desired quantities when it issues orders; the
/// engine appends filled quantities at settlement. The only read path is
/// the price-adjustment heuristic below - the core never consults it to
/// make decisions.
#[derive(Debug, Default)]
pub struct TradeHistory {
    records: DashMap<(u64, ProductId), ProductRecord>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_desired_buy(&self, round: u64, product: ProductId, quantity: Units) {
        self.entry(round, product).desired_buy += u64::from(quantity);
    }

    pub fn record_bought(&self, round: u64, product: ProductId, quantity: Units) {
        self.entry(round, product).bought += u64::from(quantity);
    }

    pub fn record_desired_sell(&self, round: u64, product: ProductId, quantity: Units) {
        self.entry(round, product).desired_sell += u64::from(quantity);
    }

    pub fn record_sold(&self, round: u64, product: ProductId, quantity: Units) {
        self.entry(round, product).sold += u64::from(quantity);
    }

    /// Counters for `(round, product)`; all-zero when nothing was recorded.
    pub fn record(&self, round: u64, product: ProductId) -> ProductRecord {
        self.records
            .get(&(round, product))
            .map(|r| *r)
            .unwrap_or_default()
    }

    /// Demand-scaled price suggestion for the given round, derived from the
    /// previous round's counters: reference price x desired_buy / sold.
    /// With no prior history, or nothing sold (a zero denominator), this
    /// falls back to the catalog reference price rather than propagating an
    /// undefined value.
    pub fn suggested_price(&self, catalog: &Catalog, product: ProductId, round: u64) -> Price {
        let Some(entry) = catalog.get(product) else {
            return Decimal::ZERO;
        };
        if round == 0 {
            return entry.reference_price;
        }

        let prior = self.record(round - 1, product);
        if prior.sold == 0 || prior.desired_buy == 0 {
            return entry.reference_price;
        }

        entry.reference_price * Decimal::from(prior.desired_buy) / Decimal::from(prior.sold)
    }

    fn entry(
        &self,
        round: u64,
        product: ProductId,
    ) -> dashmap::mapref::one::RefMut<'_, (u64, ProductId), ProductRecord> {
        self.records.entry((round, product)).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use rust_decimal_macros::dec;

    fn catalog() -> Catalog {
        Catalog::new(vec![Product {
            id: ProductId(1),
            name: "wood".to_string(),
            reference_price: dec!(10),
            recipe: Vec::new(),
        }])
        .unwrap()
    }

    #[test]
    fn counters_accumulate_per_round() {
        let history = TradeHistory::new();
        history.record_desired_buy(1, ProductId(1), 5);
        history.record_desired_buy(1, ProductId(1), 3);
        history.record_sold(1, ProductId(1), 4);

        let record = history.record(1, ProductId(1));
        assert_eq!(record.desired_buy, 8);
        assert_eq!(record.sold, 4);
        assert_eq!(history.record(2, ProductId(1)), ProductRecord::default());
    }

    #[test]
    fn suggested_price_scales_by_demand_ratio() {
        let catalog = catalog();
        let history = TradeHistory::new();
        history.record_desired_buy(1, ProductId(1), 20);
        history.record_sold(1, ProductId(1), 10);

        // 10 x 20 / 10 = 20
        assert_eq!(
            history.suggested_price(&catalog, ProductId(1), 2),
            dec!(20)
        );
    }

    #[test]
    fn suggested_price_falls_back_without_history() {
        let catalog = catalog();
        let history = TradeHistory::new();

        // Round zero, missing record, and nothing-sold all fall back to the
        // reference price instead of dividing by zero.
        assert_eq!(history.suggested_price(&catalog, ProductId(1), 0), dec!(10));
        assert_eq!(history.suggested_price(&catalog, ProductId(1), 5), dec!(10));

        history.record_desired_buy(6, ProductId(1), 12);
        assert_eq!(history.suggested_price(&catalog, ProductId(1), 7), dec!(10));
    }
}
