use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Unit count for stock and order quantities
pub type Units = u32;

/// Unique identifier for a catalog product
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProductId(pub u32);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of a product's recipe: `quantity` units of `component`
/// are consumed per finished unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub component: ProductId,
    pub quantity: Units,
}

/// Immutable catalog product.
///
/// A product with an empty recipe is a raw material; otherwise the recipe
/// lists the components consumed to build one unit. The recipe graph across
/// the catalog must be acyclic - this is a documented precondition of the
/// resolver, not something the catalog checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub reference_price: Price,
    pub recipe: Vec<RecipeLine>,
}

impl Product {
    pub fn has_recipe(&self) -> bool {
        !self.recipe.is_empty()
    }
}

/// Immutable product lookup table, built once before any task starts.
///
/// Construction validates that every recipe line resolves to a known
/// product id with a non-zero quantity; anything else is a fatal load
/// error, never discovered mid-trade.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());
        for (pos, product) in products.iter().enumerate() {
            if index.insert(product.id, pos).is_some() {
                return Err(CatalogError::DuplicateProduct(product.id));
            }
        }

        for product in &products {
            for line in &product.recipe {
                if !index.contains_key(&line.component) {
                    return Err(CatalogError::UnknownComponent {
                        product: product.id,
                        component: line.component,
                    });
                }
                if line.quantity == 0 {
                    return Err(CatalogError::ZeroRecipeQuantity {
                        product: product.id,
                        component: line.component,
                    });
                }
            }
        }

        Ok(Self { products, index })
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.index.get(&id).map(|&pos| &self.products[pos])
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Fraction of `product`'s total per-unit component value contributed
    /// by `component` (reference price x per-unit quantity, over the sum
    /// across the whole recipe). Zero when the component is not part of the
    /// recipe or the recipe carries no value at all.
    pub fn component_cost_share(&self, product: &Product, component: ProductId) -> Decimal {
        let total = self.recipe_value(product);
        if total.is_zero() {
            return Decimal::ZERO;
        }

        let contributed: Decimal = product
            .recipe
            .iter()
            .filter(|line| line.component == component)
            .filter_map(|line| {
                self.get(line.component)
                    .map(|c| c.reference_price * Decimal::from(line.quantity))
            })
            .sum();

        contributed / total
    }

    /// Unit limit price for buying a recipe component: the end product's
    /// reference price allocated across the recipe in proportion to each
    /// component's contribution, divided down to a single unit. Falls back
    /// to the component's own reference price when the recipe carries no
    /// value (all-zero component prices).
    pub fn component_limit_price(&self, product: &Product, line: &RecipeLine) -> Price {
        let Some(component) = self.get(line.component) else {
            return Decimal::ZERO;
        };

        let total = self.recipe_value(product);
        if total.is_zero() {
            return component.reference_price;
        }

        product.reference_price * component.reference_price / total
    }

    fn recipe_value(&self, product: &Product) -> Decimal {
        product
            .recipe
            .iter()
            .filter_map(|line| {
                self.get(line.component)
                    .map(|c| c.reference_price * Decimal::from(line.quantity))
            })
            .sum()
    }
}
