use thiserror::Error;

use crate::catalog::ProductId;

/// Errors detected while assembling the catalog.
///
/// All of these are load-time failures: a catalog that constructs
/// successfully can be queried without error for the rest of the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate product id {0}")]
    DuplicateProduct(ProductId),

    #[error("product {product} references unknown component {component}")]
    UnknownComponent {
        product: ProductId,
        component: ProductId,
    },

    #[error("product {product} has a zero-quantity recipe line for component {component}")]
    ZeroRecipeQuantity {
        product: ProductId,
        component: ProductId,
    },
}
