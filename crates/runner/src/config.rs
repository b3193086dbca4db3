//! Config feeds: JSON catalog and agent definitions.
//!
//! Both feeds are parsed into plain data structs, then resolved into the
//! immutable domain values the simulation runs on. Every failure here is
//! fatal and surfaces before any task starts - an unresolvable product
//! reference or a malformed quantity range is never discovered mid-trade.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::{
    Activity, ActivityKind, Catalog, CatalogError, Product, ProductId, RecipeLine, Role, Units,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("agent {agent} references unknown product {product}")]
    UnknownProduct { agent: String, product: ProductId },

    #[error("agent {agent} has an inverted quantity range {min}..{max}")]
    InvalidQuantityRange {
        agent: String,
        min: Units,
        max: Units,
    },

    #[error("no agents configured")]
    NoAgents,
}

/// One catalog product as it appears in the JSON feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub reference_price: Decimal,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub id: u32,
    pub quantity: Units,
}

/// One agent as it appears in the JSON feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub price_tolerance: Decimal,
    pub activities: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub product: u32,
    pub min: Units,
    pub max: Units,
}

/// Validated agent definition, ready to run.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub role: Role,
    pub price_tolerance: Decimal,
    pub activities: Vec<Activity>,
}

/// Load the product catalog from a JSON file.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    catalog_from_str(&content)
}

/// Build the catalog from a JSON string.
pub fn catalog_from_str(json: &str) -> Result<Catalog, ConfigError> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;

    let products = entries
        .into_iter()
        .map(|entry| Product {
            id: ProductId(entry.id),
            name: entry.name.to_lowercase(),
            reference_price: entry.reference_price,
            recipe: entry
                .components
                .into_iter()
                .map(|component| RecipeLine {
                    component: ProductId(component.id),
                    quantity: component.quantity,
                })
                .collect(),
        })
        .collect();

    Ok(Catalog::new(products)?)
}

/// Load agent definitions from a JSON file and resolve them against the
/// catalog.
pub fn load_agents<P: AsRef<Path>>(
    path: P,
    catalog: &Catalog,
) -> Result<Vec<AgentSpec>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    agents_from_str(&content, catalog)
}

/// Build agent specs from a JSON string, validating every product
/// reference and quantity range.
pub fn agents_from_str(json: &str, catalog: &Catalog) -> Result<Vec<AgentSpec>, ConfigError> {
    let entries: Vec<AgentEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(ConfigError::NoAgents);
    }

    entries
        .into_iter()
        .map(|entry| {
            let activities = entry
                .activities
                .iter()
                .map(|activity| {
                    let product = ProductId(activity.product);
                    if catalog.get(product).is_none() {
                        return Err(ConfigError::UnknownProduct {
                            agent: entry.name.clone(),
                            product,
                        });
                    }
                    if activity.min > activity.max {
                        return Err(ConfigError::InvalidQuantityRange {
                            agent: entry.name.clone(),
                            min: activity.min,
                            max: activity.max,
                        });
                    }
                    Ok(Activity {
                        kind: activity.kind,
                        product,
                        min_quantity: activity.min,
                        max_quantity: activity.max,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(AgentSpec {
                name: entry.name,
                role: entry.role,
                price_tolerance: entry.price_tolerance,
                activities,
            })
        })
        .collect()
}
