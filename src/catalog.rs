//! Product catalog: the fixed set of products available for recommendation.
//!
//! Loaded once at startup (bundled JSON or a file from `[catalog] path`)
//! and read-only afterwards. Order is significant: recommendation results
//! are always presented in catalog order.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

/// Catalog compiled into the binary, used when no path is configured.
const BUNDLED_CATALOG: &str = include_str!("../data/products.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(serialize_with = "serialize_price")]
    pub price: f64,
    pub description: String,
}

/// Whole prices as JSON integers (`52990`, not `52990.0`).
fn serialize_price<S: Serializer>(price: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    // Largest range where every integer is exact in an f64
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if price.fract() == 0.0 && price.abs() < EXACT {
        serializer.serialize_i64(*price as i64)
    } else {
        serializer.serialize_f64(*price)
    }
}

/// Immutable ordered product list with unique ids.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    /// Pretty-printed product list, embedded in every recommendation prompt.
    prompt_json: String,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids and negative or non-finite prices.
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(products.len());
        for product in &products {
            if !seen.insert(product.id) {
                bail!("Duplicate product id {} in catalog", product.id);
            }
            if !product.price.is_finite() || product.price < 0.0 {
                bail!(
                    "Product {} ({}) has an invalid price: {}",
                    product.id,
                    product.name,
                    product.price
                );
            }
        }
        let prompt_json = serde_json::to_string_pretty(&products)?;
        Ok(Self {
            products,
            prompt_json,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let products: Vec<Product> =
            serde_json::from_str(json).context("Catalog is not a JSON array of products")?;
        Self::new(products)
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read catalog {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Loads from `path` when given, otherwise the bundled catalog.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self> {
        let catalog = match path {
            Some(path) => {
                info!("Loading catalog from {}", path.display());
                Self::load(path)?
            }
            None => {
                info!("Using bundled catalog");
                Self::bundled()?
            }
        };
        if catalog.is_empty() {
            warn!("Catalog is empty, recommendations will never match");
        } else {
            info!("Catalog: {} products", catalog.len());
        }
        Ok(catalog)
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

    /// Products whose id is in `ids`, in catalog order.
    ///
    /// Ids that match no product are ignored.
    pub fn filter_by_ids(&self, ids: &BTreeSet<i64>) -> Vec<Product> {
        self.products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect()
    }

    /// Pretty-printed JSON, as embedded in the recommendation prompt.
    pub fn prompt_json(&self) -> &str {
        &self.prompt_json
    }
}

#[cfg(test)]
pub(crate) fn product(id: i64, name: &str, price: f64) -> Product {
    Product {
        id,
        name: name.to_string(),
        category: "Test".to_string(),
        price,
        description: format!("{name} description"),
    }
}
