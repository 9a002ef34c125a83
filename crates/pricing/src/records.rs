//! Price list and bundle records (outputs) plus their read-only inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One SKU of the final price list. Unique by `sku`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub sku: String,
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
    /// Priority of the campaign that supplied the price.
    pub priority: i32,
    pub published: bool,
}

impl PriceRecord {
    /// Price or MSRP moved; consumers must be re-notified.
    pub fn price_moved_from(&self, previous: &PriceRecord) -> bool {
        self.price != previous.price || self.msrp != previous.msrp
    }
}

/// One component of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleChild {
    pub sku: String,
    pub qty: u32,
}

/// A composite SKU made of weighted children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    pub parent_sku: String,
    pub children: Vec<BundleChild>,
}

/// Computed price of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub parent_sku: String,
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
    pub published: bool,
    /// Computed by the current run.
    pub processed: bool,
}

/// Price data of a simple SKU as seen by bundle aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkuPrice {
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
    pub published: bool,
}

impl SkuPrice {
    /// MSRP when set, else the selling price.
    pub fn list_price(&self) -> f64 {
        if self.msrp > 0.0 { self.msrp } else { self.price }
    }
}

/// Immutable lookup of the current simple-SKU price list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleSkuIndex {
    skus: HashMap<String, SkuPrice>,
}

impl SimpleSkuIndex {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PriceRecord>) -> Self {
        let skus = records
            .into_iter()
            .map(|r| {
                (
                    r.sku.clone(),
                    SkuPrice {
                        price: r.price,
                        msrp: r.msrp,
                        cost: r.cost,
                        published: r.published,
                    },
                )
            })
            .collect();
        Self { skus }
    }

    pub fn get(&self, sku: &str) -> Option<&SkuPrice> {
        self.skus.get(sku)
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

impl FromIterator<(String, SkuPrice)> for SimpleSkuIndex {
    fn from_iter<I: IntoIterator<Item = (String, SkuPrice)>>(iter: I) -> Self {
        Self {
            skus: iter.into_iter().collect(),
        }
    }
}
