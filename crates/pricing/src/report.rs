//! Partner price report: compares our catalog prices with what a storefront
//! currently lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::records::{BundleRecord, PriceRecord};

/// Effective price of a SKU (simple or bundle) in our catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogPrice {
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
}

/// Simple prices first; bundles with a positive price override by parent SKU.
pub fn merge_catalog(simple: &[PriceRecord], bundles: &[BundleRecord]) -> HashMap<String, CatalogPrice> {
    let mut catalog: HashMap<String, CatalogPrice> = simple
        .iter()
        .map(|r| {
            (
                r.sku.clone(),
                CatalogPrice {
                    price: r.price,
                    msrp: r.msrp,
                    cost: r.cost,
                },
            )
        })
        .collect();

    for bundle in bundles.iter().filter(|b| b.price > 0.0) {
        catalog.insert(
            bundle.parent_sku.clone(),
            CatalogPrice {
                price: bundle.price,
                msrp: bundle.msrp,
                cost: bundle.cost,
            },
        );
    }

    catalog
}

/// One row of a paged partner price export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerPrice {
    pub sku: String,
    /// Set for variants; the parent SKU is the catalog key.
    #[serde(default)]
    pub parent_sku: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub msrp: f64,
    #[serde(default)]
    pub cost: f64,
}

impl PartnerPrice {
    pub fn key(&self) -> &str {
        self.parent_sku.as_deref().unwrap_or(&self.sku)
    }
}

/// Flatten pages into one map. Rows without a positive price are skipped and
/// the last page wins on duplicate keys.
pub fn index_pages<I, P>(pages: I) -> HashMap<String, CatalogPrice>
where
    I: IntoIterator<Item = P>,
    P: IntoIterator<Item = PartnerPrice>,
{
    let mut out = HashMap::new();
    for page in pages {
        for row in page.into_iter().filter(|r| r.price > 0.0) {
            out.insert(
                row.key().to_string(),
                CatalogPrice {
                    price: row.price,
                    msrp: row.msrp,
                    cost: row.cost,
                },
            );
        }
    }
    out
}

/// What the storefront currently shows for a SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontItem {
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub enabled: bool,
    pub available: bool,
    pub sellable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub sku: String,
    pub name: String,
    pub storefront_price: f64,
    pub catalog_price: f64,
    pub msrp: f64,
    pub cost: f64,
    pub enabled: bool,
    pub available: bool,
    pub sellable: bool,
    pub price_changed: bool,
}

/// One row per SKU known to both sides, sorted by SKU.
pub fn compare(catalog: &HashMap<String, CatalogPrice>, storefront: &[StorefrontItem]) -> Vec<PriceComparison> {
    let mut rows: Vec<PriceComparison> = storefront
        .iter()
        .filter_map(|item| {
            let ours = catalog.get(&item.sku)?;
            Some(PriceComparison {
                sku: item.sku.clone(),
                name: item.name.clone(),
                storefront_price: item.price,
                catalog_price: ours.price,
                msrp: ours.msrp,
                cost: ours.cost,
                enabled: item.enabled,
                available: item.available,
                sellable: item.sellable,
                price_changed: item.price != ours.price,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.sku.cmp(&b.sku));
    rows.dedup_by(|a, b| a.sku == b.sku);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(sku: &str, price: f64) -> PriceRecord {
        PriceRecord {
            sku: sku.to_string(),
            price,
            msrp: 0.0,
            cost: 1.0,
            priority: 0,
            published: true,
        }
    }

    fn bundle(parent: &str, price: f64) -> BundleRecord {
        BundleRecord {
            parent_sku: parent.to_string(),
            price,
            msrp: price + 10.0,
            cost: 2.0,
            published: true,
            processed: true,
        }
    }

    fn shelf(sku: &str, price: f64) -> StorefrontItem {
        StorefrontItem {
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            price,
            enabled: true,
            available: true,
            sellable: true,
        }
    }

    #[test]
    fn priced_bundles_override_simple_prices() {
        let catalog = merge_catalog(
            &[simple("A", 10.0), simple("KIT", 50.0)],
            &[bundle("KIT", 99.0), bundle("FREE", 0.0)],
        );
        assert_eq!(catalog["A"].price, 10.0);
        assert_eq!(catalog["KIT"].price, 99.0);
        assert!(!catalog.contains_key("FREE"));
    }

    #[test]
    fn last_page_wins_and_variants_use_parent() {
        let row = |sku: &str, parent: Option<&str>, price: f64| PartnerPrice {
            sku: sku.to_string(),
            parent_sku: parent.map(str::to_string),
            price,
            msrp: 0.0,
            cost: 0.0,
        };
        let pages = vec![
            vec![row("A", None, 10.0), row("V1", Some("P"), 30.0)],
            vec![row("A", None, 12.0), row("B", None, 0.0)],
        ];

        let idx = index_pages(pages);
        assert_eq!(idx["A"].price, 12.0);
        assert_eq!(idx["P"].price, 30.0);
        assert!(!idx.contains_key("V1"));
        assert!(!idx.contains_key("B"));
    }

    #[test]
    fn compare_reports_only_shared_skus_in_order() {
        let catalog = merge_catalog(&[simple("B", 20.0), simple("A", 10.0)], &[]);
        let rows = compare(&catalog, &[shelf("B", 25.0), shelf("A", 10.0), shelf("X", 1.0)]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "A");
        assert!(!rows[0].price_changed);
        assert_eq!(rows[1].sku, "B");
        assert!(rows[1].price_changed);
        assert_eq!(rows[1].catalog_price, 20.0);
        assert_eq!(rows[1].storefront_price, 25.0);
    }
}
