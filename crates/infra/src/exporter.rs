//! CSV exports of the stored price list, bundles and price comparisons.
//!
//! Money columns are written with two decimals; every export starts with a
//! header row.

use core::str::FromStr;
use std::io::Write;
use std::sync::Arc;

use tracing::instrument;

use pricebook_core::DomainError;
use pricebook_pricing::{BundleRecord, PriceComparison, PriceRecord};

use crate::error::ServiceResult;
use crate::store::PricingStore;

const PRICE_LIST_HEADER: [&str; 5] = ["sku", "price", "msrp", "priority", "published"];
const BUNDLES_HEADER: [&str; 4] = ["sku", "price", "msrp", "published"];
const COMPARISON_HEADER: [&str; 10] = [
    "sku",
    "name",
    "storefront_price",
    "catalog_price",
    "msrp",
    "cost",
    "enabled",
    "available",
    "sellable",
    "price_changed",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which stored collection to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    PriceList,
    Bundles,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::PriceList => "price-list",
            ExportKind::Bundles => "bundles",
        }
    }
}

impl FromStr for ExportKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "price-list" => Ok(ExportKind::PriceList),
            "bundles" => Ok(ExportKind::Bundles),
            other => Err(DomainError::validation(format!("unknown export: {other}"))),
        }
    }
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Write `records` as `sku,price,msrp,priority,published`.
pub fn write_price_list<W: Write>(writer: W, records: &[PriceRecord]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(PRICE_LIST_HEADER)?;
    for r in records {
        csv.write_record([
            r.sku.clone(),
            money(r.price),
            money(r.msrp),
            r.priority.to_string(),
            r.published.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write `records` as `sku,price,msrp,published`, keyed by parent SKU.
pub fn write_bundles<W: Write>(writer: W, records: &[BundleRecord]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(BUNDLES_HEADER)?;
    for b in records {
        csv.write_record([
            b.parent_sku.clone(),
            money(b.price),
            money(b.msrp),
            b.published.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_comparisons<W: Write>(writer: W, rows: &[PriceComparison]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(COMPARISON_HEADER)?;
    for c in rows {
        csv.write_record([
            c.sku.clone(),
            c.name.clone(),
            money(c.storefront_price),
            money(c.catalog_price),
            money(c.msrp),
            money(c.cost),
            c.enabled.to_string(),
            c.available.to_string(),
            c.sellable.to_string(),
            c.price_changed.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub struct ExportService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ExportService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> ExportService<S>
where
    S: PricingStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Export a stored collection, sorted by SKU. Returns the number of rows
    /// written (header excluded).
    #[instrument(skip(self, writer), fields(export = kind.as_str()), err)]
    pub async fn export<W: Write>(&self, kind: ExportKind, writer: W) -> ServiceResult<usize> {
        let count = match kind {
            ExportKind::PriceList => {
                let mut records = self.store.load_price_list().await?;
                records.sort_by(|a, b| a.sku.cmp(&b.sku));
                write_price_list(writer, &records)?;
                records.len()
            }
            ExportKind::Bundles => {
                let mut records = self.store.load_bundles().await?;
                records.sort_by(|a, b| a.parent_sku.cmp(&b.parent_sku));
                write_bundles(writer, &records)?;
                records.len()
            }
        };
        tracing::info!(rows = count, "export written");
        Ok(count)
    }
}
