//! Price comparison reports between our catalog and partner snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use pricebook_pricing::{
    compare, index_pages, merge_catalog, CatalogPrice, PartnerPrice, PriceComparison, StorefrontItem,
};

use crate::error::ServiceResult;
use crate::store::PricingStore;

pub struct ReportService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ReportService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> ReportService<S>
where
    S: PricingStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Effective catalog prices: the stored price list overlaid with priced
    /// bundles.
    pub async fn catalog(&self) -> ServiceResult<HashMap<String, CatalogPrice>> {
        let simple = self.store.load_price_list().await?;
        let bundles = self.store.load_bundles().await?;
        Ok(merge_catalog(&simple, &bundles))
    }

    /// Compare the storefront listing with our catalog.
    #[instrument(skip(self, storefront), fields(storefront = storefront.len()), err)]
    pub async fn storefront_comparison(&self, storefront: &[StorefrontItem]) -> ServiceResult<Vec<PriceComparison>> {
        let catalog = self.catalog().await?;
        let rows = compare(&catalog, storefront);
        tracing::info!(rows = rows.len(), changed = rows.iter().filter(|r| r.price_changed).count(), "storefront comparison built");
        Ok(rows)
    }
}

/// Compare the storefront listing with a paged partner price snapshot instead
/// of our catalog.
pub fn partner_comparison<I, P>(pages: I, storefront: &[StorefrontItem]) -> Vec<PriceComparison>
where
    I: IntoIterator<Item = P>,
    P: IntoIterator<Item = PartnerPrice>,
{
    compare(&index_pages(pages), storefront)
}
