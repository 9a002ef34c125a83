//! Storage abstraction for campaigns, items, the price list and bundles.
//!
//! Services only talk to these traits. `InMemoryPricingStore` backs tests and
//! local runs; `PostgresPricingStore` is the persistent implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use pricebook_campaigns::{Campaign, CampaignItem};
use pricebook_core::CampaignId;
use pricebook_pricing::{BundleDefinition, BundleRecord, PriceRecord};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPricingStore;
pub use postgres::PostgresPricingStore;

/// Storage error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait::async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<()>;

    /// Overwrite an existing campaign. Fails with `NotFound` when missing.
    async fn save_campaign(&self, campaign: &Campaign) -> StoreResult<()>;

    /// Delete a campaign together with all of its items.
    async fn delete_campaign(&self, id: CampaignId) -> StoreResult<()>;

    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    /// All campaigns, newest first.
    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>>;

    /// The enabled base campaign, if any.
    async fn enabled_base_campaign(&self) -> StoreResult<Option<Campaign>>;

    /// Whether another campaign (other than `except`) already uses `priority`.
    async fn priority_taken(&self, priority: i32, except: Option<CampaignId>) -> StoreResult<bool>;

    /// Mark exactly `ids` as applied; every other campaign is cleared.
    async fn set_applied(&self, ids: &[CampaignId]) -> StoreResult<()>;

    /// Disable enabled temporary campaigns whose window ended before `now`.
    /// Returns how many were switched off.
    async fn disable_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait CampaignItemStore: Send + Sync {
    async fn insert_items(&self, items: &[CampaignItem]) -> StoreResult<()>;

    /// Insert or overwrite by `(campaign_id, sku)`.
    async fn upsert_items(&self, items: &[CampaignItem]) -> StoreResult<()>;

    async fn delete_items(&self, campaign_id: CampaignId) -> StoreResult<()>;

    async fn items_for(&self, campaign_id: CampaignId) -> StoreResult<Vec<CampaignItem>>;

    async fn items_by_skus(&self, campaign_id: CampaignId, skus: &[String]) -> StoreResult<Vec<CampaignItem>>;

    /// Pending item count per campaign, restricted to `ids` when given.
    /// Campaigns without pending items are absent from the map.
    async fn pending_counts(&self, ids: Option<&[CampaignId]>) -> StoreResult<HashMap<CampaignId, u64>>;
}

#[async_trait::async_trait]
pub trait PriceListStore: Send + Sync {
    async fn load_price_list(&self) -> StoreResult<Vec<PriceRecord>>;

    /// Atomically delete every record and insert `records`.
    async fn replace_price_list(&self, records: &[PriceRecord]) -> StoreResult<()>;

    async fn mark_prices_published(&self, skus: &[String]) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait BundleStore: Send + Sync {
    async fn load_bundle_definitions(&self) -> StoreResult<Vec<BundleDefinition>>;

    async fn replace_bundle_definitions(&self, definitions: &[BundleDefinition]) -> StoreResult<()>;

    async fn load_bundles(&self) -> StoreResult<Vec<BundleRecord>>;

    /// Atomically delete every bundle record and insert `records`.
    async fn replace_bundles(&self, records: &[BundleRecord]) -> StoreResult<()>;

    async fn mark_bundles_published(&self, parent_skus: &[String]) -> StoreResult<()>;
}

/// Everything the pricing services need from storage.
pub trait PricingStore: CampaignStore + CampaignItemStore + PriceListStore + BundleStore {}

impl<T> PricingStore for T where T: CampaignStore + CampaignItemStore + PriceListStore + BundleStore {}
