//! Campaign lifecycle: create, update and delete campaigns and import their
//! items from uploaded row files.
//!
//! Every validation and consistency check runs before the first write, so a
//! rejected request leaves the store untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use pricebook_campaigns::{
    evaluate, Campaign, CampaignItem, CampaignKind, CampaignUpdate, CostSource, NewCampaign, PendingBreakdown,
};
use pricebook_core::{CampaignId, DomainError};

use crate::error::ServiceResult;
use crate::row_source::{RawRow, RowSource};
use crate::store::PricingStore;

/// Items are written in batches of this size.
pub const ITEM_BATCH_SIZE: usize = 5000;

pub struct CampaignLifecycle<S: ?Sized, R: ?Sized> {
    store: Arc<S>,
    rows: Arc<R>,
}

impl<S: ?Sized, R: ?Sized> Clone for CampaignLifecycle<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            rows: self.rows.clone(),
        }
    }
}

/// Keep the last row per SKU, in first-seen order.
fn dedup_rows(rows: Vec<RawRow>) -> Vec<RawRow> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<RawRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match position.get(&row.sku) {
            Some(&i) => out[i] = row,
            None => {
                position.insert(row.sku.clone(), out.len());
                out.push(row);
            }
        }
    }
    out
}

impl<S, R> CampaignLifecycle<S, R>
where
    S: PricingStore + ?Sized,
    R: RowSource + ?Sized,
{
    pub fn new(store: Arc<S>, rows: Arc<R>) -> Self {
        Self { store, rows }
    }

    /// Base uniqueness and priority uniqueness against the stored campaigns.
    async fn check_uniqueness(&self, campaign: &Campaign, existing: Option<CampaignId>) -> ServiceResult<()> {
        if campaign.kind == CampaignKind::Base {
            if let Some(base) = self.store.enabled_base_campaign().await? {
                if Some(base.id) != existing {
                    return Err(DomainError::validation("base campaign already exists").into());
                }
            }
        }

        if self.store.priority_taken(campaign.priority, existing).await? {
            return Err(DomainError::validation("a campaign with the same priority already exists").into());
        }
        Ok(())
    }

    /// Turn rows into fresh items for `campaign`.
    ///
    /// Temporary campaigns must only reference SKUs carried by the enabled
    /// base campaign; their cost is taken from the base item.
    async fn build_items(&self, campaign: &Campaign, rows: Vec<RawRow>, now: DateTime<Utc>) -> ServiceResult<Vec<CampaignItem>> {
        let rows = dedup_rows(rows);
        let ctx = campaign.context(now);

        if campaign.is_base() {
            let items: Vec<CampaignItem> = rows
                .into_iter()
                .filter_map(|row| match row.cost {
                    Some(cost) => Some(evaluate(&ctx, &row.sku, cost, row.msrp, row.price)),
                    None => {
                        tracing::debug!(sku = %row.sku, "skipping row without cost");
                        None
                    }
                })
                .collect();
            return Ok(items);
        }

        let base = self
            .store
            .enabled_base_campaign()
            .await?
            .ok_or_else(|| DomainError::not_found("no enabled base campaign"))?;

        let skus: Vec<String> = rows.iter().map(|r| r.sku.clone()).collect();
        let base_costs: HashMap<String, f64> = self
            .store
            .items_by_skus(base.id, &skus)
            .await?
            .into_iter()
            .map(|i| (i.sku, i.cost))
            .collect();

        let unknown: Vec<String> = skus.into_iter().filter(|s| !base_costs.contains_key(s)).collect();
        if !unknown.is_empty() {
            return Err(DomainError::unknown_skus(unknown).into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let cost = base_costs.get(&row.sku).copied().unwrap_or_default();
                evaluate(&ctx, &row.sku, cost, row.msrp, row.price).with_cost_source(CostSource::Base)
            })
            .collect())
    }

    async fn insert_batched(&self, items: &[CampaignItem]) -> ServiceResult<()> {
        for batch in items.chunks(ITEM_BATCH_SIZE) {
            self.store.insert_items(batch).await?;
        }
        Ok(())
    }

    async fn upsert_batched(&self, items: &[CampaignItem]) -> ServiceResult<()> {
        for batch in items.chunks(ITEM_BATCH_SIZE) {
            self.store.upsert_items(batch).await?;
        }
        Ok(())
    }

    async fn with_pending(&self, mut campaign: Campaign) -> ServiceResult<Campaign> {
        let counts = self.store.pending_counts(Some(&[campaign.id])).await?;
        campaign.pending_items = counts.get(&campaign.id).copied().unwrap_or(0);
        Ok(campaign)
    }

    async fn load(&self, id: CampaignId) -> ServiceResult<Campaign> {
        Ok(self
            .store
            .get_campaign(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("campaign {id} not found")))?)
    }

    /// Create a (disabled) campaign and import its rows.
    #[instrument(skip(self, input), fields(name = %input.name, kind = input.kind.as_str(), priority = input.priority), err)]
    pub async fn create_campaign(&self, input: NewCampaign) -> ServiceResult<Campaign> {
        let now = Utc::now();
        let campaign = Campaign::create(input, now)?;
        self.check_uniqueness(&campaign, None).await?;

        let rows = self.rows.fetch_rows(&campaign.filename).await?;
        let items = self.build_items(&campaign, rows, now).await?;

        self.store.insert_campaign(&campaign).await?;
        if let Err(err) = self.insert_batched(&items).await {
            // No half-imported campaign is left behind.
            if let Err(cleanup) = self.store.delete_campaign(campaign.id).await {
                tracing::warn!(campaign_id = %campaign.id, error = %cleanup, "failed to remove campaign after import failure");
            }
            return Err(err);
        }

        tracing::info!(campaign_id = %campaign.id, items = items.len(), "campaign created");
        self.with_pending(campaign).await
    }

    /// Update campaign fields and, when a new file is given, its items.
    ///
    /// Temporary and non-upsert base campaigns have their items replaced;
    /// upsert base campaigns merge the file by SKU.
    #[instrument(skip(self, update), fields(campaign_id = %id), err)]
    pub async fn update_campaign(&self, id: CampaignId, update: CampaignUpdate) -> ServiceResult<Campaign> {
        let now = Utc::now();
        let mut campaign = self.load(id).await?;
        campaign.apply_update(&update, now)?;
        self.check_uniqueness(&campaign, Some(id)).await?;

        let Some(filename) = update.filename.as_deref() else {
            self.store.save_campaign(&campaign).await?;
            return self.with_pending(campaign).await;
        };

        let rows = self.rows.fetch_rows(filename).await?;

        if campaign.is_base() && campaign.upsert {
            self.store.save_campaign(&campaign).await?;
            let items = self.merge_base_rows(&campaign, rows, now).await?;
            self.upsert_batched(&items).await?;
            tracing::info!(campaign_id = %id, items = items.len(), "base campaign upserted");
        } else {
            let items = self.build_items(&campaign, rows, now).await?;
            self.store.save_campaign(&campaign).await?;
            self.store.delete_items(id).await?;
            self.insert_batched(&items).await?;
            tracing::info!(campaign_id = %id, items = items.len(), "campaign items replaced");
        }

        self.with_pending(campaign).await
    }

    /// Merge rows into the base campaign by SKU.
    ///
    /// Known SKUs keep their current cost; a different incoming cost is staged
    /// in `new_cost` for explicit approval. A SKU whose price did not move is
    /// approved without re-checking its margin. New SKUs take the row cost.
    async fn merge_base_rows(&self, campaign: &Campaign, rows: Vec<RawRow>, now: DateTime<Utc>) -> ServiceResult<Vec<CampaignItem>> {
        let rows = dedup_rows(rows);
        let ctx = campaign.context(now);
        let skus: Vec<String> = rows.iter().map(|r| r.sku.clone()).collect();
        let existing: HashMap<String, CampaignItem> = self
            .store
            .items_by_skus(campaign.id, &skus)
            .await?
            .into_iter()
            .map(|i| (i.sku.clone(), i))
            .collect();

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match existing.get(&row.sku) {
                Some(prev) => {
                    let mut item =
                        evaluate(&ctx, &row.sku, prev.cost, row.msrp, row.price).with_cost_source(CostSource::Base);
                    if row.price == prev.price {
                        item.approve(now);
                    }
                    item.new_cost = match row.cost {
                        Some(incoming) if incoming != prev.cost => Some(incoming),
                        _ => prev.new_cost,
                    };
                    items.push(item);
                }
                None => match row.cost {
                    Some(cost) => items.push(evaluate(&ctx, &row.sku, cost, row.msrp, row.price)),
                    None => tracing::debug!(sku = %row.sku, "skipping new sku without cost"),
                },
            }
        }
        Ok(items)
    }

    /// Delete a campaign and its items. The enabled base campaign is protected.
    #[instrument(skip(self), fields(campaign_id = %id), err)]
    pub async fn delete_campaign(&self, id: CampaignId) -> ServiceResult<()> {
        let campaign = self.load(id).await?;
        if campaign.is_base() && campaign.enabled {
            return Err(DomainError::invariant("the enabled base campaign cannot be deleted").into());
        }
        self.store.delete_campaign(id).await?;
        tracing::info!(campaign_id = %id, "campaign deleted");
        Ok(())
    }

    pub async fn get_campaign(&self, id: CampaignId) -> ServiceResult<Campaign> {
        let campaign = self.load(id).await?;
        self.with_pending(campaign).await
    }

    /// All campaigns, newest first, with their pending-item totals.
    pub async fn list_campaigns(&self) -> ServiceResult<Vec<Campaign>> {
        let mut campaigns = self.store.list_campaigns().await?;
        let counts = self.store.pending_counts(None).await?;
        for c in &mut campaigns {
            c.pending_items = counts.get(&c.id).copied().unwrap_or(0);
        }
        Ok(campaigns)
    }

    /// Approve the listed SKUs of a campaign regardless of their margin.
    #[instrument(skip(self, skus), fields(campaign_id = %id, count = skus.len()), err)]
    pub async fn approve_items(&self, id: CampaignId, skus: &[String]) -> ServiceResult<usize> {
        if skus.is_empty() {
            return Err(DomainError::validation("no skus to update").into());
        }
        self.load(id).await?;

        let now = Utc::now();
        let mut items = self.store.items_by_skus(id, skus).await?;
        for item in &mut items {
            item.approve(now);
        }
        self.upsert_batched(&items).await?;
        Ok(items.len())
    }

    /// Promote staged costs of base items and re-run the margin rules.
    #[instrument(skip(self, skus), fields(campaign_id = %id, count = skus.len()), err)]
    pub async fn approve_staged_costs(&self, id: CampaignId, skus: &[String]) -> ServiceResult<usize> {
        if skus.is_empty() {
            return Err(DomainError::validation("no skus to update").into());
        }
        let campaign = self.load(id).await?;
        if !campaign.is_base() {
            return Err(DomainError::validation("campaign type is not valid").into());
        }

        let ctx = campaign.context(Utc::now());
        let mut items = self.store.items_by_skus(id, skus).await?;
        items.retain_mut(|item| item.promote_staged_cost(&ctx));
        self.upsert_batched(&items).await?;
        Ok(items.len())
    }

    /// Items of the enabled base campaign with a staged cost.
    pub async fn staged_cost_items(&self) -> ServiceResult<Vec<CampaignItem>> {
        let base = self
            .store
            .enabled_base_campaign()
            .await?
            .ok_or_else(|| DomainError::not_found("no enabled base campaign"))?;
        let mut items = self.store.items_for(base.id).await?;
        items.retain(|i| i.new_cost.is_some());
        Ok(items)
    }

    pub async fn pending_breakdown(&self, id: CampaignId) -> ServiceResult<PendingBreakdown> {
        self.load(id).await?;
        let items = self.store.items_for(id).await?;
        Ok(PendingBreakdown::from_items(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_last_row_in_first_position() {
        let rows = vec![
            RawRow::new("A", 1.0, 1.0, 0.0),
            RawRow::new("B", 2.0, 1.0, 0.0),
            RawRow::new("A", 3.0, 1.0, 0.0),
        ];
        let out = dedup_rows(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sku, "A");
        assert_eq!(out[0].price, 3.0);
        assert_eq!(out[1].sku, "B");
    }
}
