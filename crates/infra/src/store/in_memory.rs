//! In-memory pricing store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use pricebook_campaigns::{Campaign, CampaignItem, ItemStatus};
use pricebook_core::CampaignId;
use pricebook_pricing::{BundleDefinition, BundleRecord, PriceRecord};

use super::{BundleStore, CampaignItemStore, CampaignStore, PriceListStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    campaigns: HashMap<CampaignId, Campaign>,
    /// Keyed by `(campaign_id, sku)`, mirroring the relational unique key.
    items: HashMap<(CampaignId, String), CampaignItem>,
    price_list: HashMap<String, PriceRecord>,
    definitions: Vec<BundleDefinition>,
    bundles: HashMap<String, BundleRecord>,
}

/// In-memory store enforcing the same uniqueness rules as the Postgres schema
/// (unique campaign priority, unique SKU per campaign).
#[derive(Debug, Default)]
pub struct InMemoryPricingStore {
    state: RwLock<State>,
    /// Fault injection: number of `insert_items` calls allowed to succeed.
    item_insert_budget: Mutex<Option<usize>>,
}

impl InMemoryPricingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make `insert_items` fail once `successful_batches` calls went through.
    pub fn fail_item_inserts_after(&self, successful_batches: usize) {
        if let Ok(mut budget) = self.item_insert_budget.lock() {
            *budget = Some(successful_batches);
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
    }

    fn consume_insert_budget(&self) -> StoreResult<()> {
        let mut budget = self
            .item_insert_budget
            .lock()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))?;
        match budget.as_mut() {
            Some(0) => Err(StoreError::Storage("injected item insert failure".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn priority_conflict(state: &State, campaign: &Campaign) -> bool {
    state
        .campaigns
        .values()
        .any(|c| c.id != campaign.id && c.priority == campaign.priority)
}

#[async_trait::async_trait]
impl CampaignStore for InMemoryPricingStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::Conflict(format!("campaign {} already exists", campaign.id)));
        }
        if priority_conflict(&state, campaign) {
            return Err(StoreError::Conflict(format!("priority {} already in use", campaign.priority)));
        }
        let mut stored = campaign.clone();
        stored.pending_items = 0;
        state.campaigns.insert(campaign.id, stored);
        Ok(())
    }

    async fn save_campaign(&self, campaign: &Campaign) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::NotFound(format!("campaign {}", campaign.id)));
        }
        if priority_conflict(&state, campaign) {
            return Err(StoreError::Conflict(format!("priority {} already in use", campaign.priority)));
        }
        let mut stored = campaign.clone();
        stored.pending_items = 0;
        state.campaigns.insert(campaign.id, stored);
        Ok(())
    }

    async fn delete_campaign(&self, id: CampaignId) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.campaigns.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("campaign {id}")));
        }
        state.items.retain(|(campaign_id, _), _| *campaign_id != id);
        Ok(())
    }

    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        Ok(self.read()?.campaigns.get(&id).cloned())
    }

    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>> {
        let state = self.read()?;
        let mut campaigns: Vec<Campaign> = state.campaigns.values().cloned().collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(campaigns)
    }

    async fn enabled_base_campaign(&self) -> StoreResult<Option<Campaign>> {
        let state = self.read()?;
        Ok(state.campaigns.values().find(|c| c.is_base() && c.enabled).cloned())
    }

    async fn priority_taken(&self, priority: i32, except: Option<CampaignId>) -> StoreResult<bool> {
        let state = self.read()?;
        Ok(state
            .campaigns
            .values()
            .any(|c| c.priority == priority && Some(c.id) != except))
    }

    async fn set_applied(&self, ids: &[CampaignId]) -> StoreResult<()> {
        let mut state = self.write()?;
        for c in state.campaigns.values_mut() {
            c.applied = ids.contains(&c.id);
        }
        Ok(())
    }

    async fn disable_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.write()?;
        let mut disabled = 0;
        for c in state.campaigns.values_mut() {
            if c.enabled && c.is_expired_at(now) {
                c.enabled = false;
                c.updated_at = now;
                disabled += 1;
            }
        }
        Ok(disabled)
    }
}

#[async_trait::async_trait]
impl CampaignItemStore for InMemoryPricingStore {
    async fn insert_items(&self, items: &[CampaignItem]) -> StoreResult<()> {
        self.consume_insert_budget()?;
        let mut state = self.write()?;

        for item in items {
            if state.items.contains_key(&(item.campaign_id, item.sku.clone())) {
                return Err(StoreError::Conflict(format!(
                    "sku {} already exists in campaign {}",
                    item.sku, item.campaign_id
                )));
            }
        }
        for item in items {
            state.items.insert((item.campaign_id, item.sku.clone()), item.clone());
        }
        Ok(())
    }

    async fn upsert_items(&self, items: &[CampaignItem]) -> StoreResult<()> {
        let mut state = self.write()?;
        for item in items {
            let key = (item.campaign_id, item.sku.clone());
            let mut next = item.clone();
            if let Some(existing) = state.items.get(&key) {
                next.id = existing.id;
                next.created_at = existing.created_at;
            }
            state.items.insert(key, next);
        }
        Ok(())
    }

    async fn delete_items(&self, campaign_id: CampaignId) -> StoreResult<()> {
        self.write()?.items.retain(|(id, _), _| *id != campaign_id);
        Ok(())
    }

    async fn items_for(&self, campaign_id: CampaignId) -> StoreResult<Vec<CampaignItem>> {
        let state = self.read()?;
        let mut items: Vec<CampaignItem> = state
            .items
            .values()
            .filter(|i| i.campaign_id == campaign_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(items)
    }

    async fn items_by_skus(&self, campaign_id: CampaignId, skus: &[String]) -> StoreResult<Vec<CampaignItem>> {
        let state = self.read()?;
        Ok(skus
            .iter()
            .filter_map(|sku| state.items.get(&(campaign_id, sku.clone())).cloned())
            .collect())
    }

    async fn pending_counts(&self, ids: Option<&[CampaignId]>) -> StoreResult<HashMap<CampaignId, u64>> {
        let state = self.read()?;
        let mut counts = HashMap::new();
        for item in state.items.values().filter(|i| i.status == ItemStatus::Pending) {
            if ids.is_some_and(|ids| !ids.contains(&item.campaign_id)) {
                continue;
            }
            *counts.entry(item.campaign_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait::async_trait]
impl PriceListStore for InMemoryPricingStore {
    async fn load_price_list(&self) -> StoreResult<Vec<PriceRecord>> {
        let state = self.read()?;
        let mut records: Vec<PriceRecord> = state.price_list.values().cloned().collect();
        records.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(records)
    }

    async fn replace_price_list(&self, records: &[PriceRecord]) -> StoreResult<()> {
        let mut state = self.write()?;
        state.price_list = records.iter().map(|r| (r.sku.clone(), r.clone())).collect();
        Ok(())
    }

    async fn mark_prices_published(&self, skus: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        for sku in skus {
            if let Some(r) = state.price_list.get_mut(sku) {
                r.published = true;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BundleStore for InMemoryPricingStore {
    async fn load_bundle_definitions(&self) -> StoreResult<Vec<BundleDefinition>> {
        Ok(self.read()?.definitions.clone())
    }

    async fn replace_bundle_definitions(&self, definitions: &[BundleDefinition]) -> StoreResult<()> {
        self.write()?.definitions = definitions.to_vec();
        Ok(())
    }

    async fn load_bundles(&self) -> StoreResult<Vec<BundleRecord>> {
        let state = self.read()?;
        let mut records: Vec<BundleRecord> = state.bundles.values().cloned().collect();
        records.sort_by(|a, b| a.parent_sku.cmp(&b.parent_sku));
        Ok(records)
    }

    async fn replace_bundles(&self, records: &[BundleRecord]) -> StoreResult<()> {
        let mut state = self.write()?;
        state.bundles = records.iter().map(|r| (r.parent_sku.clone(), r.clone())).collect();
        Ok(())
    }

    async fn mark_bundles_published(&self, parent_skus: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        for sku in parent_skus {
            if let Some(r) = state.bundles.get_mut(sku) {
                r.published = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pricebook_campaigns::{evaluate, CampaignKind, NewCampaign};

    fn campaign(kind: CampaignKind, priority: i32) -> Campaign {
        let now = Utc::now();
        Campaign::create(
            NewCampaign {
                name: format!("c{priority}"),
                kind,
                priority,
                start: now - Duration::days(1),
                end: now + Duration::days(1),
                filename: "file:///tmp/rows.csv".to_string(),
            },
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn priority_is_unique_across_campaigns() {
        let store = InMemoryPricingStore::new();
        store.insert_campaign(&campaign(CampaignKind::Base, 0)).await.unwrap();
        let err = store
            .insert_campaign(&campaign(CampaignKind::Temporary, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.priority_taken(0, None).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_campaign_removes_its_items() {
        let store = InMemoryPricingStore::new();
        let c = campaign(CampaignKind::Temporary, 3);
        store.insert_campaign(&c).await.unwrap();
        let item = evaluate(&c.context(Utc::now()), "A", 10.0, 0.0, 100.0);
        store.insert_items(&[item]).await.unwrap();

        store.delete_campaign(c.id).await.unwrap();
        assert!(store.items_for(c.id).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_campaign(c.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_sku_in_campaign_is_a_conflict() {
        let store = InMemoryPricingStore::new();
        let c = campaign(CampaignKind::Base, 1);
        let ctx = c.context(Utc::now());
        store.insert_items(&[evaluate(&ctx, "A", 10.0, 0.0, 100.0)]).await.unwrap();
        let err = store
            .insert_items(&[evaluate(&ctx, "A", 10.0, 0.0, 90.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn upsert_keeps_identity_of_existing_rows() {
        let store = InMemoryPricingStore::new();
        let c = campaign(CampaignKind::Base, 1);
        let ctx = c.context(Utc::now());
        let first = evaluate(&ctx, "A", 10.0, 0.0, 100.0);
        store.insert_items(&[first.clone()]).await.unwrap();

        store.upsert_items(&[evaluate(&ctx, "A", 10.0, 0.0, 80.0)]).await.unwrap();
        let items = store.items_for(c.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, first.id);
        assert_eq!(items[0].price, 80.0);
    }

    #[tokio::test]
    async fn injected_failure_hits_after_budget() {
        let store = InMemoryPricingStore::new();
        let c = campaign(CampaignKind::Base, 1);
        let ctx = c.context(Utc::now());
        store.fail_item_inserts_after(1);
        store.insert_items(&[evaluate(&ctx, "A", 10.0, 0.0, 100.0)]).await.unwrap();
        assert!(store.insert_items(&[evaluate(&ctx, "B", 10.0, 0.0, 100.0)]).await.is_err());
    }

    #[tokio::test]
    async fn set_applied_clears_campaigns_left_out() {
        let store = InMemoryPricingStore::new();
        let base = campaign(CampaignKind::Base, 0);
        let sale = campaign(CampaignKind::Temporary, 5);
        store.insert_campaign(&base).await.unwrap();
        store.insert_campaign(&sale).await.unwrap();

        store.set_applied(&[base.id, sale.id]).await.unwrap();
        store.set_applied(&[base.id]).await.unwrap();

        assert!(store.get_campaign(base.id).await.unwrap().unwrap().applied);
        assert!(!store.get_campaign(sale.id).await.unwrap().unwrap().applied);
    }
}
