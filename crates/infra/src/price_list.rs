//! Price-list run: resolve the simple-SKU price list and publish it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use pricebook_core::DomainError;
use pricebook_events::{FanoutPublisher, PriceMessage, PublishReport};
use pricebook_pricing::{resolve, PriceRecord, PriorityTiers, PublishGate};

use crate::error::ServiceResult;
use crate::store::PricingStore;

/// Result of a build run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<T> {
    pub records: Vec<T>,
    /// The stored snapshot was replaced.
    pub persisted: bool,
}

pub struct PriceListService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for PriceListService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> PriceListService<S>
where
    S: PricingStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve the price list as of `now` and persist it when it changed.
    ///
    /// Exactly the participating campaigns end up applied, and expired temporary
    /// campaigns are switched off afterwards, whether or not anything was
    /// persisted.
    #[instrument(skip(self), err)]
    pub async fn build(&self, now: DateTime<Utc>) -> ServiceResult<RunOutcome<PriceRecord>> {
        let base = self
            .store
            .enabled_base_campaign()
            .await?
            .ok_or_else(|| DomainError::not_found("no enabled base campaign"))?;
        let base_items = self.store.items_for(base.id).await?;

        let mut tiers = PriorityTiers::new();
        for campaign in self.store.list_campaigns().await? {
            if !campaign.is_temporary() || !campaign.is_active_at(now) {
                continue;
            }
            let items = self.store.items_for(campaign.id).await?;
            tiers.admit(&campaign, items, now);
        }
        tracing::info!(
            base_items = base_items.len(),
            tiers = ?tiers.priorities(),
            "price list run started"
        );

        let previous = self.store.load_price_list().await?;
        let resolution = resolve(&base, &base_items, &tiers, &previous)?;

        let persisted = PublishGate::should_persist(resolution.dirty);
        if persisted {
            self.store.replace_price_list(&resolution.records).await?;
        }

        self.store.set_applied(&resolution.applied).await?;
        let disabled = self.store.disable_expired(now).await?;

        tracing::info!(
            records = resolution.records.len(),
            persisted,
            disabled_campaigns = disabled,
            "price list run finished"
        );
        Ok(RunOutcome {
            records: resolution.records,
            persisted,
        })
    }

    /// Send every unpublished record downstream, then mark them published.
    #[instrument(skip(self, publisher), err)]
    pub async fn publish(&self, publisher: &FanoutPublisher) -> ServiceResult<PublishReport> {
        let pending: Vec<PriceRecord> = self
            .store
            .load_price_list()
            .await?
            .into_iter()
            .filter(|r| !r.published)
            .collect();
        if pending.is_empty() {
            tracing::info!("no unpublished prices");
            return Ok(PublishReport::default());
        }

        let messages: Vec<PriceMessage> = pending
            .iter()
            .map(|r| PriceMessage::new(r.sku.clone(), r.price, r.msrp, r.cost))
            .collect();
        let report = publisher.publish(&messages);

        let skus: Vec<String> = pending.into_iter().map(|r| r.sku).collect();
        self.store.mark_prices_published(&skus).await?;

        tracing::info!(
            messages = report.messages,
            delivered = report.delivered,
            failed = report.failed,
            "prices published"
        );
        Ok(report)
    }
}
