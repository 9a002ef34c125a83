//! Bundle run: derive bundle prices from the current price list.
//!
//! Bundles are independent of each other, so each definition is aggregated on
//! its own task. The tasks share one read-only index and one collector.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::instrument;

use pricebook_events::{FanoutPublisher, PriceMessage, PublishReport};
use pricebook_pricing::{
    aggregate_bundle, BundleCollector, BundleDefinition, BundleRecord, PublishGate, SimpleSkuIndex,
};

use crate::error::{ServiceError, ServiceResult};
use crate::price_list::RunOutcome;
use crate::store::PricingStore;

pub struct BundleService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for BundleService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> BundleService<S>
where
    S: PricingStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Replace the stored bundle definitions.
    #[instrument(skip(self, definitions), fields(count = definitions.len()), err)]
    pub async fn replace_definitions(&self, definitions: &[BundleDefinition]) -> ServiceResult<()> {
        self.store.replace_bundle_definitions(definitions).await?;
        Ok(())
    }

    /// Aggregate every bundle and persist the set when it changed.
    #[instrument(skip(self), err)]
    pub async fn build(&self, now: DateTime<Utc>) -> ServiceResult<RunOutcome<BundleRecord>> {
        let index = Arc::new(SimpleSkuIndex::from_records(&self.store.load_price_list().await?));
        let definitions = self.store.load_bundle_definitions().await?;
        tracing::info!(bundles = definitions.len(), skus = index.len(), %now, "bundle run started");

        let collector = Arc::new(Mutex::new(BundleCollector::new()));
        let mut tasks = JoinSet::new();
        for definition in definitions {
            let index = index.clone();
            let collector = collector.clone();
            tasks.spawn(async move {
                let bundle = aggregate_bundle(&definition, &index);
                collector
                    .lock()
                    .map_err(|_| ServiceError::Task("bundle collector poisoned".to_string()))?
                    .push(bundle);
                Ok::<_, ServiceError>(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| ServiceError::Task(e.to_string()))??;
        }

        let collector = Arc::try_unwrap(collector)
            .map_err(|_| ServiceError::Task("bundle collector still shared".to_string()))?
            .into_inner()
            .map_err(|_| ServiceError::Task("bundle collector poisoned".to_string()))?;

        let previous = self.store.load_bundles().await?;
        let batch = collector.finish(&previous);

        let persisted = PublishGate::should_persist(batch.dirty);
        if persisted {
            self.store.replace_bundles(&batch.records).await?;
        }

        tracing::info!(records = batch.records.len(), persisted, "bundle run finished");
        Ok(RunOutcome {
            records: batch.records,
            persisted,
        })
    }

    /// Send unpublished, priced bundles downstream and mark them published.
    ///
    /// Zero-priced bundles stay unpublished.
    #[instrument(skip(self, publisher), err)]
    pub async fn publish(&self, publisher: &FanoutPublisher) -> ServiceResult<PublishReport> {
        let pending: Vec<BundleRecord> = self
            .store
            .load_bundles()
            .await?
            .into_iter()
            .filter(|b| !b.published && b.price > 0.0)
            .collect();
        if pending.is_empty() {
            tracing::info!("no unpublished bundles");
            return Ok(PublishReport::default());
        }

        let messages: Vec<PriceMessage> = pending
            .iter()
            .map(|b| PriceMessage::new(b.parent_sku.clone(), b.price, b.msrp, b.cost))
            .collect();
        let report = publisher.publish(&messages);

        let parents: Vec<String> = pending.into_iter().map(|b| b.parent_sku).collect();
        self.store.mark_bundles_published(&parents).await?;

        tracing::info!(
            messages = report.messages,
            delivered = report.delivered,
            failed = report.failed,
            "bundles published"
        );
        Ok(report)
    }
}
