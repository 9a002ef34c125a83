use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};

use pricebook_events::{BusConsumer, FanoutPublisher, InMemoryEventBus, PriceMessage, PublishReport};
use pricebook_infra::{BundleService, PipelineTask, PriceListService, PricebookConfig, PricingStore};

/// What one task run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    /// Number of price records computed, when the price list ran.
    pub prices: Option<usize>,
    pub prices_persisted: bool,
    /// Number of bundle records computed, when bundles ran.
    pub bundles: Option<usize>,
    pub bundles_persisted: bool,
    pub prices_published: PublishReport,
    pub bundles_published: PublishReport,
}

/// Consumers for the configured channels.
///
/// Without the `redis` feature, messages go to an in-memory bus nobody reads.
pub fn build_publisher(config: &PricebookConfig) -> anyhow::Result<FanoutPublisher> {
    #[cfg(feature = "redis")]
    {
        let mut publisher = FanoutPublisher::new();
        for consumer in pricebook_infra::event_bus::redis_consumers(&config.redis_url, &config.price_channels)
            .context("failed to create Redis consumers")?
        {
            publisher.add_consumer(consumer);
        }
        return Ok(publisher);
    }

    #[cfg(not(feature = "redis"))]
    {
        tracing::warn!(
            channels = ?config.price_channels,
            "redis feature not enabled, publishing to an in-memory bus"
        );
        let bus: Arc<InMemoryEventBus<PriceMessage>> = Arc::new(InMemoryEventBus::new());
        Ok(FanoutPublisher::new().with_consumer(Arc::new(BusConsumer::new("memory", bus))))
    }
}

/// Run `task` against `store`.
pub async fn run_task<S>(
    task: PipelineTask,
    store: Arc<S>,
    publisher: &FanoutPublisher,
    now: DateTime<Utc>,
) -> anyhow::Result<TaskSummary>
where
    S: PricingStore + ?Sized,
{
    let prices = PriceListService::new(store.clone());
    let bundles = BundleService::new(store);
    let mut summary = TaskSummary::default();

    if matches!(task, PipelineTask::PriceList | PipelineTask::All) {
        let outcome = prices.build(now).await.context("price list run failed")?;
        summary.prices = Some(outcome.records.len());
        summary.prices_persisted = outcome.persisted;
    }

    if matches!(task, PipelineTask::Bundles | PipelineTask::All) {
        let outcome = bundles.build(now).await.context("bundle run failed")?;
        summary.bundles = Some(outcome.records.len());
        summary.bundles_persisted = outcome.persisted;
    }

    if matches!(task, PipelineTask::Publish | PipelineTask::All) {
        summary.prices_published = prices.publish(publisher).await.context("price publication failed")?;
        summary.bundles_published = bundles.publish(publisher).await.context("bundle publication failed")?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pricebook_campaigns::{evaluate, Campaign, CampaignKind, NewCampaign};
    use pricebook_events::EventBus;
    use pricebook_infra::store::{CampaignItemStore, CampaignStore};
    use pricebook_infra::InMemoryPricingStore;

    async fn seeded_store(now: DateTime<Utc>) -> Arc<InMemoryPricingStore> {
        let store = InMemoryPricingStore::arc();
        let mut base = Campaign::create(
            NewCampaign {
                name: "base".to_string(),
                kind: CampaignKind::Base,
                priority: 0,
                start: now - Duration::days(1),
                end: now + Duration::days(1),
                filename: "https://files.example.com/base.csv".to_string(),
            },
            now,
        )
        .unwrap();
        base.enabled = true;
        store.insert_campaign(&base).await.unwrap();
        let ctx = base.context(now);
        store
            .insert_items(&[evaluate(&ctx, "A", 10.0, 0.0, 100.0), evaluate(&ctx, "B", 10.0, 0.0, 50.0)])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn all_runs_every_stage() {
        let now = Utc::now();
        let store = seeded_store(now).await;
        let bus: Arc<InMemoryEventBus<PriceMessage>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let publisher = FanoutPublisher::new().with_consumer(Arc::new(BusConsumer::new("memory", bus.clone())));

        let summary = run_task(PipelineTask::All, store, &publisher, now).await.unwrap();
        assert_eq!(summary.prices, Some(2));
        assert!(summary.prices_persisted);
        assert_eq!(summary.bundles, Some(0));
        assert_eq!(summary.prices_published.delivered, 2);
        assert_eq!(sub.drain().len(), 2);
    }

    #[tokio::test]
    async fn publish_only_skips_the_builds() {
        let now = Utc::now();
        let store = seeded_store(now).await;
        let publisher = FanoutPublisher::new();

        let summary = run_task(PipelineTask::Publish, store, &publisher, now).await.unwrap();
        assert_eq!(summary.prices, None);
        assert_eq!(summary.bundles, None);
        assert_eq!(summary.prices_published.messages, 0);
    }

    #[test]
    fn default_publisher_has_a_consumer() {
        let config = PricebookConfig::from_lookup(|_| None).unwrap();
        let publisher = build_publisher(&config).unwrap();
        assert!(publisher.consumer_count() >= 1);
    }
}
