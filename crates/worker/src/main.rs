use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use pricebook_infra::{InMemoryPricingStore, PostgresPricingStore, PricebookConfig};
use pricebook_observability::LogFormat;
use pricebook_worker::{build_publisher, run_task, TaskSummary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pricebook_observability::tracing::init(LogFormat::from_env());

    let config = PricebookConfig::from_env().context("invalid configuration")?;
    let publisher = build_publisher(&config)?;
    let now = Utc::now();
    tracing::info!(task = config.task.as_str(), persistent = config.use_persistent_stores, "pricebook worker starting");

    let summary: TaskSummary = match config.database_url.as_deref() {
        Some(database_url) => {
            let store = PostgresPricingStore::connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            store.ensure_schema().await.context("failed to apply schema")?;
            run_task(config.task, Arc::new(store), &publisher, now).await?
        }
        None => {
            tracing::warn!("USE_PERSISTENT_STORES is not set; using an empty in-memory store");
            run_task(config.task, InMemoryPricingStore::arc(), &publisher, now).await?
        }
    };

    tracing::info!(?summary, "pricebook worker finished");
    Ok(())
}
