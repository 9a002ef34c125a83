//! Postgres-backed pricing store.
//!
//! Schema lives in `migrations/0001_pricebook.sql` and is applied by
//! [`PostgresPricingStore::ensure_schema`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed / other | n/a | `Storage` |
//!
//! Snapshot replacement (`replace_price_list`, `replace_bundles`) runs the
//! delete and the inserts in one transaction, so readers never observe an
//! empty or half-written snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use pricebook_campaigns::{Campaign, CampaignItem, CampaignKind, CostSource, ItemRejection, ItemStatus};
use pricebook_core::{CampaignId, CampaignItemId};
use pricebook_pricing::{BundleChild, BundleDefinition, BundleRecord, PriceRecord};

use super::{BundleStore, CampaignItemStore, CampaignStore, PriceListStore, StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_pricebook.sql");

/// Postgres-backed implementation of every pricing store trait.
#[derive(Debug, Clone)]
pub struct PostgresPricingStore {
    pool: Arc<PgPool>,
}

impl PostgresPricingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect to `database_url` and build a store.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'_, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait::async_trait]
impl CampaignStore for PostgresPricingStore {
    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.id), err)]
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, name, kind, priority, start_at, end_at, filename,
                enabled, applied, upsert, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(Uuid::from(campaign.id))
        .bind(&campaign.name)
        .bind(campaign.kind.as_str())
        .bind(campaign.priority)
        .bind(campaign.start)
        .bind(campaign.end)
        .bind(&campaign.filename)
        .bind(campaign.enabled)
        .bind(campaign.applied)
        .bind(campaign.upsert)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_campaign", e))?;
        Ok(())
    }

    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.id), err)]
    async fn save_campaign(&self, campaign: &Campaign) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                name = $2,
                priority = $3,
                start_at = $4,
                end_at = $5,
                filename = $6,
                enabled = $7,
                applied = $8,
                upsert = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(campaign.id))
        .bind(&campaign.name)
        .bind(campaign.priority)
        .bind(campaign.start)
        .bind(campaign.end)
        .bind(&campaign.filename)
        .bind(campaign.enabled)
        .bind(campaign.applied)
        .bind(campaign.upsert)
        .bind(campaign.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_campaign", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("campaign {}", campaign.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(campaign_id = %id), err)]
    async fn delete_campaign(&self, id: CampaignId) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        let deleted = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_campaign", e))?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound(format!("campaign {id}")));
        }

        sqlx::query("DELETE FROM campaign_items WHERE campaign_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_campaign_items", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(campaign_id = %id), err)]
    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let row = sqlx::query(&format!("{CAMPAIGN_SELECT} WHERE id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_campaign", e))?;

        row.map(|r| decode_campaign(&r)).transpose()
    }

    #[instrument(skip(self), fields(campaign_count = tracing::field::Empty), err)]
    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>> {
        let rows = sqlx::query(&format!("{CAMPAIGN_SELECT} ORDER BY created_at DESC, id DESC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_campaigns", e))?;

        Span::current().record("campaign_count", rows.len());
        rows.iter().map(decode_campaign).collect()
    }

    #[instrument(skip(self), err)]
    async fn enabled_base_campaign(&self) -> StoreResult<Option<Campaign>> {
        let row = sqlx::query(&format!("{CAMPAIGN_SELECT} WHERE kind = 'base' AND enabled LIMIT 1"))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("enabled_base_campaign", e))?;

        row.map(|r| decode_campaign(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn priority_taken(&self, priority: i32, except: Option<CampaignId>) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM campaigns
                WHERE priority = $1 AND ($2::uuid IS NULL OR id <> $2)
            ) AS taken
            "#,
        )
        .bind(priority)
        .bind(except.map(Uuid::from))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("priority_taken", e))?;

        row.try_get::<bool, _>("taken")
            .map_err(|e| map_sqlx_error("decode_priority_taken", e))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn set_applied(&self, ids: &[CampaignId]) -> StoreResult<()> {
        let ids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        sqlx::query("UPDATE campaigns SET applied = (id = ANY($1)) WHERE applied OR id = ANY($1)")
            .bind(&ids)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_applied", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn disable_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET enabled = FALSE, updated_at = $1
            WHERE kind = 'temporary' AND enabled AND end_at < $1
            "#,
        )
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("disable_expired", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl CampaignItemStore for PostgresPricingStore {
    #[instrument(skip(self, items), fields(count = items.len()), err)]
    async fn insert_items(&self, items: &[CampaignItem]) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        for item in items {
            bind_item(sqlx::query(ITEM_INSERT), item)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_item", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, items), fields(count = items.len()), err)]
    async fn upsert_items(&self, items: &[CampaignItem]) -> StoreResult<()> {
        let statement = format!(
            r#"{ITEM_INSERT}
            ON CONFLICT (campaign_id, sku) DO UPDATE SET
                priority = EXCLUDED.priority,
                price = EXCLUDED.price,
                msrp = EXCLUDED.msrp,
                cost = EXCLUDED.cost,
                cost_source = EXCLUDED.cost_source,
                new_cost = EXCLUDED.new_cost,
                margin = EXCLUDED.margin,
                status = EXCLUDED.status,
                error = EXCLUDED.error,
                updated_at = EXCLUDED.updated_at
            "#
        );

        let mut tx = self.begin().await?;
        for item in items {
            bind_item(sqlx::query(&statement), item)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("upsert_item", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(campaign_id = %campaign_id), err)]
    async fn delete_items(&self, campaign_id: CampaignId) -> StoreResult<()> {
        sqlx::query("DELETE FROM campaign_items WHERE campaign_id = $1")
            .bind(Uuid::from(campaign_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(campaign_id = %campaign_id), err)]
    async fn items_for(&self, campaign_id: CampaignId) -> StoreResult<Vec<CampaignItem>> {
        let rows = sqlx::query(&format!("{ITEM_SELECT} WHERE campaign_id = $1 ORDER BY sku"))
            .bind(Uuid::from(campaign_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("items_for", e))?;

        decode_items(rows)
    }

    #[instrument(skip(self, skus), fields(campaign_id = %campaign_id, count = skus.len()), err)]
    async fn items_by_skus(&self, campaign_id: CampaignId, skus: &[String]) -> StoreResult<Vec<CampaignItem>> {
        let rows = sqlx::query(&format!("{ITEM_SELECT} WHERE campaign_id = $1 AND sku = ANY($2)"))
            .bind(Uuid::from(campaign_id))
            .bind(skus)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("items_by_skus", e))?;

        decode_items(rows)
    }

    #[instrument(skip(self, ids), err)]
    async fn pending_counts(&self, ids: Option<&[CampaignId]>) -> StoreResult<HashMap<CampaignId, u64>> {
        let ids: Option<Vec<Uuid>> = ids.map(|ids| ids.iter().copied().map(Uuid::from).collect());
        let rows = sqlx::query(
            r#"
            SELECT campaign_id, COUNT(*) AS pending
            FROM campaign_items
            WHERE status = 'pending' AND ($1::uuid[] IS NULL OR campaign_id = ANY($1))
            GROUP BY campaign_id
            "#,
        )
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_counts", e))?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("campaign_id").map_err(|e| map_sqlx_error("decode_pending", e))?;
            let pending: i64 = row.try_get("pending").map_err(|e| map_sqlx_error("decode_pending", e))?;
            counts.insert(CampaignId::from_uuid(id), pending.max(0) as u64);
        }
        Ok(counts)
    }
}

#[async_trait::async_trait]
impl PriceListStore for PostgresPricingStore {
    #[instrument(skip(self), err)]
    async fn load_price_list(&self) -> StoreResult<Vec<PriceRecord>> {
        let rows = sqlx::query("SELECT sku, price, msrp, cost, priority, published FROM price_list ORDER BY sku")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_price_list", e))?;

        rows.iter()
            .map(|row| {
                PriceRow::from_row(row)
                    .map(Into::into)
                    .map_err(|e| map_sqlx_error("decode_price_record", e))
            })
            .collect()
    }

    #[instrument(skip(self, records), fields(count = records.len()), err)]
    async fn replace_price_list(&self, records: &[PriceRecord]) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM price_list")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_price_list", e))?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO price_list (sku, price, msrp, cost, priority, published)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&record.sku)
            .bind(record.price)
            .bind(record.msrp)
            .bind(record.cost)
            .bind(record.priority)
            .bind(record.published)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_price_record", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, skus), fields(count = skus.len()), err)]
    async fn mark_prices_published(&self, skus: &[String]) -> StoreResult<()> {
        sqlx::query("UPDATE price_list SET published = TRUE WHERE sku = ANY($1)")
            .bind(skus)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_prices_published", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BundleStore for PostgresPricingStore {
    #[instrument(skip(self), err)]
    async fn load_bundle_definitions(&self) -> StoreResult<Vec<BundleDefinition>> {
        let rows = sqlx::query(
            "SELECT parent_sku, child_sku, qty FROM bundle_definitions ORDER BY parent_sku, position",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_bundle_definitions", e))?;

        let mut definitions: Vec<BundleDefinition> = Vec::new();
        for row in rows {
            let parent: String = row.try_get("parent_sku").map_err(|e| map_sqlx_error("decode_definition", e))?;
            let child: String = row.try_get("child_sku").map_err(|e| map_sqlx_error("decode_definition", e))?;
            let qty: i32 = row.try_get("qty").map_err(|e| map_sqlx_error("decode_definition", e))?;
            let qty = u32::try_from(qty)
                .map_err(|_| StoreError::Storage(format!("negative quantity for {parent}/{child}")))?;

            let child = BundleChild { sku: child, qty };
            match definitions.last_mut() {
                Some(last) if last.parent_sku == parent => last.children.push(child),
                _ => definitions.push(BundleDefinition {
                    parent_sku: parent,
                    children: vec![child],
                }),
            }
        }
        Ok(definitions)
    }

    #[instrument(skip(self, definitions), fields(count = definitions.len()), err)]
    async fn replace_bundle_definitions(&self, definitions: &[BundleDefinition]) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM bundle_definitions")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_bundle_definitions", e))?;

        for definition in definitions {
            for (position, child) in definition.children.iter().enumerate() {
                let qty = i32::try_from(child.qty)
                    .map_err(|_| StoreError::Storage(format!("quantity too large for {}", child.sku)))?;
                sqlx::query(
                    r#"
                    INSERT INTO bundle_definitions (parent_sku, position, child_sku, qty)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(&definition.parent_sku)
                .bind(position as i32)
                .bind(&child.sku)
                .bind(qty)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_bundle_definition", e))?;
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn load_bundles(&self) -> StoreResult<Vec<BundleRecord>> {
        let rows = sqlx::query(
            "SELECT parent_sku, price, msrp, cost, published, processed FROM bundles ORDER BY parent_sku",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_bundles", e))?;

        rows.iter()
            .map(|row| {
                BundleRow::from_row(row)
                    .map(Into::into)
                    .map_err(|e| map_sqlx_error("decode_bundle_record", e))
            })
            .collect()
    }

    #[instrument(skip(self, records), fields(count = records.len()), err)]
    async fn replace_bundles(&self, records: &[BundleRecord]) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM bundles")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_bundles", e))?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO bundles (parent_sku, price, msrp, cost, published, processed)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&record.parent_sku)
            .bind(record.price)
            .bind(record.msrp)
            .bind(record.cost)
            .bind(record.published)
            .bind(record.processed)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_bundle", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, parent_skus), fields(count = parent_skus.len()), err)]
    async fn mark_bundles_published(&self, parent_skus: &[String]) -> StoreResult<()> {
        sqlx::query("UPDATE bundles SET published = TRUE WHERE parent_sku = ANY($1)")
            .bind(parent_skus)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_bundles_published", e))?;
        Ok(())
    }
}

const CAMPAIGN_SELECT: &str = r#"
    SELECT id, name, kind, priority, start_at, end_at, filename,
           enabled, applied, upsert, created_at, updated_at
    FROM campaigns
"#;

const ITEM_SELECT: &str = r#"
    SELECT id, campaign_id, priority, sku, price, msrp, cost, cost_source,
           new_cost, margin, status, error, created_at, updated_at
    FROM campaign_items
"#;

const ITEM_INSERT: &str = r#"
    INSERT INTO campaign_items (
        id, campaign_id, priority, sku, price, msrp, cost, cost_source,
        new_cost, margin, status, error, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
"#;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_item<'q>(query: PgQuery<'q>, item: &'q CampaignItem) -> PgQuery<'q> {
    query
        .bind(Uuid::from(item.id))
        .bind(Uuid::from(item.campaign_id))
        .bind(item.priority)
        .bind(&item.sku)
        .bind(item.price)
        .bind(item.msrp)
        .bind(item.cost)
        .bind(item.cost_source.as_str())
        .bind(item.new_cost)
        .bind(item.margin)
        .bind(item.status.as_str())
        .bind(item.error.map(|e| e.as_str()))
        .bind(item.created_at)
        .bind(item.updated_at)
}

fn decode_campaign(row: &sqlx::postgres::PgRow) -> StoreResult<Campaign> {
    let decode = |e| map_sqlx_error("decode_campaign", e);
    let kind: String = row.try_get("kind").map_err(decode)?;
    let kind: CampaignKind = kind.parse().map_err(|e| StoreError::Storage(format!("{e}")))?;

    Ok(Campaign {
        id: CampaignId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        kind,
        priority: row.try_get("priority").map_err(decode)?,
        start: row.try_get("start_at").map_err(decode)?,
        end: row.try_get("end_at").map_err(decode)?,
        filename: row.try_get("filename").map_err(decode)?,
        enabled: row.try_get("enabled").map_err(decode)?,
        applied: row.try_get("applied").map_err(decode)?,
        upsert: row.try_get("upsert").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
        pending_items: 0,
    })
}

fn decode_items(rows: Vec<sqlx::postgres::PgRow>) -> StoreResult<Vec<CampaignItem>> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let raw = ItemRow::from_row(&row).map_err(|e| map_sqlx_error("decode_item", e))?;
        items.push(raw.try_into()?);
    }
    Ok(items)
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    campaign_id: Uuid,
    priority: i32,
    sku: String,
    price: f64,
    msrp: f64,
    cost: f64,
    cost_source: String,
    new_cost: Option<f64>,
    margin: Option<f64>,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            campaign_id: row.try_get("campaign_id")?,
            priority: row.try_get("priority")?,
            sku: row.try_get("sku")?,
            price: row.try_get("price")?,
            msrp: row.try_get("msrp")?,
            cost: row.try_get("cost")?,
            cost_source: row.try_get("cost_source")?,
            new_cost: row.try_get("new_cost")?,
            margin: row.try_get("margin")?,
            status: row.try_get("status")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ItemRow> for CampaignItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let corrupt = |e: pricebook_core::DomainError| StoreError::Storage(format!("corrupt item {}: {e}", row.id));
        let status: ItemStatus = row.status.parse().map_err(corrupt)?;
        let cost_source: CostSource = row.cost_source.parse().map_err(corrupt)?;
        let error = row
            .error
            .as_deref()
            .map(str::parse::<ItemRejection>)
            .transpose()
            .map_err(corrupt)?;

        Ok(CampaignItem {
            id: CampaignItemId::from_uuid(row.id),
            campaign_id: CampaignId::from_uuid(row.campaign_id),
            priority: row.priority,
            sku: row.sku,
            price: row.price,
            msrp: row.msrp,
            cost: row.cost,
            cost_source,
            new_cost: row.new_cost,
            margin: row.margin,
            status,
            error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct PriceRow {
    sku: String,
    price: f64,
    msrp: f64,
    cost: f64,
    priority: i32,
    published: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PriceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(PriceRow {
            sku: row.try_get("sku")?,
            price: row.try_get("price")?,
            msrp: row.try_get("msrp")?,
            cost: row.try_get("cost")?,
            priority: row.try_get("priority")?,
            published: row.try_get("published")?,
        })
    }
}

impl From<PriceRow> for PriceRecord {
    fn from(row: PriceRow) -> Self {
        PriceRecord {
            sku: row.sku,
            price: row.price,
            msrp: row.msrp,
            cost: row.cost,
            priority: row.priority,
            published: row.published,
        }
    }
}

#[derive(Debug)]
struct BundleRow {
    parent_sku: String,
    price: f64,
    msrp: f64,
    cost: f64,
    published: bool,
    processed: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for BundleRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(BundleRow {
            parent_sku: row.try_get("parent_sku")?,
            price: row.try_get("price")?,
            msrp: row.try_get("msrp")?,
            cost: row.try_get("cost")?,
            published: row.try_get("published")?,
            processed: row.try_get("processed")?,
        })
    }
}

impl From<BundleRow> for BundleRecord {
    fn from(row: BundleRow) -> Self {
        BundleRecord {
            parent_sku: row.parent_sku,
            price: row.price,
            msrp: row.msrp,
            cost: row.cost,
            published: row.published,
            processed: row.processed,
        }
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {}", operation)),
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {}", operation)),
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
