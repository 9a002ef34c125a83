//! Campaign items and the validity/margin rules that decide their status.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pricebook_core::{CampaignId, CampaignItemId, DomainError};

/// Tax factor removed from the sale price before computing margin (16% VAT).
pub const TAX_FACTOR: f64 = 1.16;

/// Items are auto-approved only when their margin is strictly above this.
pub const APPROVAL_MARGIN: f64 = 30.0;

/// Review status of a campaign item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            other => Err(DomainError::validation(format!("unknown item status: {other}"))),
        }
    }
}

/// Why an item was held for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRejection {
    CostInvalid,
    PriceInvalid,
    ProfitInvalid,
}

impl ItemRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemRejection::CostInvalid => "cost_invalid",
            ItemRejection::PriceInvalid => "price_invalid",
            ItemRejection::ProfitInvalid => "profit_invalid",
        }
    }
}

impl core::fmt::Display for ItemRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ItemRejection::CostInvalid => "cost is invalid",
            ItemRejection::PriceInvalid => "price is invalid",
            ItemRejection::ProfitInvalid => "profit is invalid",
        };
        f.write_str(msg)
    }
}

impl FromStr for ItemRejection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cost_invalid" => Ok(ItemRejection::CostInvalid),
            "price_invalid" => Ok(ItemRejection::PriceInvalid),
            "profit_invalid" => Ok(ItemRejection::ProfitInvalid),
            other => Err(DomainError::validation(format!("unknown item rejection: {other}"))),
        }
    }
}

/// Which source is authoritative for an item's `cost`.
///
/// Temporary campaigns and upserted base rows take their cost from the base
/// campaign (`Base`); fresh base imports carry the row's own cost (`Imported`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    Imported,
    Base,
}

impl CostSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostSource::Imported => "imported",
            CostSource::Base => "base",
        }
    }
}

impl FromStr for CostSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imported" => Ok(CostSource::Imported),
            "base" => Ok(CostSource::Base),
            other => Err(DomainError::validation(format!("unknown cost source: {other}"))),
        }
    }
}

/// The slice of a campaign an item evaluation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignContext {
    pub campaign_id: CampaignId,
    pub priority: i32,
    pub at: DateTime<Utc>,
}

/// One priced SKU inside a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignItem {
    pub id: CampaignItemId,
    pub campaign_id: CampaignId,
    pub priority: i32,
    pub sku: String,
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
    pub cost_source: CostSource,
    /// Cost staged by an upsert import, waiting for explicit approval.
    pub new_cost: Option<f64>,
    /// Tax-adjusted margin; absent when cost or price failed validation.
    pub margin: Option<f64>,
    pub status: ItemStatus,
    pub error: Option<ItemRejection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tax-adjusted profit margin in percent, truncated (floored) to two decimals.
///
/// Callers must ensure `price > 0`.
pub fn margin(cost: f64, price: f64) -> f64 {
    let raw = (1.0 - cost / (price / TAX_FACTOR)) * 100.0;
    (raw * 100.0).floor() / 100.0
}

/// `true` iff the margin clears the auto-approval threshold (strictly greater).
pub fn is_approvable_margin(margin: f64) -> bool {
    margin > APPROVAL_MARGIN
}

/// Decide status, error and margin for a raw `(cost, price)` pair.
fn classify(cost: f64, price: f64) -> (ItemStatus, Option<ItemRejection>, Option<f64>) {
    if !(cost > 0.0) {
        return (ItemStatus::Pending, Some(ItemRejection::CostInvalid), None);
    }
    if !(price > 0.0) {
        return (ItemStatus::Pending, Some(ItemRejection::PriceInvalid), None);
    }

    let m = margin(cost, price);
    if is_approvable_margin(m) {
        (ItemStatus::Approved, None, Some(m))
    } else {
        (ItemStatus::Pending, Some(ItemRejection::ProfitInvalid), Some(m))
    }
}

/// Build a campaign item from one imported row.
///
/// Pure and deterministic: the result depends only on the arguments.
pub fn evaluate(ctx: &CampaignContext, sku: &str, cost: f64, msrp: f64, price: f64) -> CampaignItem {
    let (status, error, margin) = classify(cost, price);

    CampaignItem {
        id: CampaignItemId::new(),
        campaign_id: ctx.campaign_id,
        priority: ctx.priority,
        sku: sku.to_string(),
        price,
        msrp,
        cost,
        cost_source: CostSource::Imported,
        new_cost: None,
        margin,
        status,
        error,
        created_at: ctx.at,
        updated_at: ctx.at,
    }
}

impl CampaignItem {
    pub fn is_approved(&self) -> bool {
        self.status == ItemStatus::Approved
    }

    pub fn with_cost_source(mut self, source: CostSource) -> Self {
        self.cost_source = source;
        self
    }

    /// Re-run the validity/margin rules on the current cost and price.
    ///
    /// Identity, creation time and staged cost are kept.
    pub fn re_evaluate(&mut self, ctx: &CampaignContext) {
        let (status, error, margin) = classify(self.cost, self.price);
        self.priority = ctx.priority;
        self.status = status;
        self.error = error;
        self.margin = margin;
        self.updated_at = ctx.at;
    }

    /// Manual approval (bulk-approve), bypassing the margin rule.
    pub fn approve(&mut self, at: DateTime<Utc>) {
        self.status = ItemStatus::Approved;
        self.error = None;
        self.updated_at = at;
    }

    /// Move a staged cost into `cost` and recalculate.
    ///
    /// Returns `false` (and leaves the item untouched) when nothing is staged.
    pub fn promote_staged_cost(&mut self, ctx: &CampaignContext) -> bool {
        let Some(staged) = self.new_cost.take() else {
            return false;
        };
        self.cost = staged;
        self.cost_source = CostSource::Imported;
        self.re_evaluate(ctx);
        true
    }
}

/// Breakdown of pending items by how far below the threshold they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBreakdown {
    /// Pending with `0 < margin <= 30`.
    pub under_threshold: u64,
    /// Pending with `margin <= 0`, or with no margin at all.
    pub non_positive: u64,
}

impl PendingBreakdown {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a CampaignItem>) -> Self {
        let mut out = Self::default();
        for item in items.into_iter().filter(|i| i.status == ItemStatus::Pending) {
            match item.margin {
                Some(m) if m > 0.0 && m <= APPROVAL_MARGIN => out.under_threshold += 1,
                Some(m) if m > APPROVAL_MARGIN => {}
                _ => out.non_positive += 1,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CampaignContext {
        CampaignContext {
            campaign_id: CampaignId::new(),
            priority: 7,
            at: Utc::now(),
        }
    }

    #[test]
    fn non_positive_cost_is_pending_without_margin() {
        let item = evaluate(&ctx(), "SKU-1", 0.0, 10.0, 100.0);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.error, Some(ItemRejection::CostInvalid));
        assert_eq!(item.margin, None);

        let item = evaluate(&ctx(), "SKU-1", -5.0, 10.0, 100.0);
        assert_eq!(item.error, Some(ItemRejection::CostInvalid));
    }

    #[test]
    fn non_positive_price_is_pending_without_margin() {
        let item = evaluate(&ctx(), "SKU-1", 10.0, 10.0, 0.0);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.error, Some(ItemRejection::PriceInvalid));
        assert_eq!(item.margin, None);
    }

    #[test]
    fn low_margin_is_held_for_review() {
        // 142.857 / 1.16 = 123.15..., 1 - 100/123.15 = 0.188
        let item = evaluate(&ctx(), "SKU-1", 100.0, 0.0, 142.857);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.error, Some(ItemRejection::ProfitInvalid));
        let m = item.margin.unwrap();
        assert!(m > 18.0 && m < 19.0, "margin was {m}");
    }

    #[test]
    fn healthy_margin_is_approved() {
        let item = evaluate(&ctx(), "SKU-1", 50.0, 0.0, 142.86);
        assert_eq!(item.status, ItemStatus::Approved);
        assert_eq!(item.error, None);
        let m = item.margin.unwrap();
        assert!(m > 59.0 && m < 60.0, "margin was {m}");
    }

    #[test]
    fn margin_of_exactly_thirty_is_not_approved() {
        assert!(!is_approvable_margin(30.0));
        assert!(is_approvable_margin(30.01));
    }

    #[test]
    fn margin_just_above_thirty_is_approved() {
        // 116 / 1.16 = 100, so margin = 100 - cost
        let item = evaluate(&ctx(), "SKU-1", 69.98, 0.0, 116.0);
        assert_eq!(item.status, ItemStatus::Approved);
        assert!(item.margin.unwrap() >= 30.01);

        let item = evaluate(&ctx(), "SKU-1", 70.0, 0.0, 116.0);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.error, Some(ItemRejection::ProfitInvalid));
    }

    #[test]
    fn margin_is_floored_not_rounded() {
        // raw margin 30.0199... must become 30.01, not 30.02
        let m = margin(69.9801, 116.0);
        assert!(m < 30.02);
        assert!(m >= 30.01 - 1e-9);
    }

    #[test]
    fn evaluate_copies_campaign_priority() {
        let c = ctx();
        let item = evaluate(&c, "SKU-9", 10.0, 0.0, 100.0);
        assert_eq!(item.priority, 7);
        assert_eq!(item.campaign_id, c.campaign_id);
        assert_eq!(item.cost_source, CostSource::Imported);
    }

    #[test]
    fn promote_staged_cost_recalculates() {
        let c = ctx();
        let mut item = evaluate(&c, "SKU-1", 10.0, 0.0, 116.0);
        assert!(item.is_approved());

        item.new_cost = Some(90.0);
        assert!(item.promote_staged_cost(&c));
        assert_eq!(item.cost, 90.0);
        assert_eq!(item.new_cost, None);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.error, Some(ItemRejection::ProfitInvalid));

        assert!(!item.promote_staged_cost(&c));
    }

    #[test]
    fn manual_approval_clears_error() {
        let c = ctx();
        let mut item = evaluate(&c, "SKU-1", 90.0, 0.0, 100.0);
        assert_eq!(item.status, ItemStatus::Pending);
        item.approve(c.at);
        assert!(item.is_approved());
        assert_eq!(item.error, None);
    }

    #[test]
    fn pending_breakdown_splits_by_margin() {
        let c = ctx();
        let items = vec![
            evaluate(&c, "A", 90.0, 0.0, 116.0),  // margin 10 -> under threshold
            evaluate(&c, "B", 150.0, 0.0, 116.0), // margin -50 -> non positive
            evaluate(&c, "C", 0.0, 0.0, 116.0),   // no margin -> non positive
            evaluate(&c, "D", 10.0, 0.0, 116.0),  // approved, ignored
        ];
        let b = PendingBreakdown::from_items(&items);
        assert_eq!(b.under_threshold, 1);
        assert_eq!(b.non_positive, 2);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ItemStatus::Approved).unwrap(), "\"approved\"");
        assert_eq!("pending".parse::<ItemStatus>().unwrap(), ItemStatus::Pending);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: status is Approved iff the floored margin is above 30.
            #[test]
            fn status_follows_margin_rule(
                cost in 0.01f64..10_000.0,
                price in 0.01f64..10_000.0,
            ) {
                let item = evaluate(&ctx(), "SKU", cost, 0.0, price);
                let expected = ((1.0 - cost / (price / 1.16)) * 100.0 * 100.0).floor() / 100.0;
                prop_assert_eq!(item.margin, Some(expected));
                prop_assert_eq!(item.status == ItemStatus::Approved, expected > 30.0);
            }

            /// Property: evaluation is deterministic apart from the fresh id.
            #[test]
            fn evaluate_is_deterministic(
                cost in -100.0f64..1_000.0,
                price in -100.0f64..1_000.0,
            ) {
                let c = ctx();
                let a = evaluate(&c, "SKU", cost, 1.0, price);
                let b = evaluate(&c, "SKU", cost, 1.0, price);
                prop_assert_eq!(a.status, b.status);
                prop_assert_eq!(a.error, b.error);
                prop_assert_eq!(a.margin, b.margin);
            }
        }
    }
}
