//! Priority resolution: one winning price per SKU.
//!
//! The base campaign defines the SKU universe. Active temporary campaigns are
//! stacked as priority tiers; for each base SKU the highest tier carrying an
//! approved item for it wins, regardless of whether its price is higher or
//! lower. Without a matching tier the base item wins.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use pricebook_campaigns::{Campaign, CampaignItem};
use pricebook_core::{CampaignId, DomainError, DomainResult};

use crate::gate::{snapshot_changed, ChangeTracker};
use crate::records::PriceRecord;

/// Approved override items of active temporary campaigns, by priority.
///
/// Iteration order is strictly descending priority. Priorities are unique by
/// invariant; if two campaigns did share one, their items merge into a single
/// tier and the later admitted item for a SKU replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct PriorityTiers {
    tiers: BTreeMap<Reverse<i32>, HashMap<String, CampaignItem>>,
    participants: Vec<CampaignId>,
}

impl PriorityTiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a campaign's items if the campaign is an enabled temporary one
    /// whose window contains `now`. Non-approved items are dropped.
    ///
    /// Returns whether the campaign was admitted.
    pub fn admit(
        &mut self,
        campaign: &Campaign,
        items: impl IntoIterator<Item = CampaignItem>,
        now: DateTime<Utc>,
    ) -> bool {
        if !campaign.is_temporary() || !campaign.is_active_at(now) {
            return false;
        }

        let tier = self.tiers.entry(Reverse(campaign.priority)).or_default();
        for mut item in items.into_iter().filter(|i| i.is_approved()) {
            // Items keep the priority they were imported with; the campaign's
            // current priority is authoritative.
            item.priority = campaign.priority;
            tier.insert(item.sku.clone(), item);
        }
        self.participants.push(campaign.id);
        true
    }

    /// Highest-priority approved override for `sku`.
    pub fn lookup(&self, sku: &str) -> Option<&CampaignItem> {
        self.tiers.values().find_map(|tier| tier.get(sku))
    }

    /// Distinct priorities, highest first.
    pub fn priorities(&self) -> Vec<i32> {
        self.tiers.keys().map(|Reverse(p)| *p).collect()
    }

    pub fn participants(&self) -> &[CampaignId] {
        &self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Output of a resolution run.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub records: Vec<PriceRecord>,
    /// Something differs from the previous price list; persist it.
    pub dirty: bool,
    /// Campaigns that took part (base first); they get `applied = true`.
    pub applied: Vec<CampaignId>,
}

/// Resolve the final price list.
///
/// Fails fast, before anything is computed, when the base campaign is not an
/// enabled base campaign or has no approved items.
pub fn resolve(
    base: &Campaign,
    base_items: &[CampaignItem],
    tiers: &PriorityTiers,
    previous: &[PriceRecord],
) -> DomainResult<Resolution> {
    if !base.is_base() || !base.enabled {
        return Err(DomainError::not_found("no enabled base campaign"));
    }

    let mut approved = base_items.iter().filter(|i| i.is_approved()).peekable();
    if approved.peek().is_none() {
        return Err(DomainError::not_found("base campaign has no approved skus"));
    }

    let stored: HashMap<&str, &PriceRecord> = previous.iter().map(|r| (r.sku.as_str(), r)).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::new();

    for base_item in approved {
        if !seen.insert(base_item.sku.as_str()) {
            continue;
        }

        let (winner, priority) = match tiers.lookup(&base_item.sku) {
            Some(item) => (item, item.priority),
            None => (base_item, base.priority),
        };
        let mut record = PriceRecord {
            sku: base_item.sku.clone(),
            price: winner.price,
            msrp: winner.msrp,
            cost: winner.cost,
            priority,
            published: false,
        };

        if let Some(prev) = stored.get(record.sku.as_str()) {
            record.published = prev.published && !record.price_moved_from(prev);
        }

        records.push(record);
    }

    let mut tracker = ChangeTracker::new();
    tracker.mark_if(snapshot_changed(previous, &records));

    let mut applied = Vec::with_capacity(tiers.participants().len() + 1);
    applied.push(base.id);
    applied.extend_from_slice(tiers.participants());

    Ok(Resolution {
        records,
        dirty: tracker.is_dirty(),
        applied,
    })
}
