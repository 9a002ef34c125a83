//! Campaigns domain module.
//!
//! Business rules for pricing campaigns and their items, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Time is always an
//! explicit input.

pub mod campaign;
pub mod item;

pub use campaign::{Campaign, CampaignKind, CampaignUpdate, NewCampaign};
pub use item::{
    evaluate, is_approvable_margin, margin, CampaignContext, CampaignItem, CostSource,
    ItemRejection, ItemStatus, PendingBreakdown, APPROVAL_MARGIN, TAX_FACTOR,
};
