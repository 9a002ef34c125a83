//! Pricing campaigns: the base price list and time-boxed overrides.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pricebook_core::{CampaignId, DomainError, DomainResult};

use crate::item::CampaignContext;

/// Campaign kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignKind {
    /// The single always-on campaign defining canonical prices.
    Base,
    /// A time-boxed, prioritized override.
    Temporary,
}

impl CampaignKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignKind::Base => "base",
            CampaignKind::Temporary => "temporary",
        }
    }
}

impl FromStr for CampaignKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "base" => Ok(CampaignKind::Base),
            "temporary" => Ok(CampaignKind::Temporary),
            _ => Err(DomainError::validation("campaign type is not valid")),
        }
    }
}

/// Input for creating a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub kind: CampaignKind,
    pub priority: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Reference (URL) of the uploaded row file.
    pub filename: String,
}

/// Input for updating a campaign. `filename = None` keeps the current items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub name: String,
    pub priority: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub enabled: bool,
    pub filename: Option<String>,
    /// Base campaigns only: merge rows by SKU instead of replacing all items.
    #[serde(default)]
    pub upsert: bool,
}

/// A pricing campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub kind: CampaignKind,
    pub priority: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub filename: String,
    pub enabled: bool,
    /// Set once a price-list run consumed this campaign.
    pub applied: bool,
    pub upsert: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Derived on reads; never persisted.
    #[serde(default)]
    pub pending_items: u64,
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name is required"));
    }
    Ok(())
}

fn validate_filename(filename: &str) -> DomainResult<()> {
    url::Url::parse(filename.trim())
        .map(|_| ())
        .map_err(|_| DomainError::validation("filename is not valid"))
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<()> {
    if end < start {
        return Err(DomainError::validation("end date must not precede start date"));
    }
    Ok(())
}

impl Campaign {
    /// Build a new, disabled campaign. Store-level checks (one base, unique
    /// priority) are the caller's job.
    pub fn create(input: NewCampaign, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_name(&input.name)?;
        validate_filename(&input.filename)?;
        validate_window(input.start, input.end)?;

        Ok(Self {
            id: CampaignId::new(),
            name: input.name.trim().to_string(),
            kind: input.kind,
            priority: input.priority,
            start: input.start,
            end: input.end,
            filename: input.filename.trim().to_string(),
            enabled: false,
            applied: false,
            upsert: false,
            created_at: now,
            updated_at: now,
            pending_items: 0,
        })
    }

    /// Apply an update in place. The kind never changes; `upsert` is only
    /// honoured for base campaigns.
    pub fn apply_update(&mut self, update: &CampaignUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        validate_name(&update.name)?;
        validate_window(update.start, update.end)?;
        if let Some(filename) = update.filename.as_deref() {
            validate_filename(filename)?;
            self.filename = filename.trim().to_string();
        }

        self.name = update.name.trim().to_string();
        self.priority = update.priority;
        self.start = update.start;
        self.end = update.end;
        self.enabled = update.enabled;
        self.upsert = self.is_base() && update.upsert;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_base(&self) -> bool {
        self.kind == CampaignKind::Base
    }

    pub fn is_temporary(&self) -> bool {
        self.kind == CampaignKind::Temporary
    }

    /// Enabled and `now` inside the `[start, end]` window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.start <= now && now <= self.end
    }

    /// Temporary campaigns are switched off once their window has closed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_temporary() && self.end < now
    }

    pub fn context(&self, at: DateTime<Utc>) -> CampaignContext {
        CampaignContext {
            campaign_id: self.id,
            priority: self.priority,
            at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(kind: CampaignKind) -> NewCampaign {
        let now = Utc::now();
        NewCampaign {
            name: "Hot Sale".to_string(),
            kind,
            priority: 5,
            start: now - Duration::days(1),
            end: now + Duration::days(1),
            filename: "https://files.example.com/hot-sale.csv".to_string(),
        }
    }

    #[test]
    fn create_starts_disabled() {
        let c = Campaign::create(input(CampaignKind::Temporary), Utc::now()).unwrap();
        assert!(!c.enabled);
        assert!(!c.applied);
        assert!(!c.upsert);
    }

    #[test]
    fn create_rejects_empty_name() {
        let mut i = input(CampaignKind::Base);
        i.name = "  ".to_string();
        let err = Campaign::create(i, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("name is required"));
    }

    #[test]
    fn create_rejects_invalid_filename() {
        let mut i = input(CampaignKind::Base);
        i.filename = "not a url".to_string();
        let err = Campaign::create(i, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("filename is not valid"));
    }

    #[test]
    fn create_rejects_inverted_window() {
        let mut i = input(CampaignKind::Temporary);
        std::mem::swap(&mut i.start, &mut i.end);
        assert!(matches!(Campaign::create(i, Utc::now()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let err = "seasonal".parse::<CampaignKind>().unwrap_err();
        assert_eq!(err, DomainError::validation("campaign type is not valid"));
        assert_eq!("temporary".parse::<CampaignKind>().unwrap(), CampaignKind::Temporary);
    }

    #[test]
    fn active_window_is_inclusive() {
        let mut c = Campaign::create(input(CampaignKind::Temporary), Utc::now()).unwrap();
        c.enabled = true;
        assert!(c.is_active_at(c.start));
        assert!(c.is_active_at(c.end));
        assert!(!c.is_active_at(c.end + Duration::seconds(1)));

        c.enabled = false;
        assert!(!c.is_active_at(c.start));
    }

    #[test]
    fn only_temporary_campaigns_expire() {
        let now = Utc::now();
        let mut temp = Campaign::create(input(CampaignKind::Temporary), now).unwrap();
        temp.end = now - Duration::hours(1);
        temp.start = now - Duration::days(2);
        assert!(temp.is_expired_at(now));

        let mut base = Campaign::create(input(CampaignKind::Base), now).unwrap();
        base.end = now - Duration::hours(1);
        base.start = now - Duration::days(2);
        assert!(!base.is_expired_at(now));
    }

    #[test]
    fn upsert_is_ignored_for_temporary_campaigns() {
        let now = Utc::now();
        let mut c = Campaign::create(input(CampaignKind::Temporary), now).unwrap();
        let update = CampaignUpdate {
            name: "Renamed".to_string(),
            priority: 9,
            start: c.start,
            end: c.end,
            enabled: true,
            filename: None,
            upsert: true,
        };
        c.apply_update(&update, now).unwrap();
        assert_eq!(c.name, "Renamed");
        assert_eq!(c.priority, 9);
        assert!(c.enabled);
        assert!(!c.upsert);
        assert_eq!(c.filename, "https://files.example.com/hot-sale.csv");
    }
}
