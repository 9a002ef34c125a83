//! Infrastructure layer: storage, row sources, Redis, config and the pricing
//! services that tie them to the pure domain crates.

pub mod bundles;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod exporter;
pub mod lifecycle;
pub mod price_list;
pub mod report;
pub mod row_source;
pub mod store;


pub use bundles::BundleService;
pub use config::{ConfigError, PipelineTask, PricebookConfig};
pub use error::{ServiceError, ServiceResult};
pub use exporter::{ExportError, ExportKind, ExportService};
pub use lifecycle::{CampaignLifecycle, ITEM_BATCH_SIZE};
pub use price_list::{PriceListService, RunOutcome};
pub use report::{partner_comparison, ReportService};
pub use row_source::{RawRow, RowSource, RowSourceError, StaticRowSource, UrlRowSource};
pub use store::{InMemoryPricingStore, PostgresPricingStore, PricingStore, StoreError};
