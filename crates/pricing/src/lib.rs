//! Price resolution engine.
//!
//! Pure, deterministic computations over already-loaded data:
//!
//! - [`resolver`]: picks the winning price per SKU across the base campaign and
//!   active temporary campaigns.
//! - [`bundle`]: derives bundle (composite SKU) prices from their children.
//! - [`gate`]: change detection deciding whether a snapshot must be re-persisted.
//! - [`report`]: merges partner snapshots for price comparison reports.
//!
//! Loading inputs and persisting outputs is the infrastructure layer's job.

pub mod bundle;
pub mod gate;
pub mod records;
pub mod report;
pub mod resolver;

pub use bundle::{aggregate_bundle, round_to_nine, AggregatedBundle, BundleBatch, BundleCollector, BUNDLE_DISCOUNT};
pub use gate::{snapshot_changed, ChangeTracker, PublishGate, Snapshot};
pub use records::{BundleChild, BundleDefinition, BundleRecord, PriceRecord, SimpleSkuIndex, SkuPrice};
pub use report::{
    compare, index_pages, merge_catalog, CatalogPrice, PartnerPrice, PriceComparison, StorefrontItem,
};
pub use resolver::{resolve, PriorityTiers, Resolution};
