//! Bundle ("group") price aggregation.
//!
//! A bundle's price is derived from its children in the simple-SKU price list.
//! Each bundle is independent of the others, so callers may aggregate them
//! concurrently and feed results into a [`BundleCollector`].

use crate::gate::{snapshot_changed, ChangeTracker};
use crate::records::{BundleDefinition, BundleRecord, SimpleSkuIndex};

/// Discount applied to the summed child prices.
pub const BUNDLE_DISCOUNT: f64 = 0.95;

/// Round up to the nearest whole value ending in 9 (".99"-style pricing).
///
/// The fractional part is dropped first: 123.5 -> 129, 130 -> 139, 129 -> 129.
pub fn round_to_nine(x: f64) -> f64 {
    let whole = x.trunc() as i64;
    let last_digit = (whole % 10).abs();
    (whole + (9 - last_digit)) as f64
}

/// Result of aggregating one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedBundle {
    pub record: BundleRecord,
    /// At least one child was missing from the index or unpublished.
    pub degraded: bool,
}

/// Compute one bundle's price, MSRP and cost.
///
/// Children missing from the index are skipped (partial bundles are fine).
/// A bundle without any priced child is still emitted, with zeros.
pub fn aggregate_bundle(definition: &BundleDefinition, index: &SimpleSkuIndex) -> AggregatedBundle {
    let mut msrp = 0.0;
    let mut price = 0.0;
    let mut cost = 0.0;
    let mut published = true;
    let mut degraded = false;

    for child in &definition.children {
        let Some(sku) = index.get(&child.sku) else {
            degraded = true;
            continue;
        };

        if !sku.published {
            published = false;
            degraded = true;
        }

        let qty = f64::from(child.qty);
        msrp += qty * sku.list_price();
        price += qty * sku.price;
        cost += qty * sku.cost;
    }

    let record = if price > 0.0 {
        BundleRecord {
            parent_sku: definition.parent_sku.clone(),
            price: round_to_nine(price * BUNDLE_DISCOUNT),
            msrp,
            cost,
            published,
            processed: true,
        }
    } else {
        BundleRecord {
            parent_sku: definition.parent_sku.clone(),
            price: 0.0,
            msrp: 0.0,
            cost: 0.0,
            published,
            processed: true,
        }
    };

    AggregatedBundle { record, degraded }
}

/// Append-only sink for aggregated bundles plus the run-level dirty flag.
///
/// Not synchronized itself; concurrent producers wrap it in a single lock so
/// records and the flag are always updated together.
#[derive(Debug, Default)]
pub struct BundleCollector {
    records: Vec<BundleRecord>,
    tracker: ChangeTracker,
}

/// Final, ordered output of a bundle run.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleBatch {
    /// Sorted by parent SKU.
    pub records: Vec<BundleRecord>,
    pub dirty: bool,
}

impl BundleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bundle: AggregatedBundle) {
        self.tracker.mark_if(bundle.degraded);
        self.records.push(bundle.record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Order the records deterministically and compare against the stored set.
    pub fn finish(mut self, previous: &[BundleRecord]) -> BundleBatch {
        self.records.sort_by(|a, b| a.parent_sku.cmp(&b.parent_sku));
        self.tracker.mark_if(snapshot_changed(previous, &self.records));
        BundleBatch {
            records: self.records,
            dirty: self.tracker.is_dirty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BundleChild, SkuPrice};

    fn index(entries: &[(&str, f64, f64, f64, bool)]) -> SimpleSkuIndex {
        entries
            .iter()
            .map(|(sku, price, msrp, cost, published)| {
                (
                    sku.to_string(),
                    SkuPrice {
                        price: *price,
                        msrp: *msrp,
                        cost: *cost,
                        published: *published,
                    },
                )
            })
            .collect()
    }

    fn bundle(parent: &str, children: &[(&str, u32)]) -> BundleDefinition {
        BundleDefinition {
            parent_sku: parent.to_string(),
            children: children
                .iter()
                .map(|(sku, qty)| BundleChild {
                    sku: sku.to_string(),
                    qty: *qty,
                })
                .collect(),
        }
    }

    #[test]
    fn round_to_nine_examples() {
        assert_eq!(round_to_nine(123.0), 129.0);
        assert_eq!(round_to_nine(130.0), 139.0);
        assert_eq!(round_to_nine(129.0), 129.0);
        assert_eq!(round_to_nine(1000.0), 1009.0);
        assert_eq!(round_to_nine(123.5), 129.0);
        assert_eq!(round_to_nine(0.4), 9.0);
    }

    #[test]
    fn unpublished_child_propagates_to_bundle() {
        let idx = index(&[("sku1", 50.0, 0.0, 20.0, true), ("sku2", 30.0, 0.0, 10.0, false)]);
        let out = aggregate_bundle(&bundle("P", &[("sku1", 2), ("sku2", 1)]), &idx);

        // 130 * 0.95 = 123.5 -> 129
        assert_eq!(out.record.price, 129.0);
        assert_eq!(out.record.msrp, 130.0);
        assert_eq!(out.record.cost, 50.0);
        assert!(!out.record.published);
        assert!(out.record.processed);
        assert!(out.degraded);
    }

    #[test]
    fn msrp_prefers_child_msrp_over_price() {
        let idx = index(&[("a", 100.0, 150.0, 40.0, true), ("b", 20.0, 0.0, 5.0, true)]);
        let out = aggregate_bundle(&bundle("P", &[("a", 1), ("b", 3)]), &idx);

        assert_eq!(out.record.msrp, 150.0 + 60.0);
        assert_eq!(out.record.cost, 55.0);
        // 160 * 0.95 = 152 -> 159
        assert_eq!(out.record.price, 159.0);
        assert!(out.record.published);
        assert!(!out.degraded);
    }

    #[test]
    fn missing_children_are_skipped() {
        let idx = index(&[("a", 100.0, 0.0, 40.0, true)]);
        let out = aggregate_bundle(&bundle("P", &[("a", 1), ("ghost", 4)]), &idx);

        // 100 * 0.95 = 95 -> 99
        assert_eq!(out.record.price, 99.0);
        assert!(out.record.published);
        assert!(out.degraded);
    }

    #[test]
    fn unpriced_bundle_is_emitted_with_zeros() {
        let idx = index(&[("free", 0.0, 10.0, 3.0, true)]);
        let out = aggregate_bundle(&bundle("P", &[("free", 2), ("ghost", 1)]), &idx);

        assert_eq!(out.record.parent_sku, "P");
        assert_eq!(out.record.price, 0.0);
        assert_eq!(out.record.msrp, 0.0);
        assert_eq!(out.record.cost, 0.0);
        assert!(out.record.processed);
    }

    #[test]
    fn collector_sorts_and_tracks_dirty() {
        let idx = index(&[("a", 100.0, 0.0, 40.0, true)]);
        let mut collector = BundleCollector::new();
        collector.push(aggregate_bundle(&bundle("Z", &[("a", 1)]), &idx));
        collector.push(aggregate_bundle(&bundle("M", &[("a", 2)]), &idx));
        assert_eq!(collector.len(), 2);

        let first = collector.finish(&[]);
        assert!(first.dirty);
        assert_eq!(first.records[0].parent_sku, "M");
        assert_eq!(first.records[1].parent_sku, "Z");

        let mut again = BundleCollector::new();
        again.push(aggregate_bundle(&bundle("M", &[("a", 2)]), &idx));
        again.push(aggregate_bundle(&bundle("Z", &[("a", 1)]), &idx));
        let second = again.finish(&first.records);
        assert!(!second.dirty);
    }

    #[test]
    fn degraded_bundle_keeps_run_dirty_even_if_unchanged() {
        let idx = index(&[("a", 100.0, 0.0, 40.0, false)]);
        let mut first = BundleCollector::new();
        first.push(aggregate_bundle(&bundle("P", &[("a", 1)]), &idx));
        let first = first.finish(&[]);

        let mut second = BundleCollector::new();
        second.push(aggregate_bundle(&bundle("P", &[("a", 1)]), &idx));
        assert!(second.finish(&first.records).dirty);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: result ends in 9, is >= the integer part and < it + 10.
            #[test]
            fn round_to_nine_ends_in_nine(x in 0.0f64..1_000_000.0) {
                let r = round_to_nine(x);
                let whole = x.trunc();
                prop_assert_eq!((r as i64) % 10, 9);
                prop_assert!(r >= whole);
                prop_assert!(r < whole + 10.0);
            }
        }
    }
}
