//! Change detection and the publish gate.
//!
//! A recomputed snapshot (price list or bundle set) replaces the stored one only
//! when something actually changed. Rewriting an unchanged snapshot would
//! needlessly rewrite the whole collection and could reset `published` flags
//! consumers rely on.

use std::collections::{HashMap, HashSet};

use crate::records::{BundleRecord, PriceRecord};

/// Records that form a keyed snapshot.
pub trait Snapshot: PartialEq {
    fn key(&self) -> &str;
}

impl Snapshot for PriceRecord {
    fn key(&self) -> &str {
        &self.sku
    }
}

impl Snapshot for BundleRecord {
    fn key(&self) -> &str {
        &self.parent_sku
    }
}

/// Monotonic dirty flag: once raised it stays raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    dirty: bool,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self) {
        self.dirty = true;
    }

    pub fn mark_if(&mut self, changed: bool) {
        self.dirty |= changed;
    }

    pub fn merge(&mut self, other: ChangeTracker) {
        self.dirty |= other.dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Decides whether a freshly computed snapshot gets persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishGate;

impl PublishGate {
    /// Persist (delete-all + bulk insert) only when something changed.
    pub fn should_persist(dirty: bool) -> bool {
        dirty
    }
}

/// `true` when keys were added or removed, or any record with the same key
/// differs from its stored version.
pub fn snapshot_changed<T: Snapshot>(previous: &[T], next: &[T]) -> bool {
    if previous.len() != next.len() {
        return true;
    }

    let stored: HashMap<&str, &T> = previous.iter().map(|r| (r.key(), r)).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(next.len());

    for record in next {
        seen.insert(record.key());
        match stored.get(record.key()) {
            Some(prev) if *prev == record => {}
            _ => return true,
        }
    }

    // Duplicated keys in `next` can hide a removed key behind equal lengths.
    seen.len() != stored.len()
}
