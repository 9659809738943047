//! Deduplication Guard
//!
//! Identity of a protocol item inside one user's collection is
//! `normalize(name) + "|" + item_type`. The guard splits a batch into items
//! not yet present and items that would duplicate an existing (or earlier
//! in-batch) entry. The same function backs bulk protocol saves and
//! single-item adds.
//!
//! The persistence layer's unique constraint on `(user_id, dedup_key)` stays
//! the source of truth; this guard only avoids pointless writes.

use serde::Serialize;
use std::collections::HashSet;
use wellpath_common::models::ProtocolItem;

use crate::matching::normalize;

/// Identity key of an item within one user's collection
pub fn dedup_key(name: &str, item_type: &str) -> String {
    format!("{}|{}", normalize(name), item_type.trim().to_lowercase())
}

/// Key of a protocol item
pub fn item_key(item: &ProtocolItem) -> String {
    dedup_key(&item.name, item.item_type.as_str())
}

/// Result of filtering a batch against existing keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupOutcome {
    pub unique: Vec<ProtocolItem>,
    pub duplicates: Vec<ProtocolItem>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeduplicationGuard;

impl DeduplicationGuard {
    pub fn new() -> Self {
        Self
    }

    /// Partition `candidates` into new and duplicate items
    ///
    /// **Algorithm:**
    /// 1. Compute each item's key
    /// 2. Key in `existing_keys` or already seen in this batch → duplicate
    /// 3. Otherwise unique, remembered for the rest of the batch
    ///
    /// Input order is preserved in both lists. `existing_keys` is not touched.
    pub fn filter_new(
        &self,
        candidates: Vec<ProtocolItem>,
        existing_keys: &HashSet<String>,
    ) -> DedupOutcome {
        let mut seen: HashSet<String> = HashSet::new();
        let mut outcome = DedupOutcome::default();

        for item in candidates {
            let key = item_key(&item);
            if existing_keys.contains(&key) || !seen.insert(key.clone()) {
                tracing::debug!(key = %key, "Skipping duplicate protocol item");
                outcome.duplicates.push(item);
            } else {
                outcome.unique.push(item);
            }
        }

        outcome
    }

    /// True when a single item is already in the collection
    pub fn is_duplicate(&self, item: &ProtocolItem, existing_keys: &HashSet<String>) -> bool {
        existing_keys.contains(&item_key(item))
    }
}
