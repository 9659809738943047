//! Persistence seams
//!
//! The engine core is pure; everything it reads or writes goes through these
//! two traits. `SqliteStore` backs the CLI, `InMemoryStore` backs tests.
//!
//! Collection writes are keyed by `(user_id, dedup_key)` and are upserts:
//! re-adding an existing active item is a no-op, never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;
use wellpath_common::models::{CandidateItem, CatalogProduct, Contraindication, ProtocolItem};
use wellpath_common::Result;

use crate::scoring::ScoredCandidate;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::{ImportSummary, SqliteStore};

/// Read access to the shared catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active candidates in catalog order
    async fn active_candidates(&self) -> Result<Vec<CandidateItem>>;

    /// Active products in catalog order
    async fn active_products(&self) -> Result<Vec<CatalogProduct>>;
}

/// Per-user collection of protocol items and recommendation runs
#[async_trait]
pub trait UserCollectionStore: Send + Sync {
    /// Dedup keys of the user's active items
    async fn existing_keys(&self, user_id: &str) -> Result<HashSet<String>>;

    /// Active items in insertion order
    async fn active_items(&self, user_id: &str) -> Result<Vec<ProtocolItem>>;

    /// Insert (or reactivate) an item; `false` when it was already active
    async fn upsert_item(&self, user_id: &str, item: &ProtocolItem) -> Result<bool>;

    /// Attach a catalog product to an active item; `false` when no such item
    async fn link_product(&self, user_id: &str, dedup_key: &str, product_id: &str) -> Result<bool>;

    /// Deactivate an item; `false` when no active item had that key
    async fn deactivate_item(&self, user_id: &str, dedup_key: &str) -> Result<bool>;

    /// Store a new recommendation run and supersede the previous one
    async fn replace_recommendations(&self, user_id: &str, recommendations: &[ScoredCandidate]) -> Result<Uuid>;

    /// Recommendations of the current run, by rank
    async fn current_recommendations(&self, user_id: &str) -> Result<Vec<StoredRecommendation>>;
}

/// A persisted recommendation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub run_id: Uuid,
    pub candidate_id: String,
    pub suitability: u8,
    pub applicability: u8,
    pub combined: f64,
    pub matched_symptoms: BTreeSet<String>,
    pub flagged_contraindications: Vec<Contraindication>,
    pub priority_rank: usize,
}

impl StoredRecommendation {
    pub fn from_scored(run_id: Uuid, scored: &ScoredCandidate) -> Self {
        Self {
            run_id,
            candidate_id: scored.candidate.id.clone(),
            suitability: scored.suitability,
            applicability: scored.applicability,
            combined: scored.combined,
            matched_symptoms: scored.matched_symptoms.clone(),
            flagged_contraindications: scored.flagged_contraindications.clone(),
            priority_rank: scored.priority_rank,
        }
    }
}
