//! In-memory store for tests and dry runs
//!
//! Mirrors `SqliteStore` semantics: collection rows are keyed by
//! `(user_id, dedup_key)`, deactivated rows are kept, recommendation runs
//! are superseded rather than dropped.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;
use wellpath_common::models::{CandidateItem, CatalogFile, CatalogProduct, ProtocolItem};
use wellpath_common::{Error, Result};

use super::{CatalogStore, StoredRecommendation, UserCollectionStore};
use crate::dedup::item_key;
use crate::scoring::ScoredCandidate;

#[derive(Debug, Clone)]
struct CollectionRow {
    key: String,
    item: ProtocolItem,
    active: bool,
}

#[derive(Debug, Clone)]
struct RecommendationRow {
    recommendation: StoredRecommendation,
    is_current: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    candidates: RwLock<Vec<CandidateItem>>,
    products: RwLock<Vec<CatalogProduct>>,
    collections: RwLock<HashMap<String, Vec<CollectionRow>>>,
    recommendations: RwLock<HashMap<String, Vec<RecommendationRow>>>,
    catalog_offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: CatalogFile) -> Self {
        Self {
            candidates: RwLock::new(catalog.candidates),
            products: RwLock::new(catalog.products),
            ..Self::default()
        }
    }

    /// Make every catalog read fail until switched back
    pub fn set_catalog_offline(&self, offline: bool) {
        self.catalog_offline.store(offline, Ordering::SeqCst);
    }

    fn check_catalog(&self) -> Result<()> {
        if self.catalog_offline.load(Ordering::SeqCst) {
            return Err(Error::Internal("catalog store offline".to_string()));
        }
        Ok(())
    }

    /// Number of stored recommendation rows for a user, superseded included
    pub async fn recommendation_history_len(&self, user_id: &str) -> usize {
        self.recommendations
            .read()
            .await
            .get(user_id)
            .map_or(0, |rows| rows.len())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn active_candidates(&self) -> Result<Vec<CandidateItem>> {
        self.check_catalog()?;
        Ok(self.candidates.read().await.clone())
    }

    async fn active_products(&self) -> Result<Vec<CatalogProduct>> {
        self.check_catalog()?;
        Ok(self.products.read().await.clone())
    }
}

#[async_trait]
impl UserCollectionStore for InMemoryStore {
    async fn existing_keys(&self, user_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .collections
            .read()
            .await
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.active)
                    .map(|row| row.key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_items(&self, user_id: &str) -> Result<Vec<ProtocolItem>> {
        Ok(self
            .collections
            .read()
            .await
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.active)
                    .map(|row| row.item.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_item(&self, user_id: &str, item: &ProtocolItem) -> Result<bool> {
        let key = item_key(item);
        let mut collections = self.collections.write().await;
        let rows = collections.entry(user_id.to_string()).or_default();

        match rows.iter_mut().find(|row| row.key == key) {
            Some(row) if row.active => Ok(false),
            Some(row) => {
                let product_id = item.product_id.clone().or_else(|| row.item.product_id.take());
                row.item = item.clone();
                row.item.product_id = product_id;
                row.active = true;
                Ok(true)
            }
            None => {
                rows.push(CollectionRow {
                    key,
                    item: item.clone(),
                    active: true,
                });
                Ok(true)
            }
        }
    }

    async fn link_product(&self, user_id: &str, dedup_key: &str, product_id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let row = collections
            .get_mut(user_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.active && row.key == dedup_key));

        Ok(match row {
            Some(row) => {
                row.item.product_id = Some(product_id.to_string());
                true
            }
            None => false,
        })
    }

    async fn deactivate_item(&self, user_id: &str, dedup_key: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let row = collections
            .get_mut(user_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.active && row.key == dedup_key));

        Ok(match row {
            Some(row) => {
                row.active = false;
                true
            }
            None => false,
        })
    }

    async fn replace_recommendations(&self, user_id: &str, recommendations: &[ScoredCandidate]) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        let mut all = self.recommendations.write().await;
        let rows = all.entry(user_id.to_string()).or_default();

        for row in rows.iter_mut() {
            row.is_current = false;
        }
        rows.extend(recommendations.iter().map(|scored| RecommendationRow {
            recommendation: StoredRecommendation::from_scored(run_id, scored),
            is_current: true,
        }));

        Ok(run_id)
    }

    async fn current_recommendations(&self, user_id: &str) -> Result<Vec<StoredRecommendation>> {
        let all = self.recommendations.read().await;
        let mut current: Vec<StoredRecommendation> = all
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.is_current)
                    .map(|row| row.recommendation.clone())
                    .collect()
            })
            .unwrap_or_default();
        current.sort_by_key(|rec| rec.priority_rank);

        Ok(current)
    }
}
