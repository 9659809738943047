//! Recommendation service
//!
//! Orchestrates the pure engine over the injected stores. Catalog reads that
//! fail degrade to an empty catalog with a warning; collection writes and
//! reads propagate their errors.
//!
//! **Protocol flow:**
//! 1. Fetch candidates once, score and rank, persist as the current run
//! 2. Tier rules plus ranked candidates into a `Protocol`
//! 3. Fetch products once, batch-match every protocol item
//! 4. Filter against the user's existing keys, upsert what is new

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use wellpath_common::models::{AssessmentSignals, CandidateItem, CatalogProduct, ItemType, ProtocolItem, UserContext};
use wellpath_common::{EngineThresholds, Result};

use crate::bundle::{Bundle, BundleCalculator};
use crate::dedup::{dedup_key, item_key, DeduplicationGuard};
use crate::matching::{FuzzyMatcher, MatchResult};
use crate::scoring::{ScoredCandidate, SuitabilityScorer};
use crate::store::{CatalogStore, UserCollectionStore};
use crate::tiers::{Protocol, TierGenerator};

/// Result of building and saving a protocol
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolOutcome {
    pub protocol: Protocol,
    pub matches: Vec<MatchResult>,
    /// Items written to the collection, with their matched product
    pub inserted: Vec<ProtocolItem>,
    /// Items already present (or repeated in this run)
    pub duplicates: Vec<ProtocolItem>,
}

/// Result of a single-item add
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "item", rename_all = "lowercase")]
pub enum AddOutcome {
    Added(ProtocolItem),
    Duplicate(ProtocolItem),
}

pub struct RecommendationService {
    catalog: Arc<dyn CatalogStore>,
    collection: Arc<dyn UserCollectionStore>,
    scorer: SuitabilityScorer,
    generator: TierGenerator,
    matcher: FuzzyMatcher,
    guard: DeduplicationGuard,
    calculator: BundleCalculator,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        collection: Arc<dyn UserCollectionStore>,
        thresholds: &EngineThresholds,
    ) -> Self {
        Self {
            catalog,
            collection,
            scorer: SuitabilityScorer::from_thresholds(thresholds),
            generator: TierGenerator::from_thresholds(thresholds),
            matcher: FuzzyMatcher::from_thresholds(thresholds),
            guard: DeduplicationGuard::new(),
            calculator: BundleCalculator::from_thresholds(thresholds),
        }
    }

    async fn fetch_candidates(&self) -> Vec<CandidateItem> {
        self.catalog.active_candidates().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Candidate fetch failed, continuing with empty catalog");
            Vec::new()
        })
    }

    async fn fetch_products(&self) -> Vec<CatalogProduct> {
        self.catalog.active_products().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Product fetch failed, continuing without products");
            Vec::new()
        })
    }

    /// Score the catalog for a user and store the run as current
    pub async fn recommend(&self, user_id: &str, user: &UserContext) -> Result<Vec<ScoredCandidate>> {
        let candidates = self.fetch_candidates().await;
        let recommendations = self.scorer.generate_recommendations(&candidates, user);
        self.collection
            .replace_recommendations(user_id, &recommendations)
            .await?;

        Ok(recommendations)
    }

    /// Recommend, tier, match and save a protocol
    pub async fn build_protocol(
        &self,
        user_id: &str,
        user: &UserContext,
        signals: &AssessmentSignals,
    ) -> Result<ProtocolOutcome> {
        let recommendations = self.recommend(user_id, user).await?;
        let protocol = self.generator.generate(signals, &recommendations);

        let items: Vec<ProtocolItem> = protocol.items().cloned().collect();
        let products = self.fetch_products().await;
        let matches = self.matcher.match_items(&items, &products);

        let linked: Vec<ProtocolItem> = matches
            .iter()
            .map(|result| {
                let mut item = result.item.clone();
                if let Some(product) = &result.product {
                    item.product_id = Some(product.id.clone());
                }
                item
            })
            .collect();

        let existing = self.collection.existing_keys(user_id).await?;
        let outcome = self.guard.filter_new(linked, &existing);

        let mut inserted = Vec::new();
        let mut duplicates = outcome.duplicates;
        for item in outcome.unique {
            if self.collection.upsert_item(user_id, &item).await? {
                inserted.push(item);
            } else {
                duplicates.push(item);
            }
        }

        tracing::info!(
            user_id = %user_id,
            protocol = protocol.len(),
            matched = matches.iter().filter(|m| m.is_matched()).count(),
            inserted = inserted.len(),
            duplicates = duplicates.len(),
            "Built protocol"
        );

        Ok(ProtocolOutcome {
            protocol,
            matches,
            inserted,
            duplicates,
        })
    }

    /// Add one item through the same dedup guard as protocol saves
    pub async fn add_item(&self, user_id: &str, mut item: ProtocolItem) -> Result<AddOutcome> {
        let existing = self.collection.existing_keys(user_id).await?;
        if self.guard.is_duplicate(&item, &existing) {
            tracing::debug!(user_id = %user_id, item = %item.name, "Item already in collection");
            return Ok(AddOutcome::Duplicate(item));
        }

        if item.item_type == ItemType::Supplement && item.product_id.is_none() {
            let products = self.fetch_products().await;
            item.product_id = self
                .matcher
                .match_product(&item.name, item.item_type.as_str(), &products)
                .map(|product| product.id.clone());
        }

        if self.collection.upsert_item(user_id, &item).await? {
            tracing::info!(user_id = %user_id, item = %item.name, "Added item to collection");
            Ok(AddOutcome::Added(item))
        } else {
            Ok(AddOutcome::Duplicate(item))
        }
    }

    /// Deactivate an item by name and type; `false` when nothing matched
    pub async fn remove_item(&self, user_id: &str, name: &str, item_type: ItemType) -> Result<bool> {
        let removed = self
            .collection
            .deactivate_item(user_id, &dedup_key(name, item_type.as_str()))
            .await?;
        tracing::info!(user_id = %user_id, item = %name, removed, "Remove item");
        Ok(removed)
    }

    /// Match unlinked supplements against one catalog fetch and store the links
    pub async fn link_products(&self, user_id: &str) -> Result<Vec<MatchResult>> {
        let unlinked: Vec<ProtocolItem> = self
            .collection
            .active_items(user_id)
            .await?
            .into_iter()
            .filter(|item| item.product_id.is_none() && item.is_supplement())
            .collect();
        if unlinked.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.fetch_products().await;
        let results = self.matcher.match_items(&unlinked, &products);

        let mut linked: HashSet<String> = HashSet::new();
        for result in &results {
            if let Some(product) = &result.product {
                let key = item_key(&result.item);
                if self.collection.link_product(user_id, &key, &product.id).await? {
                    linked.insert(key);
                }
            }
        }

        tracing::info!(
            user_id = %user_id,
            unlinked = unlinked.len(),
            linked = linked.len(),
            "Linked collection items to products"
        );
        Ok(results)
    }

    /// Price the user's active collection
    pub async fn bundle(&self, user_id: &str) -> Result<Bundle> {
        let items = self.collection.active_items(user_id).await?;
        let products = self.fetch_products().await;
        Ok(self.calculator.calculate(&items, &products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;
    use wellpath_common::models::{CatalogFile, Domain, DomainSignal, ProtocolCategory, Severity};

    fn catalog() -> CatalogFile {
        CatalogFile {
            candidates: vec![
                CandidateItem::new("c-cold", "Cold Exposure Therapy")
                    .with_type(ItemType::Therapy)
                    .with_symptoms(["hot-flashes", "anxiety"])
                    .with_contraindication("Pregnancy", Severity::High),
                CandidateItem::new("c-mag", "Magnesium Glycinate")
                    .with_type(ItemType::Supplement)
                    .with_symptoms(["poor-sleep"]),
            ],
            products: vec![
                CatalogProduct::new("p-mag", "Magnesium Glycinate Capsules", "Acme")
                    .with_price("USD", Decimal::new(2450, 2)),
                CatalogProduct::new("p-d3", "Vitamin D3 5000 IU", "Acme").with_price("USD", Decimal::new(1200, 2)),
            ],
        }
    }

    fn service(store: Arc<InMemoryStore>) -> RecommendationService {
        RecommendationService::new(store.clone(), store, &EngineThresholds::default())
    }

    fn user() -> UserContext {
        UserContext::new().with_symptoms(["hot-flashes", "poor-sleep"])
    }

    #[tokio::test]
    async fn test_recommend_persists_current_run() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());

        let recs = service.recommend("u1", &user()).await.unwrap();
        service.recommend("u1", &user()).await.unwrap();

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].candidate.id, "c-mag");
        assert_eq!(store.current_recommendations("u1").await.unwrap().len(), 2);
        assert_eq!(store.recommendation_history_len("u1").await, 4);
    }

    #[tokio::test]
    async fn test_malformed_catalog_row_does_not_block_the_rest() {
        let json = r#"{"candidates": [
            {"id": "c-bad", "name": "Broken Row", "target_symptoms": "anxiety",
             "contraindications": [{"condition": "Pregnancy", "severity": 3}, {"severity": "high"}]},
            {"id": "c-ash", "name": "Ashwagandha", "item_type": "supplement", "target_symptoms": ["anxiety"]}
        ]}"#;
        let catalog: CatalogFile = serde_json::from_str(json).unwrap();
        let store = Arc::new(InMemoryStore::with_catalog(catalog));
        let ctx = UserContext::new().with_symptoms(["anxiety"]);

        let recs = service(store).recommend("u1", &ctx).await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].candidate.id, "c-ash");
        assert_eq!(recs[0].combined, 100.0);
    }

    #[tokio::test]
    async fn test_failed_catalog_fetch_is_empty_not_error() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        store.set_catalog_offline(true);

        let recs = service(store).recommend("u1", &user()).await.unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_build_protocol_links_and_saves() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());
        let signals = AssessmentSignals::new()
            .with_domain(DomainSignal::new(Domain::Nutrition).with_flag("critical_nutrient_gap"));

        let outcome = service.build_protocol("u1", &user(), &signals).await.unwrap();

        assert_eq!(outcome.protocol.len(), 3);
        assert_eq!(outcome.inserted.len(), 3);
        assert!(outcome.duplicates.is_empty());

        let d3 = outcome.inserted.iter().find(|i| i.name == "Vitamin D3").unwrap();
        assert_eq!(d3.product_id.as_deref(), Some("p-d3"));
        assert_eq!(d3.category, ProtocolCategory::Immediate);

        let therapy = outcome
            .inserted
            .iter()
            .find(|i| i.name == "Cold Exposure Therapy")
            .unwrap();
        assert!(therapy.product_id.is_none());
    }

    #[tokio::test]
    async fn test_rebuilding_protocol_inserts_nothing_new() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());
        let signals = AssessmentSignals::new();

        service.build_protocol("u1", &user(), &signals).await.unwrap();
        let second = service.build_protocol("u1", &user(), &signals).await.unwrap();

        assert!(second.inserted.is_empty());
        assert_eq!(second.duplicates.len(), 2);
        assert_eq!(store.active_items("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_item_matches_supplement_and_rejects_duplicate() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());
        let item = ProtocolItem::new("Magnesium Glycinate", ItemType::Supplement, ProtocolCategory::Foundation);

        let first = service.add_item("u1", item.clone()).await.unwrap();
        let mut respaced = item.clone();
        respaced.name = "magnesium   glycinate".to_string();
        let second = service.add_item("u1", respaced).await.unwrap();

        match first {
            AddOutcome::Added(added) => assert_eq!(added.product_id.as_deref(), Some("p-mag")),
            other => panic!("expected Added, got {:?}", other),
        }
        assert!(matches!(second, AddOutcome::Duplicate(_)));
        assert_eq!(store.active_items("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_link_products_then_bundle() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());
        for name in ["Vitamin D3", "Box Breathing", "Unknown Herb"] {
            let item_type = if name == "Box Breathing" { ItemType::Therapy } else { ItemType::Supplement };
            store
                .upsert_item("u1", &ProtocolItem::new(name, item_type, ProtocolCategory::Foundation))
                .await
                .unwrap();
        }

        let results = service.link_products("u1").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_matched()).count(), 1);

        let items = store.active_items("u1").await.unwrap();
        assert_eq!(items[0].product_id.as_deref(), Some("p-d3"));

        let bundle = service.bundle("u1").await.unwrap();
        assert_eq!(bundle.total_items, 1);
        assert_eq!(bundle.base_price, Decimal::new(1200, 2));
        assert_eq!(bundle.excluded.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_item_allows_re_adding() {
        let store = Arc::new(InMemoryStore::with_catalog(catalog()));
        let service = service(store.clone());
        let item = ProtocolItem::new("Zinc", ItemType::Supplement, ProtocolCategory::Foundation);

        service.add_item("u1", item.clone()).await.unwrap();
        assert!(service.remove_item("u1", "ZINC", ItemType::Supplement).await.unwrap());
        assert!(!service.remove_item("u1", "Zinc", ItemType::Supplement).await.unwrap());

        assert!(matches!(service.add_item("u1", item).await.unwrap(), AddOutcome::Added(_)));
    }
}
