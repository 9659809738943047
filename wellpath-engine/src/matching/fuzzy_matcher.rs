//! Fuzzy Matcher
//!
//! Links a free-text intervention name to the best priced catalog product.
//!
//! **Scoring (0-100 per product):**
//! - 100 when normalized names are equal
//! - 90 when both names resolve to the same synonym entry
//! - otherwise `similarity * 80`
//!
//! The highest score wins (first maximum in catalog order on ties) and is
//! accepted only at or above the acceptance score (default 30). Anything
//! below is "no match", never a low-confidence guess.
//!
//! Only supplement items are matched; other item types are not expected to
//! exist in the priced catalog.

use serde::Serialize;
use wellpath_common::models::{CatalogProduct, ItemType, ProtocolItem};
use wellpath_common::EngineThresholds;

use super::normalizer::normalize;
use super::similarity::similarity;
use super::synonyms::are_synonyms;

/// Outcome of matching one protocol item (not persisted)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub item: ProtocolItem,
    pub product: Option<CatalogProduct>,
    /// Best score seen, including a rejected one
    pub score: f64,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.product.is_some()
    }
}

/// Highest-scoring product for a name, before the acceptance check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductMatch<'a> {
    pub product: &'a CatalogProduct,
    pub score: f64,
}

/// Fuzzy Matcher
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Minimum accepted score (default 30)
    acceptance_score: f64,
    /// Score for equal normalized names (default 100)
    exact_score: f64,
    /// Score for synonym hits (default 90)
    synonym_score: f64,
    /// Similarity multiplier (default 80)
    similarity_weight: f64,
}

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self::from_thresholds(&EngineThresholds::default())
    }

    pub fn from_thresholds(thresholds: &EngineThresholds) -> Self {
        Self {
            acceptance_score: thresholds.match_acceptance_score,
            exact_score: thresholds.exact_match_score,
            synonym_score: thresholds.synonym_match_score,
            similarity_weight: thresholds.similarity_weight,
        }
    }

    /// True when `score` clears the acceptance threshold
    pub fn accepts(&self, score: f64) -> bool {
        score >= self.acceptance_score
    }

    /// 0-100 score of one product against an item name
    pub fn score_product(&self, item_name: &str, product: &CatalogProduct) -> f64 {
        self.score_normalized(&normalize(item_name), product)
    }

    fn score_normalized(&self, normalized_item: &str, product: &CatalogProduct) -> f64 {
        let normalized_product = normalize(&product.name);

        if normalized_item == normalized_product {
            self.exact_score
        } else if are_synonyms(normalized_item, &normalized_product) {
            self.synonym_score
        } else {
            similarity(normalized_item, &normalized_product) * self.similarity_weight
        }
    }

    /// Highest-scoring product regardless of the acceptance threshold
    ///
    /// `None` for non-supplement types, names that normalize to nothing and
    /// an empty catalog.
    pub fn best_candidate<'a>(
        &self,
        item_name: &str,
        item_type: &str,
        catalog: &'a [CatalogProduct],
    ) -> Option<ProductMatch<'a>> {
        if !item_type.trim().eq_ignore_ascii_case(ItemType::Supplement.as_str()) {
            return None;
        }

        let normalized_item = normalize(item_name);
        if normalized_item.is_empty() {
            return None;
        }
        let mut best: Option<ProductMatch<'a>> = None;

        for product in catalog {
            let score = self.score_normalized(&normalized_item, product);
            // Strict comparison keeps the first maximum
            if best.map_or(true, |b| score > b.score) {
                best = Some(ProductMatch { product, score });
            }
        }

        best
    }

    /// Best accepted product for an item, or `None`
    pub fn match_product<'a>(
        &self,
        item_name: &str,
        item_type: &str,
        catalog: &'a [CatalogProduct],
    ) -> Option<&'a CatalogProduct> {
        let best = self.best_candidate(item_name, item_type, catalog)?;

        if self.accepts(best.score) {
            tracing::debug!(
                item = %item_name,
                product_id = %best.product.id,
                score = best.score,
                "Matched catalog product"
            );
            Some(best.product)
        } else {
            tracing::debug!(
                item = %item_name,
                best_product = %best.product.id,
                score = best.score,
                threshold = self.acceptance_score,
                "Best product below acceptance threshold"
            );
            None
        }
    }

    /// Match every item against one already-fetched catalog
    pub fn match_items(&self, items: &[ProtocolItem], catalog: &[CatalogProduct]) -> Vec<MatchResult> {
        let results: Vec<MatchResult> = items
            .iter()
            .map(|item| {
                let best = self.best_candidate(&item.name, item.item_type.as_str(), catalog);
                let score = best.map_or(0.0, |b| b.score);
                let product = best
                    .filter(|b| self.accepts(b.score))
                    .map(|b| b.product.clone());

                MatchResult {
                    item: item.clone(),
                    product,
                    score,
                }
            })
            .collect();

        tracing::debug!(
            items = items.len(),
            catalog = catalog.len(),
            matched = results.iter().filter(|r| r.is_matched()).count(),
            "Batch matching complete"
        );

        results
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}
