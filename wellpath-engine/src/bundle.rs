//! Bundle Price Calculator
//!
//! Prices a user's active collection with a volume discount.
//!
//! **Algorithm:**
//! 1. Resolve each item to a product: a stored `product_id` found in the
//!    catalog wins; otherwise supplements go through the fuzzy matcher
//! 2. Drop items with no product or no price in the reference currency
//!    (they are listed in `excluded` and never priced at zero)
//! 3. `base_price = Σ price`, discount by step function on the priced count
//! 4. `discount_amount = base * pct / 100`, `final_price = base - discount`
//!
//! All money is `rust_decimal::Decimal`; no float ever touches a price.

use rust_decimal::Decimal;
use serde::Serialize;
use wellpath_common::config::DiscountTier;
use wellpath_common::models::{CatalogProduct, ProtocolItem};
use wellpath_common::EngineThresholds;

use crate::matching::FuzzyMatcher;

/// Match score reported for a line priced through its stored reference
pub const STORED_REFERENCE_SCORE: f64 = 100.0;

/// How a bundle line found its product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSource {
    Stored,
    Matched,
}

/// One priced item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleLine {
    pub item: ProtocolItem,
    pub product: CatalogProduct,
    pub price: Decimal,
    pub source: ProductSource,
    /// Match score behind the line
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    pub items: Vec<BundleLine>,
    pub total_items: usize,
    pub base_price: Decimal,
    pub discount_percentage: u32,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    pub eligible_for_discount: bool,
    pub currency: String,
    /// Active items that could not be priced
    pub excluded: Vec<ProtocolItem>,
}

/// Bundle Price Calculator
#[derive(Debug, Clone)]
pub struct BundleCalculator {
    matcher: FuzzyMatcher,
    discount_tiers: Vec<DiscountTier>,
    currency: String,
}

impl BundleCalculator {
    pub fn new() -> Self {
        Self::from_thresholds(&EngineThresholds::default())
    }

    pub fn from_thresholds(thresholds: &EngineThresholds) -> Self {
        Self {
            matcher: FuzzyMatcher::from_thresholds(thresholds),
            discount_tiers: thresholds.discount_tiers.clone(),
            currency: thresholds.reference_currency.clone(),
        }
    }

    /// Percentage for a priced item count (last qualifying step wins)
    pub fn discount_percentage(&self, total_items: usize) -> u32 {
        self.discount_tiers
            .iter()
            .filter(|tier| total_items >= tier.min_items)
            .map(|tier| tier.percentage)
            .last()
            .unwrap_or(0)
    }

    fn resolve<'a>(
        &self,
        item: &ProtocolItem,
        catalog: &'a [CatalogProduct],
    ) -> Option<(&'a CatalogProduct, ProductSource, f64)> {
        if let Some(product_id) = item.product_id.as_deref() {
            if let Some(product) = catalog.iter().find(|p| p.id == product_id) {
                return Some((product, ProductSource::Stored, STORED_REFERENCE_SCORE));
            }
            tracing::warn!(
                item = %item.name,
                product_id = %product_id,
                "Stored product reference not in catalog, falling back to matching"
            );
        }

        self.matcher
            .best_candidate(&item.name, item.item_type.as_str(), catalog)
            .filter(|best| self.matcher.accepts(best.score))
            .map(|best| (best.product, ProductSource::Matched, best.score))
    }

    /// Price a set of active items against one catalog snapshot
    pub fn calculate(&self, active_items: &[ProtocolItem], catalog: &[CatalogProduct]) -> Bundle {
        let mut lines = Vec::new();
        let mut excluded = Vec::new();

        for item in active_items {
            let priced = self.resolve(item, catalog).and_then(|(product, source, score)| {
                product
                    .price_in(&self.currency)
                    .map(|price| (product, source, score, price))
            });

            match priced {
                Some((product, source, score, price)) => lines.push(BundleLine {
                    item: item.clone(),
                    product: product.clone(),
                    price,
                    source,
                    score,
                }),
                None => {
                    tracing::debug!(item = %item.name, currency = %self.currency, "Item has no priced product");
                    excluded.push(item.clone());
                }
            }
        }

        let total_items = lines.len();
        let base_price: Decimal = lines.iter().map(|line| line.price).sum();
        let discount_percentage = self.discount_percentage(total_items);
        let discount_amount = base_price * Decimal::from(discount_percentage) / Decimal::ONE_HUNDRED;
        let final_price = base_price - discount_amount;

        tracing::info!(
            total_items,
            excluded = excluded.len(),
            base_price = %base_price,
            discount_percentage,
            final_price = %final_price,
            "Calculated bundle"
        );

        Bundle {
            items: lines,
            total_items,
            base_price,
            discount_percentage,
            discount_amount,
            final_price,
            eligible_for_discount: discount_percentage > 0,
            currency: self.currency.clone(),
            excluded,
        }
    }
}

impl Default for BundleCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use wellpath_common::models::{ItemType, ProtocolCategory};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn priced_catalog(count: usize, price: &str) -> Vec<CatalogProduct> {
        (0..count)
            .map(|i| {
                CatalogProduct::new(format!("p{}", i), format!("Product {}", i), "Acme")
                    .with_price("USD", dec(price))
            })
            .collect()
    }

    fn linked_items(count: usize) -> Vec<ProtocolItem> {
        (0..count)
            .map(|i| {
                let mut item = ProtocolItem::new(
                    format!("Item {}", i),
                    ItemType::Lifestyle,
                    ProtocolCategory::Foundation,
                );
                item.product_id = Some(format!("p{}", i));
                item
            })
            .collect()
    }

    #[test]
    fn test_zero_items_is_all_zero() {
        let bundle = BundleCalculator::new().calculate(&[], &[]);

        assert_eq!(bundle.total_items, 0);
        assert_eq!(bundle.base_price, Decimal::ZERO);
        assert_eq!(bundle.discount_percentage, 0);
        assert_eq!(bundle.discount_amount, Decimal::ZERO);
        assert_eq!(bundle.final_price, Decimal::ZERO);
        assert!(!bundle.eligible_for_discount);
        assert_eq!(bundle.currency, "USD");
    }

    #[test]
    fn test_discount_boundaries() {
        let calculator = BundleCalculator::new();
        let cases = [(2, 0), (3, 10), (5, 10), (6, 15), (9, 15), (10, 20), (25, 20)];

        for (count, expected) in cases {
            let catalog = priced_catalog(count, "10.00");
            let bundle = calculator.calculate(&linked_items(count), &catalog);

            assert_eq!(bundle.total_items, count);
            assert_eq!(bundle.discount_percentage, expected, "{} items", count);
            assert_eq!(bundle.eligible_for_discount, expected > 0);
        }
    }

    #[test]
    fn test_decimal_arithmetic_is_exact() {
        let catalog = priced_catalog(3, "19.99");
        let bundle = BundleCalculator::new().calculate(&linked_items(3), &catalog);

        assert_eq!(bundle.base_price, dec("59.97"));
        assert_eq!(bundle.discount_amount, dec("5.997"));
        assert_eq!(bundle.final_price, dec("53.973"));
        assert_eq!(bundle.discount_amount + bundle.final_price, bundle.base_price);
    }

    #[test]
    fn test_unresolvable_items_do_not_count() {
        let catalog = priced_catalog(2, "10.00");
        let mut items = linked_items(2);
        items.push(ProtocolItem::new("Box Breathing", ItemType::Therapy, ProtocolCategory::Immediate));

        let bundle = BundleCalculator::new().calculate(&items, &catalog);

        assert_eq!(bundle.total_items, 2);
        assert_eq!(bundle.discount_percentage, 0);
        assert_eq!(bundle.excluded.len(), 1);
        assert_eq!(bundle.excluded[0].name, "Box Breathing");
    }

    #[test]
    fn test_unpriced_product_is_excluded_not_zero() {
        let catalog = vec![
            CatalogProduct::new("p0", "Product 0", "Acme").with_price("EUR", dec("9.00")),
        ];
        let bundle = BundleCalculator::new().calculate(&linked_items(1), &catalog);

        assert_eq!(bundle.total_items, 0);
        assert_eq!(bundle.base_price, Decimal::ZERO);
        assert_eq!(bundle.excluded.len(), 1);
    }

    #[test]
    fn test_supplement_without_reference_is_matched() {
        let catalog = vec![
            CatalogProduct::new("mg", "Magnesium Glycinate Capsules", "Acme").with_price("USD", dec("24.50")),
        ];
        let items = vec![ProtocolItem::new(
            "Magnesium Glycinate",
            ItemType::Supplement,
            ProtocolCategory::Foundation,
        )];

        let bundle = BundleCalculator::new().calculate(&items, &catalog);

        assert_eq!(bundle.total_items, 1);
        assert_eq!(bundle.items[0].source, ProductSource::Matched);
        assert_eq!(bundle.base_price, dec("24.50"));
    }

    #[test]
    fn test_matched_line_carries_its_score() {
        let catalog = vec![CatalogProduct::new("fish", "Wild Fish Oil", "Acme").with_price("USD", dec("34.00"))];
        let items = vec![ProtocolItem::new("Omega-3", ItemType::Supplement, ProtocolCategory::Foundation)];

        let bundle = BundleCalculator::new().calculate(&items, &catalog);

        assert_eq!(bundle.items[0].source, ProductSource::Matched);
        assert_eq!(bundle.items[0].score, 90.0);
    }

    #[test]
    fn test_stale_reference_falls_back_to_matching() {
        let catalog = vec![CatalogProduct::new("zinc-2", "Zinc", "Acme").with_price("USD", dec("8.00"))];
        let mut item = ProtocolItem::new("Zinc", ItemType::Supplement, ProtocolCategory::Foundation);
        item.product_id = Some("zinc-1".to_string());

        let bundle = BundleCalculator::new().calculate(&[item], &catalog);

        assert_eq!(bundle.total_items, 1);
        assert_eq!(bundle.items[0].product.id, "zinc-2");
        assert_eq!(bundle.items[0].source, ProductSource::Matched);
    }

    #[test]
    fn test_stored_reference_wins_over_matching() {
        let catalog = vec![
            CatalogProduct::new("exact", "Zinc", "Acme").with_price("USD", dec("8.00")),
            CatalogProduct::new("chosen", "Zinc Picolinate", "Other").with_price("USD", dec("12.00")),
        ];
        let mut item = ProtocolItem::new("Zinc", ItemType::Supplement, ProtocolCategory::Foundation);
        item.product_id = Some("chosen".to_string());

        let bundle = BundleCalculator::new().calculate(&[item], &catalog);

        assert_eq!(bundle.items[0].product.id, "chosen");
        assert_eq!(bundle.items[0].source, ProductSource::Stored);
        assert_eq!(bundle.items[0].score, STORED_REFERENCE_SCORE);
        assert_eq!(bundle.base_price, dec("12.00"));
    }

    #[test]
    fn test_configured_currency_and_tiers() {
        let thresholds = EngineThresholds {
            reference_currency: "EUR".to_string(),
            discount_tiers: vec![DiscountTier { min_items: 1, percentage: 50 }],
            ..Default::default()
        };
        let catalog = vec![CatalogProduct::new("p0", "Product 0", "Acme")
            .with_price("USD", dec("10.00"))
            .with_price("EUR", dec("9.00"))];

        let bundle = BundleCalculator::from_thresholds(&thresholds).calculate(&linked_items(1), &catalog);

        assert_eq!(bundle.currency, "EUR");
        assert_eq!(bundle.base_price, dec("9.00"));
        assert_eq!(bundle.final_price, dec("4.50"));
    }
}
