//! Tier Generator
//!
//! Turns assessment signals and accepted recommendations into a phased
//! `Protocol`.
//!
//! **Algorithm:**
//! 1. Evaluate `TIER_RULES` in table order against the domain signals
//! 2. Append accepted `ScoredCandidate`s in rank order, tiered by `combined`
//!    (`>= 70` immediate, `>= 40` foundation, otherwise optimization)
//! 3. Drop any item whose dedup key was already emitted in this run
//!
//! Within a tier, output is insertion order. No item appears in two tiers.

use serde::Serialize;
use std::collections::HashSet;
use wellpath_common::models::{AssessmentSignals, ProtocolCategory, ProtocolItem};
use wellpath_common::EngineThresholds;

use super::rules::TIER_RULES;
use crate::dedup::item_key;
use crate::scoring::ScoredCandidate;

/// Protocol items grouped by urgency tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Protocol {
    pub immediate: Vec<ProtocolItem>,
    pub foundation: Vec<ProtocolItem>,
    pub optimization: Vec<ProtocolItem>,
}

impl Protocol {
    pub fn tier(&self, category: ProtocolCategory) -> &[ProtocolItem] {
        match category {
            ProtocolCategory::Immediate => &self.immediate,
            ProtocolCategory::Foundation => &self.foundation,
            ProtocolCategory::Optimization => &self.optimization,
        }
    }

    fn tier_mut(&mut self, category: ProtocolCategory) -> &mut Vec<ProtocolItem> {
        match category {
            ProtocolCategory::Immediate => &mut self.immediate,
            ProtocolCategory::Foundation => &mut self.foundation,
            ProtocolCategory::Optimization => &mut self.optimization,
        }
    }

    /// All items, most urgent tier first
    pub fn items(&self) -> impl Iterator<Item = &ProtocolItem> {
        self.immediate
            .iter()
            .chain(self.foundation.iter())
            .chain(self.optimization.iter())
    }

    pub fn into_items(self) -> Vec<ProtocolItem> {
        let mut items = self.immediate;
        items.extend(self.foundation);
        items.extend(self.optimization);
        items
    }

    pub fn len(&self) -> usize {
        self.immediate.len() + self.foundation.len() + self.optimization.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tier Generator
#[derive(Debug, Clone)]
pub struct TierGenerator {
    /// Candidates at or above this combined score are immediate (default 70)
    immediate_min_combined: f64,
    /// Candidates at or above this combined score are foundation (default 40)
    foundation_min_combined: f64,
}

impl TierGenerator {
    pub fn new() -> Self {
        Self::from_thresholds(&EngineThresholds::default())
    }

    pub fn from_thresholds(thresholds: &EngineThresholds) -> Self {
        Self {
            immediate_min_combined: thresholds.immediate_min_combined,
            foundation_min_combined: thresholds.foundation_min_combined,
        }
    }

    /// Tier for a recommended candidate
    pub fn category_for_combined(&self, combined: f64) -> ProtocolCategory {
        if combined >= self.immediate_min_combined {
            ProtocolCategory::Immediate
        } else if combined >= self.foundation_min_combined {
            ProtocolCategory::Foundation
        } else {
            ProtocolCategory::Optimization
        }
    }

    /// Protocol item for a recommended candidate
    pub fn candidate_item(&self, scored: &ScoredCandidate) -> ProtocolItem {
        let candidate = &scored.candidate;
        let mut item = ProtocolItem::new(
            candidate.name.clone(),
            candidate.item_type,
            self.category_for_combined(scored.combined),
        );
        item.description = candidate.description.clone();
        if let Some(frequency) = candidate.frequency.as_ref().filter(|f| !f.trim().is_empty()) {
            item.frequency = frequency.clone();
        }
        item.time_of_day = candidate.time_of_day.clone();
        item.candidate_id = Some(candidate.id.clone());
        item
    }

    /// Build the phased protocol for one generation run
    pub fn generate(&self, signals: &AssessmentSignals, recommendations: &[ScoredCandidate]) -> Protocol {
        let mut protocol = Protocol::default();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut push = |protocol: &mut Protocol, item: ProtocolItem, source: &str| {
            let key = item_key(&item);
            if emitted.insert(key) {
                tracing::debug!(
                    item = %item.name,
                    tier = %item.category,
                    source = %source,
                    "Tiered protocol item"
                );
                protocol.tier_mut(item.category).push(item);
            } else {
                tracing::debug!(item = %item.name, source = %source, "Item already tiered in this run");
            }
        };

        for rule in TIER_RULES {
            if let Some(item) = rule.evaluate(signals.get(rule.domain)) {
                push(&mut protocol, item, rule.id);
            }
        }

        for scored in recommendations {
            push(&mut protocol, self.candidate_item(scored), "recommendation");
        }

        tracing::info!(
            immediate = protocol.immediate.len(),
            foundation = protocol.foundation.len(),
            optimization = protocol.optimization.len(),
            "Generated protocol"
        );

        protocol
    }
}

impl Default for TierGenerator {
    fn default() -> Self {
        Self::new()
    }
}
