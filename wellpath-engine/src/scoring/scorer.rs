//! Suitability / Applicability Scorer
//!
//! Scores catalog candidates against one user's symptoms and health flags.
//!
//! **Suitability** (relevance): `round(100 * |matched| / |target_symptoms|)`,
//! where `matched = target_symptoms ∩ active_symptoms`. Zero when the
//! candidate lists no target symptoms.
//!
//! **Applicability** (safety): starts at 100. Every contraindication whose
//! condition maps to a true health flag is flagged; `high` vetoes to 0,
//! `medium` removes 50 and `low` removes 25, floored at 0.
//!
//! **Combined**: `suitability * applicability / 100`, used for ranking.
//!
//! Scoring never fails: malformed candidates simply score 0 and drop out of
//! the recommendation filter.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use wellpath_common::models::{CandidateItem, Contraindication, Severity, UserContext};
use wellpath_common::EngineThresholds;

use super::conditions::condition_applies;

/// A candidate with its scores for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateItem,
    /// 0-100
    pub suitability: u8,
    /// 0-100
    pub applicability: u8,
    /// `suitability * applicability / 100`
    pub combined: f64,
    pub matched_symptoms: BTreeSet<String>,
    /// Every contraindication that hit a true flag, even under a veto
    pub flagged_contraindications: Vec<Contraindication>,
    /// 1-based rank after sorting; 0 until ranked
    pub priority_rank: usize,
}

/// `suitability * applicability / 100`
pub fn combined_score(suitability: u8, applicability: u8) -> f64 {
    f64::from(suitability) * f64::from(applicability) / 100.0
}

/// Suitability / Applicability Scorer
#[derive(Debug, Clone)]
pub struct SuitabilityScorer {
    /// Suitability must exceed this to surface (default 20)
    min_suitability: u8,
    /// Per-hit deduction for medium severity (default 50)
    medium_deduction: u8,
    /// Per-hit deduction for low severity (default 25)
    low_deduction: u8,
}

impl SuitabilityScorer {
    pub fn new() -> Self {
        Self::from_thresholds(&EngineThresholds::default())
    }

    pub fn from_thresholds(thresholds: &EngineThresholds) -> Self {
        Self {
            min_suitability: thresholds.min_suitability,
            medium_deduction: thresholds.medium_deduction,
            low_deduction: thresholds.low_deduction,
        }
    }

    /// Symptom-overlap relevance and the symptoms that overlapped
    pub fn suitability(&self, candidate: &CandidateItem, user: &UserContext) -> (u8, BTreeSet<String>) {
        let targets: BTreeSet<&str> = candidate
            .target_symptoms
            .iter()
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect();

        if targets.is_empty() {
            return (0, BTreeSet::new());
        }

        let matched: BTreeSet<String> = targets
            .iter()
            .filter(|s| user.active_symptoms.contains(**s))
            .map(|s| s.to_string())
            .collect();

        let ratio = matched.len() as f64 / targets.len() as f64;
        let suitability = (100.0 * ratio).round().clamp(0.0, 100.0) as u8;

        (suitability, matched)
    }

    /// Safety score and the contraindications that applied
    pub fn applicability(
        &self,
        candidate: &CandidateItem,
        user: &UserContext,
    ) -> (u8, Vec<Contraindication>) {
        let mut remaining: i32 = 100;
        let mut vetoed = false;
        let mut flagged = Vec::new();

        for contraindication in &candidate.contraindications {
            if !condition_applies(&contraindication.condition, user) {
                continue;
            }

            match contraindication.severity {
                Severity::High => vetoed = true,
                Severity::Medium => remaining -= i32::from(self.medium_deduction),
                Severity::Low => remaining -= i32::from(self.low_deduction),
            }
            flagged.push(contraindication.clone());
        }

        let applicability = if vetoed { 0 } else { remaining.clamp(0, 100) as u8 };

        (applicability, flagged)
    }

    /// Score one candidate (unranked)
    pub fn score(&self, candidate: &CandidateItem, user: &UserContext) -> ScoredCandidate {
        let (suitability, matched_symptoms) = self.suitability(candidate, user);
        let (applicability, flagged_contraindications) = self.applicability(candidate, user);

        tracing::debug!(
            candidate = %candidate.id,
            suitability,
            applicability,
            flagged = flagged_contraindications.len(),
            "Scored candidate"
        );

        ScoredCandidate {
            candidate: candidate.clone(),
            suitability,
            applicability,
            combined: combined_score(suitability, applicability),
            matched_symptoms,
            flagged_contraindications,
            priority_rank: 0,
        }
    }

    /// `suitability > min_suitability AND applicability > 0`
    pub fn is_recommendable(&self, scored: &ScoredCandidate) -> bool {
        scored.suitability > self.min_suitability && scored.applicability > 0
    }

    /// Score, filter and rank a whole catalog for one user
    ///
    /// **Algorithm:**
    /// 1. Score every candidate
    /// 2. Keep those passing `is_recommendable`
    /// 3. Stable sort by `combined` descending (ties keep catalog order)
    /// 4. Assign `priority_rank` 1..N
    ///
    /// Deterministic for a fixed `(catalog, user)` pair.
    pub fn generate_recommendations(
        &self,
        catalog: &[CandidateItem],
        user: &UserContext,
    ) -> Vec<ScoredCandidate> {
        let mut accepted: Vec<ScoredCandidate> = catalog
            .iter()
            .map(|candidate| self.score(candidate, user))
            .filter(|scored| self.is_recommendable(scored))
            .collect();

        accepted.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(Ordering::Equal));

        for (index, scored) in accepted.iter_mut().enumerate() {
            scored.priority_rank = index + 1;
        }

        tracing::info!(
            catalog = catalog.len(),
            recommended = accepted.len(),
            "Generated recommendations"
        );

        accepted
    }
}

impl Default for SuitabilityScorer {
    fn default() -> Self {
        Self::new()
    }
}
