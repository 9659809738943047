//! Candidate scoring: relevance against symptoms, safety against health flags

pub mod conditions;
pub mod scorer;

pub use conditions::{condition_applies, flags_for_condition, HealthFlag, CONDITION_TABLE_VERSION};
pub use scorer::{combined_score, ScoredCandidate, SuitabilityScorer};
