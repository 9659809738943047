//! Name matching stack: normalizer, synonym table, similarity, fuzzy matcher

pub mod fuzzy_matcher;
pub mod normalizer;
pub mod similarity;
pub mod synonyms;

pub use fuzzy_matcher::{FuzzyMatcher, MatchResult, ProductMatch};
pub use normalizer::normalize;
pub use similarity::similarity;
pub use synonyms::{are_synonyms, resolve as resolve_synonym};
