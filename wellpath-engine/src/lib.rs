//! WellPath recommendation and matching engine
//!
//! Pure components:
//! - `matching`: name normalization, synonyms, similarity, product matching
//! - `scoring`: suitability/applicability scoring and ranking
//! - `tiers`: rule-driven protocol tiering
//! - `bundle`: volume-discount pricing
//! - `dedup`: collection identity and duplicate filtering
//!
//! I/O lives behind the `store` traits and is orchestrated by `service`.

pub mod bundle;
pub mod dedup;
pub mod matching;
pub mod scoring;
pub mod service;
pub mod store;
pub mod tiers;

pub use bundle::{Bundle, BundleCalculator};
pub use dedup::{dedup_key, DedupOutcome, DeduplicationGuard};
pub use matching::{FuzzyMatcher, MatchResult};
pub use scoring::{ScoredCandidate, SuitabilityScorer};
pub use service::{AddOutcome, ProtocolOutcome, RecommendationService};
pub use store::{CatalogStore, InMemoryStore, SqliteStore, UserCollectionStore};
pub use tiers::{Protocol, TierGenerator};
