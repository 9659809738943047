//! Protocol tiering: declarative domain rules plus recommended candidates

pub mod generator;
pub mod rules;

pub use generator::{Protocol, TierGenerator};
pub use rules::{ItemTemplate, TierRule, Trigger, TIER_RULES, TIER_RULES_VERSION};
