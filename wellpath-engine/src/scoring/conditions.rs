//! Condition → health flag lookup
//!
//! Contraindication text is free-form ("Pregnancy", "Known heart disease").
//! This closed table maps it to the boolean health flags supplied by the
//! assessment subsystem using case-insensitive substring patterns.
//!
//! The mapping is a heuristic and can over- or under-match real clinical
//! text. It is kept exactly as documented pending product-owner review;
//! changing it requires bumping `CONDITION_TABLE_VERSION`.

use wellpath_common::models::UserContext;

/// Version of `CONDITION_TABLE`
pub const CONDITION_TABLE_VERSION: u32 = 1;

/// Health flags the table can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthFlag {
    Pregnant,
    HeartCondition,
    AutoimmuneCondition,
}

impl HealthFlag {
    /// Key used in `UserContext::health_flags`
    pub fn key(&self) -> &'static str {
        match self {
            HealthFlag::Pregnant => "is_pregnant",
            HealthFlag::HeartCondition => "has_heart_condition",
            HealthFlag::AutoimmuneCondition => "has_autoimmune_condition",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionRule {
    pub flag: HealthFlag,
    /// Lowercase substrings that identify the condition
    pub patterns: &'static [&'static str],
}

pub static CONDITION_TABLE: &[ConditionRule] = &[
    ConditionRule {
        flag: HealthFlag::Pregnant,
        patterns: &["pregnan"],
    },
    ConditionRule {
        flag: HealthFlag::HeartCondition,
        patterns: &["heart", "cardiovascular", "cardiac"],
    },
    ConditionRule {
        flag: HealthFlag::AutoimmuneCondition,
        patterns: &["autoimmune"],
    },
];

/// Flags a contraindication condition maps to, in table order
pub fn flags_for_condition(condition: &str) -> Vec<HealthFlag> {
    let condition = condition.to_lowercase();
    CONDITION_TABLE
        .iter()
        .filter(|rule| rule.patterns.iter().any(|p| condition.contains(p)))
        .map(|rule| rule.flag)
        .collect()
}

/// True when the condition maps to at least one flag the user has set
pub fn condition_applies(condition: &str, user: &UserContext) -> bool {
    flags_for_condition(condition)
        .iter()
        .any(|flag| user.flag(flag.key()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_patterns() {
        assert_eq!(flags_for_condition("Pregnancy"), vec![HealthFlag::Pregnant]);
        assert_eq!(flags_for_condition("if pregnant"), vec![HealthFlag::Pregnant]);
        assert_eq!(flags_for_condition("Heart disease"), vec![HealthFlag::HeartCondition]);
        assert_eq!(
            flags_for_condition("Cardiovascular conditions"),
            vec![HealthFlag::HeartCondition]
        );
        assert_eq!(
            flags_for_condition("Autoimmune disorders"),
            vec![HealthFlag::AutoimmuneCondition]
        );
    }

    #[test]
    fn test_unmapped_condition_has_no_flags() {
        assert!(flags_for_condition("Kidney disease").is_empty());
        assert!(flags_for_condition("").is_empty());
    }

    #[test]
    fn test_condition_can_map_to_several_flags() {
        let flags = flags_for_condition("Heart conditions during pregnancy");
        assert_eq!(flags, vec![HealthFlag::Pregnant, HealthFlag::HeartCondition]);
    }

    #[test]
    fn test_applies_only_when_flag_true() {
        let user = UserContext::new()
            .with_flag("is_pregnant", false)
            .with_flag("has_heart_condition", true);

        assert!(!condition_applies("Pregnancy", &user));
        assert!(condition_applies("Cardiac arrhythmia", &user));
        assert!(!condition_applies("Autoimmune disease", &user));
    }
}
