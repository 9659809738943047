//! Declarative tier rules
//!
//! Each rule ties one domain indicator to one protocol item with its tier
//! fixed in advance. Acute, daily-impact indicators land in `immediate`,
//! ongoing support needs in `foundation`, enhancements in `optimization`.
//!
//! Scores are 0-10 domain severities (higher is worse). Score triggers never
//! fire when the domain reported no score.
//!
//! Rules are evaluated in table order. Changing the table requires bumping
//! `TIER_RULES_VERSION`.

use wellpath_common::models::ItemType::{Exercise, Lifestyle, Nutrition, Supplement, Therapy};
use wellpath_common::models::ProtocolCategory::{Foundation, Immediate, Optimization};
use wellpath_common::models::TimeOfDay::{Afternoon, Anytime, Bedtime, Evening, Midday, Morning};
use wellpath_common::models::{Domain, DomainSignal, ItemType, ProtocolCategory, ProtocolItem, TimeOfDay};

/// Version of `TIER_RULES`
pub const TIER_RULES_VERSION: u32 = 1;

/// Condition on a domain signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// `score >= x`
    ScoreAtLeast(f64),
    /// `lo <= score < hi`
    ScoreBetween(f64, f64),
    /// `score < x`
    ScoreBelow(f64),
    /// Categorical indicator present
    Flag(&'static str),
}

impl Trigger {
    pub fn fires(&self, signal: &DomainSignal) -> bool {
        match *self {
            Trigger::ScoreAtLeast(x) => signal.score.is_some_and(|s| s >= x),
            Trigger::ScoreBetween(lo, hi) => signal.score.is_some_and(|s| lo <= s && s < hi),
            Trigger::ScoreBelow(x) => signal.score.is_some_and(|s| s < x),
            Trigger::Flag(name) => signal.flags.contains(name),
        }
    }
}

/// Static description of the item a rule emits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub item_type: ItemType,
    pub frequency: &'static str,
    pub time_of_day: &'static [TimeOfDay],
}

impl ItemTemplate {
    pub fn to_item(&self, category: ProtocolCategory) -> ProtocolItem {
        let mut item = ProtocolItem::new(self.name, self.item_type, category);
        item.description = self.description.to_string();
        item.frequency = self.frequency.to_string();
        item.time_of_day = self.time_of_day.to_vec();
        item
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierRule {
    pub id: &'static str,
    pub domain: Domain,
    pub trigger: Trigger,
    pub tier: ProtocolCategory,
    pub item: ItemTemplate,
}

impl TierRule {
    /// Emitted item, or `None` when the domain is absent or the trigger misses
    pub fn evaluate(&self, signal: Option<&DomainSignal>) -> Option<ProtocolItem> {
        let signal = signal?;
        self.trigger
            .fires(signal)
            .then(|| self.item.to_item(self.tier))
    }
}

pub static TIER_RULES: &[TierRule] = &[
    // Sleep
    TierRule {
        id: "sleep.severe",
        domain: Domain::Sleep,
        trigger: Trigger::ScoreAtLeast(7.0),
        tier: Immediate,
        item: ItemTemplate {
            name: "Consistent Sleep Window",
            description: "Go to bed and wake within the same 30-minute window every day",
            item_type: Lifestyle,
            frequency: "daily",
            time_of_day: &[Bedtime, Morning],
        },
    },
    TierRule {
        id: "sleep.moderate",
        domain: Domain::Sleep,
        trigger: Trigger::ScoreBetween(4.0, 7.0),
        tier: Foundation,
        item: ItemTemplate {
            name: "Evening Wind-Down Routine",
            description: "Screens off and lights dimmed 60 minutes before bed",
            item_type: Lifestyle,
            frequency: "daily",
            time_of_day: &[Evening],
        },
    },
    TierRule {
        id: "sleep.onset",
        domain: Domain::Sleep,
        trigger: Trigger::Flag("poor_sleep_onset"),
        tier: Foundation,
        item: ItemTemplate {
            name: "Magnesium Glycinate",
            description: "200-400 mg taken before bed to support sleep onset",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Bedtime],
        },
    },
    TierRule {
        id: "sleep.mild",
        domain: Domain::Sleep,
        trigger: Trigger::ScoreBelow(4.0),
        tier: Optimization,
        item: ItemTemplate {
            name: "Sleep Tracking Review",
            description: "Review a week of sleep data to fine-tune timing",
            item_type: Lifestyle,
            frequency: "weekly",
            time_of_day: &[Morning],
        },
    },
    // Stress
    TierRule {
        id: "stress.severe",
        domain: Domain::Stress,
        trigger: Trigger::ScoreAtLeast(7.0),
        tier: Immediate,
        item: ItemTemplate {
            name: "Box Breathing",
            description: "Five minutes of 4-4-4-4 breathing when stress peaks",
            item_type: Therapy,
            frequency: "twice daily",
            time_of_day: &[Morning, Afternoon],
        },
    },
    TierRule {
        id: "stress.moderate",
        domain: Domain::Stress,
        trigger: Trigger::ScoreBetween(4.0, 7.0),
        tier: Foundation,
        item: ItemTemplate {
            name: "Ashwagandha",
            description: "Adaptogen taken with breakfast for ongoing stress support",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    TierRule {
        id: "stress.mild",
        domain: Domain::Stress,
        trigger: Trigger::ScoreBelow(4.0),
        tier: Optimization,
        item: ItemTemplate {
            name: "L-Theanine",
            description: "Calm focus during demanding afternoons",
            item_type: Supplement,
            frequency: "as needed",
            time_of_day: &[Afternoon],
        },
    },
    // Nutrition
    TierRule {
        id: "nutrition.critical_gap",
        domain: Domain::Nutrition,
        trigger: Trigger::Flag("critical_nutrient_gap"),
        tier: Immediate,
        item: ItemTemplate {
            name: "Vitamin D3",
            description: "Daily vitamin D3 with a fat-containing meal",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    TierRule {
        id: "nutrition.cravings",
        domain: Domain::Nutrition,
        trigger: Trigger::Flag("frequent_cravings"),
        tier: Immediate,
        item: ItemTemplate {
            name: "Protein-Forward Breakfast",
            description: "At least 25 g of protein within an hour of waking",
            item_type: Nutrition,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    TierRule {
        id: "nutrition.low_fiber",
        domain: Domain::Nutrition,
        trigger: Trigger::Flag("low_fiber_score"),
        tier: Foundation,
        item: ItemTemplate {
            name: "Psyllium Husk Fiber",
            description: "One serving mixed in water, building up over two weeks",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Midday],
        },
    },
    TierRule {
        id: "nutrition.moderate_gap",
        domain: Domain::Nutrition,
        trigger: Trigger::Flag("moderate_nutrient_gap"),
        tier: Foundation,
        item: ItemTemplate {
            name: "Omega-3 Fish Oil",
            description: "EPA/DHA with the largest meal of the day",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Midday],
        },
    },
    TierRule {
        id: "nutrition.advanced",
        domain: Domain::Nutrition,
        trigger: Trigger::Flag("advanced_supplementation"),
        tier: Optimization,
        item: ItemTemplate {
            name: "Coenzyme Q10",
            description: "Mitochondrial support once core gaps are closed",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    // Fitness
    TierRule {
        id: "fitness.sedentary",
        domain: Domain::Fitness,
        trigger: Trigger::Flag("sedentary"),
        tier: Immediate,
        item: ItemTemplate {
            name: "Daily 20-Minute Walk",
            description: "Brisk walk, ideally after a meal",
            item_type: Exercise,
            frequency: "daily",
            time_of_day: &[Anytime],
        },
    },
    TierRule {
        id: "fitness.severe",
        domain: Domain::Fitness,
        trigger: Trigger::ScoreAtLeast(7.0),
        tier: Immediate,
        item: ItemTemplate {
            name: "Daily 20-Minute Walk",
            description: "Brisk walk, ideally after a meal",
            item_type: Exercise,
            frequency: "daily",
            time_of_day: &[Anytime],
        },
    },
    TierRule {
        id: "fitness.moderate",
        domain: Domain::Fitness,
        trigger: Trigger::ScoreBetween(3.0, 7.0),
        tier: Foundation,
        item: ItemTemplate {
            name: "Strength Training",
            description: "Full-body resistance session",
            item_type: Exercise,
            frequency: "3x weekly",
            time_of_day: &[Afternoon],
        },
    },
    TierRule {
        id: "fitness.plateau",
        domain: Domain::Fitness,
        trigger: Trigger::Flag("training_plateau"),
        tier: Optimization,
        item: ItemTemplate {
            name: "Training Periodization Block",
            description: "Four-week block cycling volume and intensity",
            item_type: Exercise,
            frequency: "weekly",
            time_of_day: &[Anytime],
        },
    },
    // Hormonal
    TierRule {
        id: "hormonal.hot_flashes",
        domain: Domain::Hormonal,
        trigger: Trigger::Flag("severe_hot_flashes"),
        tier: Immediate,
        item: ItemTemplate {
            name: "Cooling Bedroom Environment",
            description: "Bedroom at 18°C with breathable bedding",
            item_type: Lifestyle,
            frequency: "daily",
            time_of_day: &[Bedtime],
        },
    },
    TierRule {
        id: "hormonal.severe",
        domain: Domain::Hormonal,
        trigger: Trigger::ScoreAtLeast(7.0),
        tier: Immediate,
        item: ItemTemplate {
            name: "Cooling Bedroom Environment",
            description: "Bedroom at 18°C with breathable bedding",
            item_type: Lifestyle,
            frequency: "daily",
            time_of_day: &[Bedtime],
        },
    },
    TierRule {
        id: "hormonal.moderate",
        domain: Domain::Hormonal,
        trigger: Trigger::ScoreBetween(4.0, 7.0),
        tier: Foundation,
        item: ItemTemplate {
            name: "Black Cohosh",
            description: "Standardized extract for vasomotor symptoms",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    TierRule {
        id: "hormonal.mild",
        domain: Domain::Hormonal,
        trigger: Trigger::ScoreBelow(4.0),
        tier: Optimization,
        item: ItemTemplate {
            name: "Magnesium Glycinate",
            description: "200-400 mg taken before bed to support hormonal balance",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Bedtime],
        },
    },
    // Digestion
    TierRule {
        id: "digestion.severe",
        domain: Domain::Digestion,
        trigger: Trigger::ScoreAtLeast(7.0),
        tier: Immediate,
        item: ItemTemplate {
            name: "Elimination Diet Trial",
            description: "Remove common trigger foods for three weeks, then reintroduce",
            item_type: Nutrition,
            frequency: "daily",
            time_of_day: &[Anytime],
        },
    },
    TierRule {
        id: "digestion.bloating",
        domain: Domain::Digestion,
        trigger: Trigger::Flag("frequent_bloating"),
        tier: Foundation,
        item: ItemTemplate {
            name: "Probiotic",
            description: "Multi-strain probiotic on an empty stomach",
            item_type: Supplement,
            frequency: "daily",
            time_of_day: &[Morning],
        },
    },
    TierRule {
        id: "digestion.moderate",
        domain: Domain::Digestion,
        trigger: Trigger::ScoreBetween(4.0, 7.0),
        tier: Foundation,
        item: ItemTemplate {
            name: "Mindful Eating Practice",
            description: "Slow, screen-free meals with thorough chewing",
            item_type: Lifestyle,
            frequency: "daily",
            time_of_day: &[Midday, Evening],
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_score_triggers_respect_bounds() {
        let at_seven = DomainSignal::new(Domain::Sleep).with_score(7.0);
        let at_four = DomainSignal::new(Domain::Sleep).with_score(4.0);
        let below = DomainSignal::new(Domain::Sleep).with_score(3.99);

        assert!(Trigger::ScoreAtLeast(7.0).fires(&at_seven));
        assert!(!Trigger::ScoreBetween(4.0, 7.0).fires(&at_seven));
        assert!(Trigger::ScoreBetween(4.0, 7.0).fires(&at_four));
        assert!(!Trigger::ScoreBelow(4.0).fires(&at_four));
        assert!(Trigger::ScoreBelow(4.0).fires(&below));
    }

    #[test]
    fn test_score_trigger_needs_a_score() {
        let flags_only = DomainSignal::new(Domain::Stress).with_flag("anything");

        assert!(!Trigger::ScoreBelow(4.0).fires(&flags_only));
        assert!(!Trigger::ScoreAtLeast(0.0).fires(&flags_only));
        assert!(Trigger::Flag("anything").fires(&flags_only));
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let ids: HashSet<&str> = TIER_RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), TIER_RULES.len());
    }

    #[test]
    fn test_rule_ids_are_prefixed_by_domain() {
        for rule in TIER_RULES {
            assert!(
                rule.id.starts_with(rule.domain.as_str()),
                "{} is not under {}",
                rule.id,
                rule.domain.as_str()
            );
        }
    }

    #[test]
    fn test_template_builds_item_with_tier() {
        let rule = TIER_RULES
            .iter()
            .find(|r| r.id == "nutrition.cravings")
            .unwrap();
        let signal = DomainSignal::new(Domain::Nutrition).with_flag("frequent_cravings");

        let item = rule.evaluate(Some(&signal)).unwrap();

        assert_eq!(item.name, "Protein-Forward Breakfast");
        assert_eq!(item.category, ProtocolCategory::Immediate);
        assert_eq!(item.item_type, ItemType::Nutrition);
        assert_eq!(item.time_of_day, vec![TimeOfDay::Morning]);
        assert!(item.candidate_id.is_none());
    }

    #[test]
    fn test_missing_domain_never_fires() {
        assert!(TIER_RULES.iter().all(|r| r.evaluate(None).is_none()));
    }
}
