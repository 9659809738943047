//! Domain models shared by the engine, the stores and the CLI
//!
//! Catalog data (`CandidateItem`, `CatalogProduct`) is immutable input.
//! `UserContext` and `AssessmentSignals` are read-only snapshots supplied by
//! the assessment subsystem. `ProtocolItem` is the only record that becomes
//! user-owned once it is persisted.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::Error;

// ============================================================================
// Enumerations
// ============================================================================

/// Contraindication severity
///
/// Unknown strings parse as `Low`, the remaining severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Severity::from(value.as_str())
    }
}

/// Kind of intervention
///
/// Only `Supplement` items are expected to exist in the priced catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum ItemType {
    Supplement,
    Lifestyle,
    Nutrition,
    Exercise,
    Therapy,
    #[default]
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Supplement => "supplement",
            ItemType::Lifestyle => "lifestyle",
            ItemType::Nutrition => "nutrition",
            ItemType::Exercise => "exercise",
            ItemType::Therapy => "therapy",
            ItemType::Other => "other",
        }
    }
}

impl From<&str> for ItemType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "supplement" => ItemType::Supplement,
            "lifestyle" => ItemType::Lifestyle,
            "nutrition" => ItemType::Nutrition,
            "exercise" => ItemType::Exercise,
            "therapy" => ItemType::Therapy,
            _ => ItemType::Other,
        }
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        ItemType::from(value.as_str())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency tier of a protocol item, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolCategory {
    Immediate,
    Foundation,
    Optimization,
}

impl ProtocolCategory {
    pub const ALL: [ProtocolCategory; 3] = [
        ProtocolCategory::Immediate,
        ProtocolCategory::Foundation,
        ProtocolCategory::Optimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolCategory::Immediate => "immediate",
            ProtocolCategory::Foundation => "foundation",
            ProtocolCategory::Optimization => "optimization",
        }
    }
}

impl FromStr for ProtocolCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(ProtocolCategory::Immediate),
            "foundation" => Ok(ProtocolCategory::Foundation),
            "optimization" => Ok(ProtocolCategory::Optimization),
            other => Err(Error::InvalidInput(format!(
                "Unknown protocol category: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProtocolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Midday,
    Afternoon,
    Evening,
    Bedtime,
    Anytime,
}

// ============================================================================
// Lenient catalog decoding
// ============================================================================
//
// One malformed catalog row must not reject the rows around it. Rows that
// cannot be decoded are dropped with a warning; malformed symptom lists and
// severities decode to their empty or lowest value and score accordingly.

fn lenient_rows<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let rows = match Value::deserialize(deserializer)? {
        Value::Array(rows) => rows,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(value = %other, "Expected a list of {}, using none", short_type_name::<T>());
            return Ok(Vec::new());
        }
    };

    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed {}", short_type_name::<T>());
                None
            }
        })
        .collect())
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn lenient_symptoms<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(values) => Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(symptom) => Some(symptom),
                _ => None,
            })
            .collect()),
        Value::Null => Ok(BTreeSet::new()),
        other => {
            warn!(value = %other, "Malformed target_symptoms, treating as empty");
            Ok(BTreeSet::new())
        }
    }
}

fn lenient_severity<'de, D>(deserializer: D) -> std::result::Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(severity) => Severity::from(severity),
        _ => Severity::Low,
    })
}

/// Currency codes are stored uppercased; an already-uppercase key wins a clash
fn currency_prices<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Decimal>::deserialize(deserializer)?;
    let mut prices = BTreeMap::new();
    for (code, amount) in raw {
        let normalized = code.trim().to_uppercase();
        if code == normalized {
            prices.insert(normalized, amount);
        } else {
            prices.entry(normalized).or_insert(amount);
        }
    }
    Ok(prices)
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contraindication {
    pub condition: String,
    #[serde(default, deserialize_with = "lenient_severity")]
    pub severity: Severity,
}

impl Contraindication {
    pub fn new(condition: impl Into<String>, severity: Severity) -> Self {
        Self {
            condition: condition.into(),
            severity,
        }
    }
}

/// A catalog intervention eligible for recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub time_of_day: Vec<TimeOfDay>,
    #[serde(default, deserialize_with = "lenient_symptoms")]
    pub target_symptoms: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub contraindications: Vec<Contraindication>,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: ItemType::Other,
            description: String::new(),
            frequency: None,
            time_of_day: Vec::new(),
            target_symptoms: BTreeSet::new(),
            contraindications: Vec::new(),
        }
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_symptoms
            .extend(symptoms.into_iter().map(Into::into));
        self
    }

    pub fn with_contraindication(mut self, condition: impl Into<String>, severity: Severity) -> Self {
        self.contraindications
            .push(Contraindication::new(condition, severity));
        self
    }
}

/// A purchasable catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    /// Price per uppercase currency code
    #[serde(default, deserialize_with = "currency_prices")]
    pub prices: BTreeMap<String, Decimal>,
}

impl CatalogProduct {
    pub fn new(id: impl Into<String>, name: impl Into<String>, brand: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            brand: brand.into(),
            prices: BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, currency: &str, amount: Decimal) -> Self {
        self.prices.insert(currency.trim().to_uppercase(), amount);
        self
    }

    /// Price in the given currency code (case-insensitive)
    pub fn price_in(&self, currency: &str) -> Option<Decimal> {
        self.prices
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(currency))
            .map(|(_, amount)| *amount)
    }
}

/// Catalog import file: candidates plus priced products
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub candidates: Vec<CandidateItem>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub products: Vec<CatalogProduct>,
}

// ============================================================================
// User state
// ============================================================================

/// Snapshot of one user's current signals
///
/// Rebuilt by the assessment subsystem whenever answers change; the engine
/// never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub active_symptoms: BTreeSet<String>,
    #[serde(default)]
    pub health_flags: BTreeMap<String, bool>,
}

impl UserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_symptoms
            .extend(symptoms.into_iter().map(Into::into));
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.health_flags.insert(flag.into(), value);
        self
    }

    /// True only when the flag is present and set
    pub fn flag(&self, name: &str) -> bool {
        self.health_flags.get(name).copied().unwrap_or(false)
    }
}

/// A tier-assigned, user-facing action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ProtocolCategory,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default)]
    pub time_of_day: Vec<TimeOfDay>,
    /// Stored catalog product reference, once linked
    #[serde(default)]
    pub product_id: Option<String>,
    /// Candidate this item was generated from, if any
    #[serde(default)]
    pub candidate_id: Option<String>,
}

fn default_frequency() -> String {
    "daily".to_string()
}

impl ProtocolItem {
    pub fn new(name: impl Into<String>, item_type: ItemType, category: ProtocolCategory) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category,
            item_type,
            frequency: default_frequency(),
            time_of_day: Vec::new(),
            product_id: None,
            candidate_id: None,
        }
    }

    pub fn is_supplement(&self) -> bool {
        self.item_type == ItemType::Supplement
    }
}

// ============================================================================
// Assessment signals
// ============================================================================

/// Assessment domain a severity indicator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Sleep,
    Stress,
    Nutrition,
    Fitness,
    Hormonal,
    Digestion,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Sleep => "sleep",
            Domain::Stress => "stress",
            Domain::Nutrition => "nutrition",
            Domain::Fitness => "fitness",
            Domain::Hormonal => "hormonal",
            Domain::Digestion => "digestion",
        }
    }
}

/// Severity indicators for one domain
///
/// `score` is a 0-10 severity (higher is worse); `flags` are categorical
/// indicators such as `frequent_cravings` or `low_fiber_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSignal {
    pub domain: Domain,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl DomainSignal {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            score: None,
            flags: BTreeSet::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }
}

/// All domain indicators derived from one user's assessments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSignals {
    #[serde(default)]
    pub domains: Vec<DomainSignal>,
}

impl AssessmentSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, signal: DomainSignal) -> Self {
        self.domains.push(signal);
        self
    }

    /// First signal reported for a domain
    pub fn get(&self, domain: Domain) -> Option<&DomainSignal> {
        self.domains.iter().find(|s| s.domain == domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_severity_is_low() {
        assert_eq!(Severity::from("HIGH"), Severity::High);
        assert_eq!(Severity::from(" medium "), Severity::Medium);
        assert_eq!(Severity::from("bronze"), Severity::Low);
        assert_eq!(Severity::from(""), Severity::Low);
    }

    #[test]
    fn test_candidate_deserializes_with_defaults() {
        let json = r#"{
            "id": "c1",
            "name": "Cold Exposure Therapy",
            "contraindications": [{"condition": "Pregnancy", "severity": "severe-ish"}]
        }"#;
        let candidate: CandidateItem = serde_json::from_str(json).unwrap();

        assert!(candidate.target_symptoms.is_empty());
        assert_eq!(candidate.item_type, ItemType::Other);
        assert_eq!(candidate.contraindications[0].severity, Severity::Low);
    }

    #[test]
    fn test_malformed_rows_do_not_reject_the_catalog() {
        let json = r#"{
            "candidates": [
                {"id": "c-null", "name": "Null Symptoms", "target_symptoms": null},
                {"id": "c-str", "name": "String Symptoms", "target_symptoms": "anxiety"},
                {"id": "c-nosev", "name": "No Severity", "contraindications": [{"condition": "Pregnancy"}]},
                {"id": "c-intsev", "name": "Numeric Severity", "contraindications": [{"condition": "Pregnancy", "severity": 3}]},
                {"id": "c-badci", "name": "Bad Contraindication", "contraindications": [42, {"severity": "high"}]},
                {"name": "Missing Id"},
                {"id": "c-ash", "name": "Ashwagandha", "item_type": "supplement", "target_symptoms": ["anxiety"]}
            ],
            "products": [{"id": "p-bad", "name": "Broken", "prices": {"USD": "abc"}}, {"id": "p-ok", "name": "Fine"}]
        }"#;
        let catalog: CatalogFile = serde_json::from_str(json).unwrap();

        let ids: Vec<&str> = catalog.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-null", "c-str", "c-nosev", "c-intsev", "c-badci", "c-ash"]);
        assert!(catalog.candidates[0].target_symptoms.is_empty());
        assert!(catalog.candidates[1].target_symptoms.is_empty());
        assert_eq!(catalog.candidates[2].contraindications[0].severity, Severity::Low);
        assert_eq!(catalog.candidates[3].contraindications[0].severity, Severity::Low);
        assert!(catalog.candidates[4].contraindications.is_empty());
        assert!(catalog.candidates[5].target_symptoms.contains("anxiety"));

        assert_eq!(catalog.products.len(), 1);
        assert_eq!(catalog.products[0].id, "p-ok");
    }

    #[test]
    fn test_currency_keys_are_uppercased_on_decode() {
        let json = r#"{"id": "p1", "name": "Fish Oil", "prices": {"usd": "9.99", "USD": "19.99", "eur": "17.50"}}"#;
        let product: CatalogProduct = serde_json::from_str(json).unwrap();

        let codes: Vec<&str> = product.prices.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["EUR", "USD"]);
        assert_eq!(product.prices["USD"], Decimal::new(1999, 2));
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let c = Contraindication::new("Pregnancy", Severity::High);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"high\""));
    }

    #[test]
    fn test_price_lookup_ignores_currency_case() {
        let product = CatalogProduct::new("p1", "Fish Oil", "Acme")
            .with_price("usd", Decimal::new(1999, 2));

        assert!(product.prices.contains_key("USD"));
        assert_eq!(product.price_in("usd"), Some(Decimal::new(1999, 2)));
        assert_eq!(product.price_in("EUR"), None);
    }

    #[test]
    fn test_missing_flag_reads_false() {
        let ctx = UserContext::new().with_flag("is_pregnant", true);
        assert!(ctx.flag("is_pregnant"));
        assert!(!ctx.flag("has_heart_condition"));
    }

    #[test]
    fn test_protocol_category_round_trips_through_str() {
        for category in ProtocolCategory::ALL {
            assert_eq!(category.as_str().parse::<ProtocolCategory>().unwrap(), category);
        }
        assert!("urgent".parse::<ProtocolCategory>().is_err());
    }

    #[test]
    fn test_first_domain_signal_wins() {
        let signals = AssessmentSignals::new()
            .with_domain(DomainSignal::new(Domain::Sleep).with_score(8.0))
            .with_domain(DomainSignal::new(Domain::Sleep).with_score(2.0));

        assert_eq!(signals.get(Domain::Sleep).unwrap().score, Some(8.0));
        assert!(signals.get(Domain::Stress).is_none());
    }
}
