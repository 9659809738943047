//! Synonym Resolver
//!
//! A closed, versioned table of substances that are sold under several names.
//! Two names are synonyms when both contain a term of the same entry after
//! normalization (e.g. "Omega-3 Softgels" and "Wild Fish Oil"). Terms only
//! match on word boundaries, so "dha" does not match "ashwagandha".
//!
//! Extending the table is a behavior change: bump `SYNONYM_TABLE_VERSION`.

use super::normalizer::normalize;

/// Version of `SYNONYM_TABLE`
pub const SYNONYM_TABLE_VERSION: u32 = 1;

/// One substance and the alternate names it is sold under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynonymEntry {
    pub canonical: &'static str,
    pub alternates: &'static [&'static str],
}

impl SynonymEntry {
    /// Canonical key followed by the alternates
    pub fn terms(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.canonical).chain(self.alternates.iter().copied())
    }

    /// True if the already-normalized name contains any term of this entry
    fn matches_normalized(&self, normalized_name: &str) -> bool {
        if normalized_name.is_empty() {
            return false;
        }
        let padded_name = format!(" {} ", normalized_name);
        self.terms().any(|term| {
            let term = normalize(term);
            !term.is_empty() && padded_name.contains(&format!(" {} ", term))
        })
    }
}

pub static SYNONYM_TABLE: &[SynonymEntry] = &[
    SynonymEntry {
        canonical: "omega-3",
        alternates: &["fish oil", "krill oil", "epa", "dha", "algal oil"],
    },
    SynonymEntry {
        canonical: "vitamin d3",
        alternates: &["vitamin d", "cholecalciferol"],
    },
    SynonymEntry {
        canonical: "vitamin b12",
        alternates: &["cobalamin", "methylcobalamin", "cyanocobalamin"],
    },
    SynonymEntry {
        canonical: "vitamin b6",
        alternates: &["pyridoxine", "pyridoxal 5 phosphate"],
    },
    SynonymEntry {
        canonical: "magnesium glycinate",
        alternates: &["magnesium bisglycinate", "magnesium glycine chelate"],
    },
    SynonymEntry {
        canonical: "coenzyme q10",
        alternates: &["coq10", "ubiquinol", "ubiquinone"],
    },
    SynonymEntry {
        canonical: "ashwagandha",
        alternates: &["withania somnifera", "ksm 66"],
    },
    SynonymEntry {
        canonical: "l-theanine",
        alternates: &["theanine", "suntheanine"],
    },
    SynonymEntry {
        canonical: "turmeric",
        alternates: &["curcumin", "curcuma longa"],
    },
    SynonymEntry {
        canonical: "black cohosh",
        alternates: &["actaea racemosa", "cimicifuga"],
    },
    SynonymEntry {
        canonical: "probiotic",
        alternates: &["lactobacillus", "bifidobacterium"],
    },
    SynonymEntry {
        canonical: "psyllium",
        alternates: &["ispaghula", "plantago ovata"],
    },
    SynonymEntry {
        canonical: "evening primrose oil",
        alternates: &["oenothera biennis"],
    },
];

/// Canonical keys covered by the table
pub fn canonical_terms() -> impl Iterator<Item = &'static str> {
    SYNONYM_TABLE.iter().map(|entry| entry.canonical)
}

/// First table entry whose terms occur in `name`
pub fn resolve(name: &str) -> Option<&'static SynonymEntry> {
    let normalized = normalize(name);
    SYNONYM_TABLE
        .iter()
        .find(|entry| entry.matches_normalized(&normalized))
}

/// True iff a single entry matches both names
pub fn are_synonyms(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    SYNONYM_TABLE
        .iter()
        .any(|entry| entry.matches_normalized(&a) && entry.matches_normalized(&b))
}
