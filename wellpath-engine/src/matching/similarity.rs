//! Similarity Scorer
//!
//! Priority cascade over two already-normalized names:
//! 1. Exact equality → 1.0
//! 2. Substring containment (either direction) → len(shorter) / len(longer)
//! 3. Token overlap → |A ∩ B| / max(|A|, |B|)
//!
//! Lengths are counted in characters, not bytes.

use std::collections::HashSet;

/// Likeness of two normalized names in `[0, 1]`
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if longer.contains(shorter) {
        return shorter.chars().count() as f64 / longer.chars().count() as f64;
    }

    token_overlap(a, b)
}

/// Shared-token ratio over the larger token set
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();

    let denominator = tokens_a.len().max(tokens_b.len());
    if denominator == 0 {
        return 0.0;
    }

    tokens_a.intersection(&tokens_b).count() as f64 / denominator as f64
}
