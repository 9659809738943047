//! Name Normalizer
//!
//! Canonicalizes free-text intervention and product names so that
//! `"Omega-3 (Fish Oil)"` and `"omega 3 fish oil"` compare equal.
//!
//! **Algorithm:**
//! 1. Lowercase
//! 2. Replace brackets, hyphen variants and list separators with a space
//! 3. Collapse whitespace runs (this also trims)
//! 4. Drop trailing form-factor words while more than one word remains
//!
//! Step 4 repeats so that the function is idempotent:
//! `"zinc powder supplement"` → `"zinc"`, never `"zinc powder"`.

/// Trailing words that describe packaging rather than substance
pub const FORM_FACTOR_SUFFIXES: &[&str] = &[
    "supplement",
    "supplements",
    "capsule",
    "capsules",
    "tablet",
    "tablets",
    "powder",
    "extract",
    "complex",
    "form",
];

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '(' | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '/'
            | ','
            | '+'
            | '-'
            | '\u{2010}' // hyphen
            | '\u{2011}' // non-breaking hyphen
            | '\u{2012}' // figure dash
            | '\u{2013}' // en dash
            | '\u{2014}' // em dash
            | '\u{2015}' // horizontal bar
            | '\u{2212}' // minus sign
    )
}

/// Normalize a name for comparison. Total: never fails, `""` maps to `""`.
pub fn normalize(raw: &str) -> String {
    let replaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();

    let mut words: Vec<&str> = replaced.split_whitespace().collect();

    while words.len() > 1 {
        match words.last() {
            Some(last) if FORM_FACTOR_SUFFIXES.contains(last) => {
                words.pop();
            }
            _ => break,
        }
    }

    words.join(" ")
}
