//! Text signal extraction.
//!
//! Pure functions that turn raw model output into the coarse signals the
//! detectors compare: normalized token sets, numeric literals, year-like
//! tokens and capitalized spans (a cheap named-entity proxy).

use regex::Regex;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

/// Years recognised by [`extract_years`]: 1000-1999 and 2000-2029.
pub const YEAR_WINDOW: RangeInclusive<i32> = 1000..=2029;

/// Integer or decimal literal with an optional leading minus.
static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+\.?[0-9]*").expect("Invalid regex"));

/// Standalone 4-digit token.
static FOUR_DIGIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{4}\b").expect("Invalid regex"));

/// Run of capitalized words, e.g. "Marie Curie" or "Paris".
static CAPITALIZED_SPAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("Invalid regex")
});

/// Trim, lowercase and strip ASCII punctuation.
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

/// Normalize text into a set of tokens.
///
/// Order is irrelevant and duplicates collapse.
pub fn normalize(text: &str) -> BTreeSet<String> {
    token_set(&normalize_text(text))
}

/// Split on whitespace into a set without any further normalization.
pub fn token_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Extract numeric literals in order of appearance.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER_PATTERN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Extract year-like tokens inside [`YEAR_WINDOW`], in order of appearance.
pub fn extract_years(text: &str) -> Vec<i32> {
    extract_years_within(text, YEAR_WINDOW)
}

/// Extract 4-digit tokens that fall inside `window`.
pub fn extract_years_within(text: &str, window: RangeInclusive<i32>) -> Vec<i32> {
    FOUR_DIGIT_PATTERN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|year| window.contains(year))
        .collect()
}

/// Extract maximal runs of capitalized words.
pub fn extract_capitalized_spans(text: &str) -> Vec<String> {
    CAPITALIZED_SPAN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Compare two number lists as sets.
pub(crate) fn same_number_set(a: &[f64], b: &[f64]) -> bool {
    fn canonical(values: &[f64]) -> Vec<f64> {
        let mut v = values.to_vec();
        v.sort_by(f64::total_cmp);
        v.dedup();
        v
    }
    canonical(a) == canonical(b)
}
