//! Agreement scoring between token sets and repeated generations.

use std::collections::{BTreeSet, HashMap};

use crate::signals::token_set;

/// Weight of the exact-match term in [`agreement`]; the pairwise term gets the rest.
pub const EXACT_MATCH_WEIGHT: f64 = 0.5;

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`.
///
/// Two empty sets score `0.0`. The ratio is undefined there and the tie
/// is broken towards "no evidence of agreement".
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// The most frequent string and its count. Ties go to the first seen.
pub fn most_common<S: AsRef<str>>(items: &[S]) -> Option<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.as_ref()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for item in items {
        let item = item.as_ref();
        let count = counts[item];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((item, count));
        }
    }
    best.map(|(s, c)| (s.to_string(), c))
}

/// Agreement across already-normalized responses, in `[0, 1]`.
///
/// Half exact-match agreement (share of the most frequent string), half
/// mean pairwise Jaccard over whitespace token sets. With fewer than two
/// responses the pairwise term is `1.0`. An empty slice scores `0.0`.
pub fn agreement<S: AsRef<str>>(responses: &[S]) -> f64 {
    let Some((_, top)) = most_common(responses) else {
        return 0.0;
    };
    let n = responses.len();
    let exact = top as f64 / n as f64;

    let pairwise = if n < 2 {
        1.0
    } else {
        let sets: Vec<BTreeSet<String>> = responses.iter().map(|r| token_set(r.as_ref())).collect();
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                total += jaccard(&sets[i], &sets[j]);
                pairs += 1;
            }
        }
        total / pairs as f64
    };

    EXACT_MATCH_WEIGHT * exact + (1.0 - EXACT_MATCH_WEIGHT) * pairwise
}
