// 📐 Similarity Scorer - Bigram overlap between business names
// Sørensen–Dice coefficient over bigram sets of the normalized strings

use crate::normalize::normalize;
use std::collections::HashSet;

/// Set of contiguous 2-character substrings of a normalized string.
/// A set, not a multiset: repeated bigrams count once.
fn bigrams(normalized: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = normalized.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Name similarity in [0, 1].
///
/// Both strings are normalized, then scored as
/// `2 * |A ∩ B| / (|A| + |B|)` over their bigram sets.
///
/// Edge cases: both bigram sets empty (inputs shorter than 2 characters
/// after normalization) → 1.0, a perfect trivial match; exactly one empty
/// → 0.0.
///
/// Guarantees: symmetric, bounded in [0, 1], and `score(a, a) == 1.0` for
/// any non-trivial `a`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let set_a = bigrams(&normalize(a));
    let set_b = bigrams(&normalize(b));

    match (set_a.is_empty(), set_b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => {
            let shared = set_a.intersection(&set_b).count();
            2.0 * shared as f64 / (set_a.len() + set_b.len()) as f64
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
