// 🔤 Text Normalizer - Foundation for all name matching
// Lowercase + accent stripping (NFD, combining marks removed) + punctuation collapse

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// STOPWORDS
// ============================================================================

/// Tokens ignored when extracting the first significant word of a name.
/// Company-form abbreviations plus French articles and prepositions.
const STOPWORDS: &[&str] = &[
    // Company forms
    "sarl", "sas", "sasu", "eurl", "sa", "sci", "ets", "ste", "cie",
    // Articles / prepositions
    "le", "la", "les", "l", "de", "du", "des", "d", "et", "en", "au", "aux",
];

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize a name for comparison.
///
/// - Unicode NFD decomposition, combining marks removed (accent stripping)
/// - lowercase
/// - non-alphanumeric characters collapsed to single spaces
/// - trimmed
///
/// Pure function; idempotent. Must be applied identically to both sides of
/// every comparison.
pub fn normalize(s: &str) -> String {
    let stripped: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First normalized word of a name that is not a stopword and has length > 1.
///
/// Used as a pre-filter in the relaxed matching pass, never as the sole
/// acceptance criterion.
pub fn first_significant_word(s: &str) -> Option<String> {
    normalize(s)
        .split(' ')
        .find(|w| w.len() > 1 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
