// 🎯 Matching Cascade - Three ordered passes, increasingly permissive
// Pass 1 strict (trade + name), Pass 2 relaxed (three sub-strategies), Pass 3 aggressive

use crate::loader::ScrapedRecord;
use crate::normalize::{first_significant_word, normalize};
use crate::similarity::name_similarity;
use crate::store::Entity;
use crate::trades::specialties_for;
use std::collections::HashSet;

/// Minimum first-significant-word length for the relaxed pass's word filter.
const FIRST_WORD_MIN_LEN: usize = 3;

/// A relaxed sub-strategy result below this is not "acceptable"; the next
/// sub-strategy gets a chance.
const RELAXED_SUB_FLOOR: f64 = 0.25;

/// Per-candidate floor when crossing trades in the relaxed pass. Stricter
/// than the pass's acceptance threshold on purpose: cross-trade matches
/// demand higher confidence.
const CROSS_TRADE_FLOOR: f64 = 0.40;

// ============================================================================
// PASS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Department + trade-mapped specialty + fuzzy name, threshold 0.30.
    Strict,
    /// Department + three relaxed sub-strategies, threshold 0.20.
    Relaxed,
    /// Best available name match in the department, threshold 0.10.
    Aggressive,
}

impl Pass {
    pub const ALL: [Pass; 3] = [Pass::Strict, Pass::Relaxed, Pass::Aggressive];

    pub fn threshold(&self) -> f64 {
        match self {
            Pass::Strict => 0.30,
            Pass::Relaxed => 0.20,
            Pass::Aggressive => 0.10,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pass::Strict => "strict",
            Pass::Relaxed => "relaxed",
            Pass::Aggressive => "aggressive",
        }
    }

    /// Whether the candidate pool is restricted by specialty at query time.
    pub fn filters_trade_in_query(&self) -> bool {
        matches!(self, Pass::Strict)
    }
}

// ============================================================================
// CANDIDATE SELECTION
// ============================================================================

/// Best-scoring unclaimed candidate, first-encountered wins ties.
///
/// The running best is only replaced on a strictly greater score, so with a
/// stably-ordered pool the tie-break is deterministic. `floor` drops
/// individual candidates below a per-candidate minimum before they can
/// compete.
fn best_match<'a, I>(
    name: &str,
    candidates: I,
    claimed: &HashSet<i64>,
    floor: Option<f64>,
) -> Option<(&'a Entity, f64)>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut best: Option<(&'a Entity, f64)> = None;

    for candidate in candidates {
        if claimed.contains(&candidate.id) {
            continue;
        }
        let score = name_similarity(name, &candidate.name);
        if let Some(floor) = floor {
            if score < floor {
                continue;
            }
        }
        match best {
            Some((_, held)) if score > held => best = Some((candidate, score)),
            None => best = Some((candidate, score)),
            _ => {}
        }
    }

    best
}

/// Select a candidate for one external record under the given pass.
///
/// `pool` is the department's phone-less candidate set for this pass
/// (already specialty-filtered for the strict pass). Returns the accepted
/// candidate and its score, or `None` when the record stays unmatched.
pub fn select_candidate<'a>(
    pass: Pass,
    record: &ScrapedRecord,
    pool: &'a [Entity],
    claimed: &HashSet<i64>,
) -> Option<(&'a Entity, f64)> {
    let best = match pass {
        Pass::Strict | Pass::Aggressive => best_match(&record.name, pool, claimed, None),
        Pass::Relaxed => relaxed_best(record, pool, claimed),
    };

    best.filter(|(_, score)| *score >= pass.threshold())
}

/// The relaxed pass's sub-strategies, applied in order; the first one to
/// produce an acceptable (≥ 0.25) result wins, and a later sub-strategy
/// only displaces an earlier unacceptable best on a strictly higher score.
fn relaxed_best<'a>(
    record: &ScrapedRecord,
    pool: &'a [Entity],
    claimed: &HashSet<i64>,
) -> Option<(&'a Entity, f64)> {
    let mut best: Option<(&'a Entity, f64)> = None;

    // (a) same trade-mapped specialty, equal first significant word
    if let Some(word) = first_significant_word(&record.name) {
        if word.len() >= FIRST_WORD_MIN_LEN {
            let specialty_set: HashSet<String> = specialties_for(&record.trade)
                .iter()
                .map(|s| normalize(s))
                .collect();

            let same_word = pool.iter().filter(|c| {
                specialty_set.contains(&normalize(&c.specialty))
                    && first_significant_word(&c.name).as_deref() == Some(word.as_str())
            });
            best = best_match(&record.name, same_word, claimed, None);
        }
    }

    // (b) cross-trade fuzzy, per-candidate floor 0.40
    if best.map_or(true, |(_, score)| score < RELAXED_SUB_FLOOR) {
        if let Some(found) = best_match(&record.name, pool, claimed, Some(CROSS_TRADE_FLOOR)) {
            if best.map_or(true, |(_, score)| found.1 > score) {
                best = Some(found);
            }
        }
    }

    // (c) city hint: candidate name contains the city token, or its first
    // word is contained in the city name
    if best.map_or(true, |(_, score)| score < RELAXED_SUB_FLOOR) {
        if let Some(city) = record.city.as_ref() {
            let city = normalize(city);
            if !city.is_empty() {
                let near_city = pool.iter().filter(|c| {
                    let name = normalize(&c.name);
                    let first_word = name.split(' ').next().unwrap_or("");
                    name.contains(&city) || (!first_word.is_empty() && city.contains(first_word))
                });
                if let Some(found) = best_match(&record.name, near_city, claimed, None) {
                    if best.map_or(true, |(_, score)| found.1 > score) {
                        best = Some(found);
                    }
                }
            }
        }
    }

    best
}

// ============================================================================
// TESTS
// ============================================================================
