// ⚙️ Reconciliation Engine - Drives the cascade against the directory store
// Sequential departments and records; optimistic conditional writes; best-effort

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};

use crate::cascade::{select_candidate, Pass};
use crate::loader::ScrapedRecord;
use crate::report::{PassStats, RunReport};
use crate::store::{DirectoryStore, PhoneClaim};
use crate::trades::specialties_for;

/// Storage errors logged per pass before going quiet.
const ERROR_LOG_CAP: usize = 5;

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    store: DirectoryStore,
}

impl ReconciliationEngine {
    pub fn new(store: DirectoryStore) -> Self {
        ReconciliationEngine { store }
    }

    /// Run the full cascade over a deduplicated, phone-keyed record set.
    ///
    /// Records whose phone already exists in the store are dropped up front;
    /// that pre-check is the one query allowed to abort the run, and only
    /// after a reconnect-and-retry (nothing has been processed yet). Each
    /// pass consumes the "remaining" set left by the previous one; a
    /// successful or race-skipped record never reaches a later pass. No
    /// error after this point aborts the run - failures are counted,
    /// reported, and processing moves on.
    pub fn run(
        &mut self,
        records: &BTreeMap<String, ScrapedRecord>,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(records.len());

        let phones: Vec<String> = records.keys().cloned().collect();
        let existing = match self.store.existing_phones(&phones) {
            Ok(existing) => existing,
            Err(e) => {
                eprintln!("⚠ Storage error (phone pre-check): {:#}", e);
                self.store.reconnect()?;
                self.store.existing_phones(&phones)?
            }
        };
        report.already_resolved = existing.len();

        let mut remaining: BTreeMap<String, ScrapedRecord> = records
            .iter()
            .filter(|(phone, _)| !existing.contains(*phone))
            .map(|(phone, record)| (phone.clone(), record.clone()))
            .collect();

        // Entities claimed in this run; checked before any candidate is
        // considered, so a department pool reused across records can never
        // hand out the same entity twice.
        let mut claimed: HashSet<i64> = HashSet::new();

        for pass in Pass::ALL {
            let stats = self.run_pass(pass, &mut remaining, &mut claimed);
            report.passes.push(stats);
        }

        report.finish();
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------------

    /// One pass over the remaining set. A failed candidate fetch skips only
    /// the group it was for - a whole department in the relaxed and
    /// aggressive passes, the single (department, trade) group in the
    /// strict pass, where other trades of the department can still proceed.
    fn run_pass(
        &mut self,
        pass: Pass,
        remaining: &mut BTreeMap<String, ScrapedRecord>,
        claimed: &mut HashSet<i64>,
    ) -> PassStats {
        let mut stats = PassStats::new(pass.label());

        // One candidate fetch per department (per trade for the strict
        // pass), reused across every record of that group.
        for (department, phones) in group_by_department(remaining) {
            if pass.filters_trade_in_query() {
                for (trade, phones) in group_by_trade(remaining, &phones) {
                    let specialties = specialties_for(&trade);
                    let pool =
                        match self.store.find_phoneless(&department, Some(&specialties)) {
                            Ok(pool) => pool,
                            Err(e) => {
                                self.note_storage_error(&mut stats, &department, &e);
                                continue;
                            }
                        };
                    self.match_group(pass, &phones, &pool, remaining, claimed, &mut stats);
                }
            } else {
                let pool = match self.store.find_phoneless(&department, None) {
                    Ok(pool) => pool,
                    Err(e) => {
                        self.note_storage_error(&mut stats, &department, &e);
                        continue;
                    }
                };
                self.match_group(pass, &phones, &pool, remaining, claimed, &mut stats);
            }
        }

        stats.remaining_after = remaining.len();
        stats
    }

    fn match_group(
        &mut self,
        pass: Pass,
        phones: &[String],
        pool: &[crate::store::Entity],
        remaining: &mut BTreeMap<String, ScrapedRecord>,
        claimed: &mut HashSet<i64>,
        stats: &mut PassStats,
    ) {
        for phone in phones {
            let record = match remaining.get(phone) {
                Some(record) => record,
                None => continue,
            };

            let (entity, _score) = match select_candidate(pass, record, pool, claimed) {
                Some(decision) => decision,
                None => continue,
            };

            let claim = PhoneClaim::from_record(entity.id, record);
            match self.store.apply_claim(&claim) {
                Ok(1) => {
                    stats.matched += 1;
                    claimed.insert(entity.id);
                    remaining.remove(phone);
                }
                Ok(_) => {
                    // Another writer won the assignment: a skip, not an
                    // error, and not retried within this run.
                    stats.race_skipped += 1;
                    claimed.insert(entity.id);
                    remaining.remove(phone);
                }
                Err(e) => {
                    self.note_storage_error(stats, phone, &e);
                    // record stays in the remaining set for the next pass
                }
            }
        }
    }

    /// Count a storage failure, log the first few, reconnect, move on.
    fn note_storage_error(&mut self, stats: &mut PassStats, what: &str, error: &anyhow::Error) {
        stats.errored += 1;
        if stats.errored <= ERROR_LOG_CAP {
            eprintln!("⚠ Storage error ({}): {:#}", what, error);
        }
        if let Err(e) = self.store.reconnect() {
            eprintln!("⚠ Reconnect failed: {:#}", e);
        }
    }
}

// ============================================================================
// GROUPING
// ============================================================================

fn group_by_department(
    remaining: &BTreeMap<String, ScrapedRecord>,
) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (phone, record) in remaining {
        groups
            .entry(record.dept_code.clone())
            .or_default()
            .push(phone.clone());
    }
    groups
}

fn group_by_trade(
    remaining: &BTreeMap<String, ScrapedRecord>,
    phones: &[String],
) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for phone in phones {
        if let Some(record) = remaining.get(phone) {
            groups
                .entry(record.trade.clone())
                .or_default()
                .push(phone.clone());
        }
    }
    groups
}

// ============================================================================
// TESTS
// ============================================================================
