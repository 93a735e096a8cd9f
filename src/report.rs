// 📊 Run Reporter - Per-pass counters and the final tally
// The engine's only externally observable output besides the store updates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PASS STATS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassStats {
    /// Pass label ("strict", "relaxed", "aggressive")
    pub pass: String,

    /// Records whose conditional write succeeded
    pub matched: usize,

    /// Records that lost the conditional write to a concurrent writer
    pub race_skipped: usize,

    /// Storage failures (query or write) during the pass
    pub errored: usize,

    /// Size of the unmatched set once the pass finished
    pub remaining_after: usize,
}

impl PassStats {
    pub fn new(pass: &str) -> Self {
        PassStats {
            pass: pass.to_string(),
            matched: 0,
            race_skipped: 0,
            errored: 0,
            remaining_after: 0,
        }
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Deduplicated source records fed into the run
    pub source_records: usize,

    /// Records dropped up front because their phone already exists in the store
    pub already_resolved: usize,

    pub passes: Vec<PassStats>,
}

impl RunReport {
    pub fn new(source_records: usize) -> Self {
        RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            source_records,
            already_resolved: 0,
            passes: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_matched(&self) -> usize {
        self.passes.iter().map(|p| p.matched).sum()
    }

    pub fn total_race_skipped(&self) -> usize {
        self.passes.iter().map(|p| p.race_skipped).sum()
    }

    pub fn total_errored(&self) -> usize {
        self.passes.iter().map(|p| p.errored).sum()
    }

    /// Unmatched records once every pass has run.
    pub fn remaining(&self) -> usize {
        self.passes
            .last()
            .map(|p| p.remaining_after)
            .unwrap_or(self.source_records - self.already_resolved)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records: {} matched, {} race-skipped, {} errored, {} already resolved, {} remaining",
            self.source_records,
            self.total_matched(),
            self.total_race_skipped(),
            self.total_errored(),
            self.already_resolved,
            self.remaining()
        )
    }

    /// Print the pass-by-pass breakdown and the final tally.
    pub fn print(&self) {
        println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📊 Reconciliation run {}", self.run_id);

        for stats in &self.passes {
            println!(
                "  Pass {:>10}: {} matched, {} race-skipped, {} errored, {} remaining",
                stats.pass, stats.matched, stats.race_skipped, stats.errored,
                stats.remaining_after
            );
        }

        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("✓ {}", self.summary());
    }
}

// ============================================================================
// TESTS
// ============================================================================
