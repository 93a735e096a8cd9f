// Phone Reconciliation Engine - Core Library
// Attaches scraped phone numbers to phone-less directory entities

pub mod normalize;     // Text normalizer - foundation for all matching
pub mod similarity;    // Bigram-overlap name scorer
pub mod loader;        // NDJSON source loader & phone-keyed deduplicator
pub mod trades;        // Static trade-to-specialty mapping
pub mod store;         // Directory store: candidate queries + conditional writes
pub mod cascade;       // Three-pass matching cascade
pub mod engine;        // Run driver: passes, claims, reconnects
pub mod report;        // Per-pass counters and final tally

// Re-export commonly used types
pub use cascade::{select_candidate, Pass};
pub use engine::ReconciliationEngine;
pub use loader::{load_source_files, ScrapedRecord};
pub use normalize::{first_significant_word, normalize};
pub use report::{PassStats, RunReport};
pub use similarity::name_similarity;
pub use store::{
    insert_entity, setup_directory_schema, DirectoryStore, Entity, PhoneClaim,
};
pub use trades::specialties_for;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
