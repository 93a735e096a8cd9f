use anyhow::Result;
use std::env;

use phone_recon::{load_source_files, DirectoryStore, ReconciliationEngine};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <directory.db> <records.ndjson>...", args[0]);
        std::process::exit(1);
    }

    let db_path = &args[1];
    let source_files = &args[2..];

    println!("📞 Phone Reconciliation - scraped records → directory entities");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load and deduplicate the scraped source files
    println!("\n📂 Loading {} source file(s)...", source_files.len());
    let records = load_source_files(source_files)?;
    println!("✓ {} unique phone numbers after deduplication", records.len());

    // 2. Open the directory store
    println!("\n🔧 Opening directory store...");
    let store = DirectoryStore::open(db_path)?;
    println!("✓ Connected to {}", db_path);

    // 3. Run the matching cascade
    println!("\n🎯 Running matching cascade...");
    let mut engine = ReconciliationEngine::new(store);
    let report = engine.run(&records)?;

    // 4. Final tally
    report.print();

    Ok(())
}
