//! Recover command implementation.

use super::{existing_store_config, require_file};
use nsfslite_core::Engine;
use std::path::Path;

/// Runs the recover command.
///
/// Opening the engine replays the WAL; closing it leaves the log empty.
pub fn run(db: &Path, wal: &Path) -> Result<(), Box<dyn std::error::Error>> {
    require_file(db, "storage file")?;
    tracing::debug!(db = %db.display(), wal = %wal.display(), "recovering store");
    let engine = Engine::open(db, wal, existing_store_config())?;
    let report = engine.recovery_report().clone();
    let applied = engine.applied_seq();
    engine.close()?;

    println!("Recovery complete");
    println!("  replayed:        {}", report.replayed);
    println!("  already applied: {}", report.already_applied);
    println!("  discarded:       {}", report.discarded);
    println!("  truncated bytes: {}", report.truncated_bytes);
    println!("  applied seq:     {}", applied.as_u64());
    if let Some(reason) = report.stopped_by {
        println!("  stopped early:   {reason}");
    }

    Ok(())
}
