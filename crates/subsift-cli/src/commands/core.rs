//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_status` - Show database status
//! - `cmd_reset` - Clear imported data

use std::path::Path;

use anyhow::{Context, Result};
use subsift_core::Database;

/// Open the database, running migrations if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    Database::new(&db_path.to_string_lossy()).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import a statement: subsift import --file statement.csv");
    println!("  2. Detect recurring charges: subsift subscriptions");

    Ok(())
}

pub fn cmd_status(db_path: &Path) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Subsift Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }

        match open_db(db_path) {
            Ok(db) => {
                let (file, sync) = db.transaction_counts()?;
                let overrides = db.list_overrides()?;
                println!();
                println!("   Imported transactions: {}", file);
                println!("   Synced transactions: {}", sync);
                println!("   User overrides: {}", overrides.len());
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    println!();
    Ok(())
}

pub fn cmd_reset(db_path: &Path, yes: bool) -> Result<()> {
    if !yes {
        println!("This clears all imported transactions. User overrides are kept.");
        print!("Continue? [y/N] ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let db = open_db(db_path)?;
    db.soft_reset()?;

    println!("✅ Imported data cleared. Re-import to rebuild the report.");
    Ok(())
}
