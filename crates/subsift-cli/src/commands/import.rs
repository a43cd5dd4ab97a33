//! Import command implementation

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use subsift_core::{parse_feed_export, parse_statement_csv, ImportFormat};
use tracing::info;

use super::open_db;

pub fn cmd_import(db_path: &Path, file: &Path, format: Option<&str>) -> Result<()> {
    let format = match format {
        Some(s) => s
            .parse::<ImportFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => ImportFormat::from_path(file).ok_or_else(|| {
            anyhow::anyhow!(
                "Cannot detect format of {} (use --format csv or --format json)",
                file.display()
            )
        })?,
    };

    println!("📥 Importing {}...", file.display());

    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let transactions = match format {
        ImportFormat::StatementCsv => {
            println!("   Format: statement CSV");
            parse_statement_csv(reader)?
        }
        ImportFormat::FeedJson => {
            println!("   Format: sync-feed JSON");
            parse_feed_export(reader)?
        }
    };

    let db = open_db(db_path)?;

    let mut imported = 0;
    let mut skipped = 0;
    for tx in &transactions {
        if db.insert_transaction(tx)?.is_some() {
            imported += 1;
        } else {
            skipped += 1;
        }
    }

    info!(
        "Imported {} transactions from {} ({} duplicates skipped)",
        imported,
        file.display(),
        skipped
    );

    println!();
    println!("✅ Import complete");
    println!("   Imported: {}", imported);
    if skipped > 0 {
        println!("   Skipped (duplicates): {}", skipped);
    }
    println!();
    println!("Run 'subsift subscriptions' to see detected recurring charges.");

    Ok(())
}
