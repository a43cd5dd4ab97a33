//! Transaction command implementations

use anyhow::Result;
use subsift_core::Database;

use super::truncate;

pub fn cmd_transactions_list(db: &Database, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(limit, 0)?;

    if transactions.is_empty() {
        println!("No transactions found. Import some with:");
        println!("  subsift import --file statement.csv");
        return Ok(());
    }

    println!();
    println!("💳 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let name = tx.merchant_name.as_deref().unwrap_or(&tx.raw_name);
        println!(
            "   {} │ {:30} │ {:>10} │ {}",
            tx.date,
            truncate(name, 30),
            format!("${:.2}", tx.amount),
            tx.source,
        );
    }

    Ok(())
}
