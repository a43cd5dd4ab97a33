//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction, TransactionSource};

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(1)?;
    let source_str: String = row.get(7)?;
    let created_at_str: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        raw_name: row.get(2)?,
        merchant_name: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        account: row.get(6)?,
        source: source_str.parse().unwrap_or_default(),
        import_hash: row.get(8)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const TRANSACTION_COLUMNS: &str =
    "id, date, raw_name, merchant_name, amount, category, account, source, import_hash, created_at";

impl Database {
    /// Insert a transaction (skips duplicates based on import_hash)
    ///
    /// Returns the new row id, or `None` when the record was already present.
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE import_hash = ?",
                params![tx.import_hash],
                |row| row.get(0),
            )
            .ok();

        if existing.is_some() {
            return Ok(None); // Duplicate, skip
        }

        conn.execute(
            r#"
            INSERT INTO transactions (date, raw_name, merchant_name, amount, category, account, source, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.date.to_string(),
                tx.raw_name,
                tx.merchant_name,
                tx.amount,
                tx.category,
                tx.account,
                tx.source.as_str(),
                tx.import_hash,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// List transactions, newest first
    pub fn list_transactions(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![limit, offset], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Load one source's detection snapshot
    ///
    /// Enforces the engine's input precondition: only outflows
    /// (`amount > 0`) inside the lookback window, ordered ascending by date
    /// (row id breaks date ties deterministically).
    pub fn detection_window(
        &self,
        source: TransactionSource,
        since: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE source = ? AND amount > 0 AND date >= ?
             ORDER BY date ASC, id ASC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![source.as_str(), since.to_string()], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count stored transactions per source
    pub fn transaction_counts(&self) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        let file: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE source = 'file'",
            [],
            |row| row.get(0),
        )?;
        let sync: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE source = 'sync'",
            [],
            |row| row.get(0),
        )?;
        Ok((file, sync))
    }
}
