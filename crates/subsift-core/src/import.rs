//! Ingestion parsers for statement files and sync-feed exports
//!
//! Two producer functions converge on one `NewTransaction` shape so the
//! detection engine never branches per source:
//! - [`parse_statement_csv`]: delimited statement files, bank convention
//!   (negative = expense), normalized here to outflow-positive
//! - [`parse_feed_export`]: JSON dump of a bank-sync feed, already
//!   outflow-positive; pending records are dropped at this boundary
//!
//! Date parsing and amount sign normalization happen here; the engine
//! downstream assumes well-formed records.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionSource};

/// Supported import file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Delimited statement file (CSV)
    StatementCsv,
    /// Bank-sync feed export (JSON array)
    FeedJson,
}

impl ImportFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "csv" | "txt" => Some(Self::StatementCsv),
            "json" => Some(Self::FeedJson),
            _ => None,
        }
    }
}

impl std::str::FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" | "statement" => Ok(Self::StatementCsv),
            "json" | "feed" => Ok(Self::FeedJson),
            _ => Err(format!("Unknown import format: {}", s)),
        }
    }
}

/// Generate a unique hash for deduplication
fn generate_hash(date: &NaiveDate, name: &str, amount: f64, source: TransactionSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update(source.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a statement date: ISO first, then US format
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .map_err(|_| Error::Import(format!("Invalid date: {}", s)))
}

/// Parse a statement amount, tolerating "$", thousands separators, and
/// parenthesized negatives
fn parse_amount(s: &str) -> Result<f64> {
    let trimmed = s.trim().replace(['$', ','], "");
    let (text, negate) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (trimmed[1..trimmed.len() - 1].to_string(), true)
    } else {
        (trimmed, false)
    };

    let value: f64 = text
        .parse()
        .map_err(|_| Error::Import(format!("Invalid amount: {}", s)))?;

    Ok(if negate { -value } else { value })
}

/// Parse a delimited statement file into transactions
///
/// Columns are located by header name (case-insensitive): `date`,
/// `description` or `name`, `amount`, and optionally `category` and
/// `account`. Statement amounts use the bank convention (negative =
/// expense); they are negated here so stored records are outflow-positive.
pub fn parse_statement_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let date_col = find("date")
        .ok_or_else(|| Error::Import("Missing 'Date' column".into()))?;
    let name_col = find("description")
        .or_else(|| find("name"))
        .ok_or_else(|| Error::Import("Missing 'Description' column".into()))?;
    let amount_col = find("amount")
        .ok_or_else(|| Error::Import("Missing 'Amount' column".into()))?;
    let category_col = find("category");
    let account_col = find("account");

    let mut transactions = Vec::new();

    for result in rdr.records() {
        let record = result?;

        let date_str = record
            .get(date_col)
            .ok_or_else(|| Error::Import("Missing date".into()))?;
        let date = parse_date(date_str)?;

        let raw_name = record
            .get(name_col)
            .ok_or_else(|| Error::Import("Missing description".into()))?
            .trim()
            .to_string();

        let amount_str = record
            .get(amount_col)
            .ok_or_else(|| Error::Import("Missing amount".into()))?;
        // Bank convention: negative = expense. Flip to outflow-positive.
        let amount = -parse_amount(amount_str)?;

        let category = category_col
            .and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let account = account_col
            .and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let import_hash = generate_hash(&date, &raw_name, amount, TransactionSource::File);

        transactions.push(NewTransaction {
            date,
            raw_name,
            merchant_name: None,
            amount,
            category,
            account,
            source: TransactionSource::File,
            import_hash,
        });
    }

    debug!("Parsed {} statement transactions", transactions.len());
    Ok(transactions)
}

/// One record of a bank-sync feed export
#[derive(Debug, Deserialize)]
struct FeedRecord {
    date: NaiveDate,
    name: String,
    #[serde(default)]
    merchant_name: Option<String>,
    /// Feed convention matches the engine: positive = outflow
    amount: f64,
    #[serde(default)]
    pending: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    account: Option<String>,
}

/// Parse a JSON export of a bank-sync feed into transactions
///
/// Pending records are dropped: the engine's contract is that it only ever
/// sees settled transactions, and that filter belongs to this boundary.
pub fn parse_feed_export<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let records: Vec<FeedRecord> = serde_json::from_reader(reader)?;

    let total = records.len();
    let transactions: Vec<NewTransaction> = records
        .into_iter()
        .filter(|r| !r.pending)
        .map(|r| {
            let import_hash = generate_hash(&r.date, &r.name, r.amount, TransactionSource::Sync);
            NewTransaction {
                date: r.date,
                raw_name: r.name,
                merchant_name: r.merchant_name.filter(|m| !m.trim().is_empty()),
                amount: r.amount,
                category: r.category,
                account: r.account,
                source: TransactionSource::Sync,
                import_hash,
            }
        })
        .collect();

    debug!(
        "Parsed {} feed transactions ({} pending dropped)",
        transactions.len(),
        total - transactions.len()
    );
    Ok(transactions)
}
