//! Domain models for subsift

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which ingestion path a transaction arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Parsed from a manually imported statement file
    #[default]
    File,
    /// Delivered by the live bank-sync feed
    Sync,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sync => "sync",
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "sync" => Ok(Self::Sync),
            _ => Err(format!("Unknown transaction source: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized financial transaction
///
/// Sign convention throughout the engine: positive = outflow/expense,
/// negative = inflow/income. Both ingestion parsers normalize to this
/// before anything is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    /// Raw description as it appeared on the statement or feed
    pub raw_name: String,
    /// Cleaner merchant name when the source supplies one
    pub merchant_name: Option<String>,
    /// Positive = expense, negative = income
    pub amount: f64,
    pub category: Option<String>,
    /// Account label from the source (e.g., "Chase Checking ...1234")
    pub account: Option<String>,
    pub source: TransactionSource,
    /// Hash for deduplication
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction parsed from a statement file or feed export,
/// before DB insertion
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub raw_name: String,
    pub merchant_name: Option<String>,
    pub amount: f64,
    pub category: Option<String>,
    pub account: Option<String>,
    pub source: TransactionSource,
    pub import_hash: String,
}

/// Billing frequency of a recurring charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::BiWeekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Factor that converts one charge at this cadence into a monthly cost.
    ///
    /// Fixed table, not configurable: weekly x4.33, bi-weekly x2.17,
    /// monthly x1, quarterly /3, yearly /12.
    pub fn monthly_factor(&self) -> f64 {
        match self {
            Self::Weekly => 4.33,
            Self::BiWeekly => 2.17,
            Self::Monthly => 1.0,
            Self::Quarterly => 1.0 / 3.0,
            Self::Yearly => 1.0 / 12.0,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "bi-weekly" => Ok(Self::BiWeekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which detection pipeline produced a candidate subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Detected from imported statement transactions only
    File,
    /// Detected from bank-sync feed transactions only
    Sync,
    /// Reconciled from candidates found independently in both sources
    Merged,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sync => "sync",
            Self::Merged => "merged",
        }
    }
}

impl From<TransactionSource> for Origin {
    fn from(source: TransactionSource) -> Self {
        match source {
            TransactionSource::File => Self::File,
            TransactionSource::Sync => Self::Sync,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One charge in a candidate's history (newest-first in `history`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// A provisional recurring-charge record produced by classifying one
/// merchant cohort, before merge and override application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSubscription {
    /// Normalized grouping key; stable across re-detection
    pub merchant_key: String,
    pub display_name: String,
    /// Representative per-charge amount (rounded mean of the cohort)
    pub amount: f64,
    pub frequency: Frequency,
    /// Confidence in [0.4, 1.0]; timing-dominant, amount-secondary
    pub confidence: f64,
    pub last_charge: NaiveDate,
    /// Projected next charge date; omitted once it would be in the past
    pub next_expected: Option<NaiveDate>,
    pub category: Option<String>,
    pub account: Option<String>,
    pub transaction_count: usize,
    /// Full cohort, newest-first
    pub history: Vec<ChargeRecord>,
    pub origin: Origin,
}

/// A user-authored correction or soft-deletion, keyed by merchant key
/// so it survives re-detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionOverride {
    pub merchant_key: String,
    pub custom_name: Option<String>,
    pub custom_amount: Option<f64>,
    pub custom_frequency: Option<Frequency>,
    /// Soft-delete: suppress this merchant from output even though
    /// re-detection keeps rediscovering the raw pattern
    pub is_deleted: bool,
}

impl SubscriptionOverride {
    /// An empty (no-op) override for a merchant key
    pub fn new(merchant_key: impl Into<String>) -> Self {
        Self {
            merchant_key: merchant_key.into(),
            custom_name: None,
            custom_amount: None,
            custom_frequency: None,
            is_deleted: false,
        }
    }
}

/// A subscription entry after merge and override application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionView {
    /// Same as the merchant key; exposed so a caller can issue an
    /// override targeting this exact entry
    pub subscription_key: String,
    pub display_name: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub confidence: f64,
    pub last_charge: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_expected: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub transaction_count: usize,
    pub history: Vec<ChargeRecord>,
    pub origin: Origin,
    /// True iff at least one field came from a user override
    pub is_user_modified: bool,
    /// This entry's cost normalized to a monthly cadence (unrounded;
    /// the portfolio total is rounded once at the end)
    pub monthly_equivalent: f64,
}

/// Final output of a detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionReport {
    /// Entries sorted by monthly cost descending, merchant key ascending
    pub entries: Vec<SubscriptionView>,
    /// Sum of per-entry monthly equivalents, rounded to 2 decimals
    pub total_monthly: f64,
}
