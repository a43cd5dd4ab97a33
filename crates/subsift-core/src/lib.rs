//! Subsift Core Library
//!
//! Shared functionality for the Subsift recurring-charge tool:
//! - Database access and migrations
//! - Statement and sync-feed ingestion parsers
//! - Recurring-charge detection (merchant grouping + interval classification)
//! - Two-source candidate merge and user overrides
//! - Monthly-equivalent spend reporting

pub mod db;
pub mod detect;
pub mod error;
pub mod import;
pub mod merge;
pub mod models;

pub use db::Database;
pub use detect::{detect_candidates, merchant_key, Classification, DetectionConfig, FrequencyBand};
pub use error::{Error, Result};
pub use import::{parse_feed_export, parse_statement_csv, ImportFormat};
pub use merge::{apply_overrides, build_report, merge_candidates, run_detection};
pub use models::{
    CandidateSubscription, ChargeRecord, Frequency, NewTransaction, Origin, SubscriptionOverride,
    SubscriptionReport, SubscriptionView, Transaction, TransactionSource,
};
