//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Subsift - Find the recurring charges hiding in your statements
#[derive(Parser)]
#[command(name = "subsift")]
#[command(about = "Recurring-charge detector for bank statements and sync feeds", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "subsift.db", global = true)]
    pub db: PathBuf,

    /// Detection thresholds file (TOML); built-in defaults if omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a statement file (CSV) or sync-feed export (JSON)
    Import {
        /// File to import
        #[arg(short, long)]
        file: PathBuf,

        /// File format: csv or json (auto-detected from extension if omitted)
        #[arg(long)]
        format: Option<String>,
    },

    /// Detect and manage recurring charges
    Subscriptions {
        #[command(subcommand)]
        action: Option<SubscriptionsAction>,
    },

    /// List stored transactions
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Show database status
    Status,

    /// Clear imported transactions (user overrides are kept)
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// Run detection and list recurring charges (the default)
    List {
        /// Lookback window in months
        #[arg(long, default_value = "12")]
        months: u32,

        /// Emit the full report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rename a detected subscription
    Rename {
        /// Subscription key (shown in the list output)
        key: String,
        /// New display name
        name: String,
    },

    /// Correct the charge amount of a subscription
    SetAmount {
        /// Subscription key
        key: String,
        /// Corrected per-charge amount
        amount: f64,
    },

    /// Correct the billing frequency of a subscription
    SetFrequency {
        /// Subscription key
        key: String,
        /// weekly, biweekly, monthly, quarterly, or yearly
        frequency: String,
    },

    /// Hide a subscription from future reports
    Remove {
        /// Subscription key
        key: String,
    },

    /// Undo a remove
    Restore {
        /// Subscription key
        key: String,
    },

    /// Drop all corrections for a subscription, reverting to detected values
    Clear {
        /// Subscription key
        key: String,
    },

    /// List stored user overrides
    Overrides,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}
