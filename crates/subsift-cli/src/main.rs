//! Subsift CLI - Recurring-charge detector
//!
//! Usage:
//!   subsift init                      Initialize database
//!   subsift import --file FILE        Import a statement CSV or feed JSON
//!   subsift subscriptions             Detect and list recurring charges
//!   subsift subscriptions remove KEY  Hide a subscription from reports

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import { file, format } => {
            commands::cmd_import(&cli.db, &file, format.as_deref())
        }
        Commands::Subscriptions { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_subscriptions_list(&db, cli.config.as_deref(), 12, false),
                Some(SubscriptionsAction::List { months, json }) => {
                    commands::cmd_subscriptions_list(&db, cli.config.as_deref(), months, json)
                }
                Some(SubscriptionsAction::Rename { key, name }) => {
                    commands::cmd_subscriptions_rename(&db, &key, &name)
                }
                Some(SubscriptionsAction::SetAmount { key, amount }) => {
                    commands::cmd_subscriptions_set_amount(&db, &key, amount)
                }
                Some(SubscriptionsAction::SetFrequency { key, frequency }) => {
                    commands::cmd_subscriptions_set_frequency(&db, &key, &frequency)
                }
                Some(SubscriptionsAction::Remove { key }) => {
                    commands::cmd_subscriptions_remove(&db, &key)
                }
                Some(SubscriptionsAction::Restore { key }) => {
                    commands::cmd_subscriptions_restore(&db, &key)
                }
                Some(SubscriptionsAction::Clear { key }) => {
                    commands::cmd_subscriptions_clear(&db, &key)
                }
                Some(SubscriptionsAction::Overrides) => commands::cmd_subscriptions_overrides(&db),
            }
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_transactions_list(&db, 20),
                Some(TransactionsAction::List { limit }) => {
                    commands::cmd_transactions_list(&db, limit)
                }
            }
        }
        Commands::Status => commands::cmd_status(&cli.db),
        Commands::Reset { yes } => commands::cmd_reset(&cli.db, yes),
    }
}
