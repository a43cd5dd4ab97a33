//! Subscription command implementations
//!
//! The list command runs the full detection pipeline over both stored
//! sources; the rest manage the override layer that detection re-applies
//! on every run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Months};
use subsift_core::{
    run_detection, Database, DetectionConfig, Frequency, Origin, SubscriptionReport,
    TransactionSource,
};
use tracing::debug;

use super::truncate;

fn load_config(config_path: Option<&Path>) -> Result<DetectionConfig> {
    match config_path {
        Some(path) => DetectionConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(DetectionConfig::default()),
    }
}

fn detect(db: &Database, config: &DetectionConfig, months: u32) -> Result<SubscriptionReport> {
    let today = Local::now().date_naive();
    let since = today
        .checked_sub_months(Months::new(months))
        .unwrap_or(today);

    let file_txs = db.detection_window(TransactionSource::File, since)?;
    let sync_txs = db.detection_window(TransactionSource::Sync, since)?;
    let overrides = db.list_overrides()?;

    debug!(
        "Detection snapshot since {}: {} file txs, {} sync txs",
        since,
        file_txs.len(),
        sync_txs.len()
    );

    Ok(run_detection(
        &file_txs, &sync_txs, &overrides, config, today,
    ))
}

pub fn cmd_subscriptions_list(
    db: &Database,
    config_path: Option<&Path>,
    months: u32,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let report = detect(db, &config, months)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.entries.is_empty() {
        println!("No recurring charges detected. Import more history with:");
        println!("  subsift import --file statement.csv");
        return Ok(());
    }

    println!();
    println!("📋 Recurring Charges (last {} months)", months);
    println!("   ─────────────────────────────────────────────────────────────");

    for entry in &report.entries {
        let origin_icon = match entry.origin {
            Origin::File => "📄",
            Origin::Sync => "🔄",
            Origin::Merged => "🔗",
        };
        let modified_mark = if entry.is_user_modified { "✏️ " } else { "  " };
        let next_str = entry
            .next_expected
            .map(|d| format!("next {}", d))
            .unwrap_or_else(|| "overdue?".to_string());

        println!(
            "   {} {}{:24} │ {:>8}/{:<9} │ ${:>7.2}/mo │ {:.0}% │ {}",
            origin_icon,
            modified_mark,
            truncate(&entry.display_name, 24),
            format!("${:.2}", entry.amount),
            entry.frequency.as_str(),
            entry.monthly_equivalent,
            entry.confidence * 100.0,
            next_str,
        );
        println!("      key: {}", entry.subscription_key);
    }

    println!();
    println!("💸 Total monthly: ${:.2}", report.total_monthly);

    Ok(())
}

pub fn cmd_subscriptions_rename(db: &Database, key: &str, name: &str) -> Result<()> {
    db.update_override_fields(key, Some(name.to_string()), None, None)?;
    println!("✅ {} renamed to \"{}\"", key, name);
    Ok(())
}

pub fn cmd_subscriptions_set_amount(db: &Database, key: &str, amount: f64) -> Result<()> {
    if amount <= 0.0 {
        anyhow::bail!("Amount must be positive: {}", amount);
    }
    db.update_override_fields(key, None, Some(amount), None)?;
    println!("✅ {} amount corrected to ${:.2}", key, amount);
    Ok(())
}

pub fn cmd_subscriptions_set_frequency(db: &Database, key: &str, frequency: &str) -> Result<()> {
    let frequency: Frequency = frequency.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    db.update_override_fields(key, None, None, Some(frequency))?;
    println!("✅ {} frequency corrected to {}", key, frequency);
    Ok(())
}

pub fn cmd_subscriptions_remove(db: &Database, key: &str) -> Result<()> {
    db.soft_delete_subscription(key)?;
    println!("✅ {} hidden from future reports", key);
    println!("   Undo with: subsift subscriptions restore {}", key);
    Ok(())
}

pub fn cmd_subscriptions_restore(db: &Database, key: &str) -> Result<()> {
    db.restore_subscription(key)?;
    println!("✅ {} restored", key);
    Ok(())
}

pub fn cmd_subscriptions_clear(db: &Database, key: &str) -> Result<()> {
    if db.clear_override(key)? {
        println!("✅ Corrections for {} cleared", key);
    } else {
        println!("No corrections stored for {}", key);
    }
    Ok(())
}

pub fn cmd_subscriptions_overrides(db: &Database) -> Result<()> {
    let overrides = db.list_overrides()?;

    if overrides.is_empty() {
        println!("No user overrides stored.");
        return Ok(());
    }

    println!();
    println!("✏️  User Overrides");
    println!("   ─────────────────────────────────────────────────────────────");

    for ov in overrides {
        let mut parts = Vec::new();
        if let Some(ref name) = ov.custom_name {
            parts.push(format!("name=\"{}\"", name));
        }
        if let Some(amount) = ov.custom_amount {
            parts.push(format!("amount=${:.2}", amount));
        }
        if let Some(freq) = ov.custom_frequency {
            parts.push(format!("frequency={}", freq));
        }
        if ov.is_deleted {
            parts.push("hidden".to_string());
        }
        let detail = if parts.is_empty() {
            "(no changes)".to_string()
        } else {
            parts.join(", ")
        };

        println!("   {:30} │ {}", truncate(&ov.merchant_key, 30), detail);
    }

    Ok(())
}
