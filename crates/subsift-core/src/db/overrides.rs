//! Subscription override operations
//!
//! Overrides are keyed by the same normalized merchant key the detection
//! engine uses, so they keep applying across re-detection runs. The engine
//! only ever reads these; all writes happen through this caller-facing API.

use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Frequency, SubscriptionOverride};

fn row_to_override(row: &Row<'_>) -> rusqlite::Result<SubscriptionOverride> {
    let freq_str: Option<String> = row.get(3)?;

    Ok(SubscriptionOverride {
        merchant_key: row.get(0)?,
        custom_name: row.get(1)?,
        custom_amount: row.get(2)?,
        custom_frequency: freq_str.and_then(|s| s.parse::<Frequency>().ok()),
        is_deleted: row.get(4)?,
    })
}

impl Database {
    /// Write an override, replacing any existing one for the merchant key
    pub fn upsert_override(&self, ov: &SubscriptionOverride) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO subscription_overrides (merchant_key, custom_name, custom_amount, custom_frequency, is_deleted, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(merchant_key) DO UPDATE SET
                custom_name = excluded.custom_name,
                custom_amount = excluded.custom_amount,
                custom_frequency = excluded.custom_frequency,
                is_deleted = excluded.is_deleted,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                ov.merchant_key,
                ov.custom_name,
                ov.custom_amount,
                ov.custom_frequency.map(|f| f.as_str()),
                ov.is_deleted,
            ],
        )?;
        Ok(())
    }

    /// Fetch the override for a merchant key, if any
    pub fn get_override(&self, merchant_key: &str) -> Result<Option<SubscriptionOverride>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT merchant_key, custom_name, custom_amount, custom_frequency, is_deleted
                 FROM subscription_overrides WHERE merchant_key = ?",
                params![merchant_key],
                row_to_override,
            )
            .optional()?;
        Ok(result)
    }

    /// List all overrides for the current user
    pub fn list_overrides(&self) -> Result<Vec<SubscriptionOverride>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT merchant_key, custom_name, custom_amount, custom_frequency, is_deleted
             FROM subscription_overrides ORDER BY merchant_key",
        )?;

        let overrides = stmt
            .query_map([], row_to_override)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(overrides)
    }

    /// Merge a partial edit into the stored override for a merchant key
    ///
    /// Existing custom fields are preserved unless the edit supplies a
    /// replacement, so renaming and then fixing the amount accumulates
    /// rather than resets.
    pub fn update_override_fields(
        &self,
        merchant_key: &str,
        custom_name: Option<String>,
        custom_amount: Option<f64>,
        custom_frequency: Option<Frequency>,
    ) -> Result<SubscriptionOverride> {
        let mut ov = self
            .get_override(merchant_key)?
            .unwrap_or_else(|| SubscriptionOverride::new(merchant_key));

        if custom_name.is_some() {
            ov.custom_name = custom_name;
        }
        if custom_amount.is_some() {
            ov.custom_amount = custom_amount;
        }
        if custom_frequency.is_some() {
            ov.custom_frequency = custom_frequency;
        }

        self.upsert_override(&ov)?;
        Ok(ov)
    }

    /// Soft-delete a subscription: detection keeps rediscovering the raw
    /// pattern, but the override suppresses it from every future report
    pub fn soft_delete_subscription(&self, merchant_key: &str) -> Result<()> {
        let mut ov = self
            .get_override(merchant_key)?
            .unwrap_or_else(|| SubscriptionOverride::new(merchant_key));
        ov.is_deleted = true;
        self.upsert_override(&ov)
    }

    /// Undo a soft-delete
    pub fn restore_subscription(&self, merchant_key: &str) -> Result<()> {
        let mut ov = self
            .get_override(merchant_key)?
            .ok_or_else(|| Error::NotFound(format!("No override for {}", merchant_key)))?;
        ov.is_deleted = false;
        self.upsert_override(&ov)
    }

    /// Remove an override entirely, reverting to detected values
    pub fn clear_override(&self, merchant_key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM subscription_overrides WHERE merchant_key = ?",
            params![merchant_key],
        )?;
        Ok(removed > 0)
    }
}
