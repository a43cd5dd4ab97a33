//! Cross-source reconciliation, user overrides, and portfolio totals
//!
//! The statement-import and sync-feed pipelines each produce their own
//! candidate set (the two sources may hold disjoint history and normalize
//! names differently). This module reconciles them into one logical entry
//! per merchant, layers user corrections on top, and computes the
//! monthly-equivalent portfolio cost.

use chrono::NaiveDate;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::detect::{detect_candidates, round2, DetectionConfig};
use crate::models::{
    CandidateSubscription, Origin, SubscriptionOverride, SubscriptionReport, SubscriptionView,
    Transaction, TransactionSource,
};

/// Reconcile candidates discovered independently from both sources
///
/// A merchant key present in only one source passes through unchanged. A key
/// present in both keeps whichever candidate carries more transactions (more
/// evidence) and is re-tagged [`Origin::Merged`]. Ties keep the
/// imported-file candidate; it was registered first, and callers must treat
/// the tie-break as deterministic rather than meaningful.
pub fn merge_candidates(
    file_candidates: Vec<CandidateSubscription>,
    sync_candidates: Vec<CandidateSubscription>,
) -> Vec<CandidateSubscription> {
    let mut merged: HashMap<String, CandidateSubscription> = file_candidates
        .into_iter()
        .map(|c| (c.merchant_key.clone(), c))
        .collect();

    for candidate in sync_candidates {
        match merged.entry(candidate.merchant_key.clone()) {
            Entry::Occupied(mut entry) => {
                debug!(
                    "Reconciling {}: file has {} txs, sync has {}",
                    candidate.merchant_key,
                    entry.get().transaction_count,
                    candidate.transaction_count
                );
                if candidate.transaction_count > entry.get().transaction_count {
                    entry.insert(candidate);
                }
                entry.get_mut().origin = Origin::Merged;
            }
            Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
    }

    let mut candidates: Vec<CandidateSubscription> = merged.into_values().collect();
    candidates.sort_by(|a, b| a.merchant_key.cmp(&b.merchant_key));
    candidates
}

/// Apply user overrides to the merged candidate set
///
/// Overrides are looked up by merchant key. A soft-deleted merchant is
/// dropped from the output entirely; otherwise custom name/amount/frequency
/// replace the detected values field-by-field, and `is_user_modified` is set
/// iff anything was overridden. The monthly equivalent reflects the
/// post-override amount and frequency.
pub fn apply_overrides(
    candidates: Vec<CandidateSubscription>,
    overrides: &[SubscriptionOverride],
) -> Vec<SubscriptionView> {
    let by_key: HashMap<&str, &SubscriptionOverride> = overrides
        .iter()
        .map(|o| (o.merchant_key.as_str(), o))
        .collect();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let ov = by_key.get(candidate.merchant_key.as_str());

            if ov.is_some_and(|o| o.is_deleted) {
                debug!("Suppressing {} - deleted by user", candidate.merchant_key);
                return None;
            }

            let mut display_name = candidate.display_name;
            let mut amount = candidate.amount;
            let mut frequency = candidate.frequency;
            let mut is_user_modified = false;

            if let Some(ov) = ov {
                if let Some(ref name) = ov.custom_name {
                    display_name = name.clone();
                    is_user_modified = true;
                }
                if let Some(custom_amount) = ov.custom_amount {
                    amount = custom_amount;
                    is_user_modified = true;
                }
                if let Some(custom_frequency) = ov.custom_frequency {
                    frequency = custom_frequency;
                    is_user_modified = true;
                }
            }

            Some(SubscriptionView {
                subscription_key: candidate.merchant_key,
                display_name,
                amount,
                frequency,
                confidence: candidate.confidence,
                last_charge: candidate.last_charge,
                next_expected: candidate.next_expected,
                category: candidate.category,
                account: candidate.account,
                transaction_count: candidate.transaction_count,
                history: candidate.history,
                origin: candidate.origin,
                is_user_modified,
                monthly_equivalent: amount * frequency.monthly_factor(),
            })
        })
        .collect()
}

/// Assemble the final report: entries sorted by monthly cost descending
/// (merchant key as tie-break) and the portfolio total, rounded once at
/// the end so per-entry rounding error never compounds.
pub fn build_report(mut entries: Vec<SubscriptionView>) -> SubscriptionReport {
    entries.sort_by(|a, b| {
        b.monthly_equivalent
            .partial_cmp(&a.monthly_equivalent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.subscription_key.cmp(&b.subscription_key))
    });

    let total_monthly = round2(entries.iter().map(|e| e.monthly_equivalent).sum());

    SubscriptionReport {
        entries,
        total_monthly,
    }
}

/// Run the full detection pipeline for one user's snapshot
///
/// Pure function: transactions from both sources, the user's current
/// overrides, the threshold table, and a `today` anchor go in; one
/// deterministic report comes out. Nothing is mutated along the way, so
/// cancelling a run is just discarding it.
pub fn run_detection(
    file_transactions: &[Transaction],
    sync_transactions: &[Transaction],
    overrides: &[SubscriptionOverride],
    config: &DetectionConfig,
    today: NaiveDate,
) -> SubscriptionReport {
    let file_candidates =
        detect_candidates(file_transactions, TransactionSource::File, config, today);
    let sync_candidates =
        detect_candidates(sync_transactions, TransactionSource::Sync, config, today);

    info!(
        "Detection: {} file candidates, {} sync candidates, {} overrides",
        file_candidates.len(),
        sync_candidates.len(),
        overrides.len()
    );

    let merged = merge_candidates(file_candidates, sync_candidates);
    let entries = apply_overrides(merged, overrides);
    build_report(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChargeRecord, Frequency};

    fn candidate(key: &str, count: usize, origin: Origin) -> CandidateSubscription {
        CandidateSubscription {
            merchant_key: key.to_string(),
            display_name: key.to_string(),
            amount: 10.0,
            frequency: Frequency::Monthly,
            confidence: 0.95,
            last_charge: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            next_expected: None,
            category: None,
            account: None,
            transaction_count: count,
            history: vec![ChargeRecord {
                amount: 10.0,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                account: None,
            }],
            origin,
        }
    }

    #[test]
    fn test_merge_single_source_passes_through() {
        let file = vec![candidate("netflix", 4, Origin::File)];
        let sync = vec![candidate("spotify", 5, Origin::Sync)];

        let merged = merge_candidates(file, sync);
        assert_eq!(merged.len(), 2);

        let netflix = merged.iter().find(|c| c.merchant_key == "netflix").unwrap();
        assert_eq!(netflix.origin, Origin::File);
        assert_eq!(netflix.transaction_count, 4);

        let spotify = merged.iter().find(|c| c.merchant_key == "spotify").unwrap();
        assert_eq!(spotify.origin, Origin::Sync);
    }

    #[test]
    fn test_merge_keeps_larger_count_and_tags_merged() {
        let file = vec![candidate("netflix", 4, Origin::File)];
        let sync = vec![candidate("netflix", 6, Origin::Sync)];

        let merged = merge_candidates(file, sync);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].transaction_count, 6);
        assert_eq!(merged[0].origin, Origin::Merged);
    }

    #[test]
    fn test_merge_tie_prefers_file_candidate() {
        let mut file_cand = candidate("netflix", 4, Origin::File);
        file_cand.display_name = "From File".to_string();
        let mut sync_cand = candidate("netflix", 4, Origin::Sync);
        sync_cand.display_name = "From Sync".to_string();

        let merged = merge_candidates(vec![file_cand], vec![sync_cand]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].display_name, "From File");
        assert_eq!(merged[0].origin, Origin::Merged);
    }

    #[test]
    fn test_override_soft_delete_suppresses_entry() {
        let candidates = vec![
            candidate("netflix", 4, Origin::File),
            candidate("spotify", 5, Origin::Sync),
        ];
        let ov = SubscriptionOverride {
            is_deleted: true,
            ..SubscriptionOverride::new("netflix")
        };

        let views = apply_overrides(candidates, &[ov]);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].subscription_key, "spotify");
    }

    #[test]
    fn test_override_applies_fields_and_flags_modified() {
        let candidates = vec![candidate("netflix", 4, Origin::Merged)];
        let ov = SubscriptionOverride {
            custom_amount: Some(17.99),
            ..SubscriptionOverride::new("netflix")
        };

        let views = apply_overrides(candidates, &[ov]);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].amount, 17.99);
        assert_eq!(views[0].frequency, Frequency::Monthly);
        assert!(views[0].is_user_modified);
        assert!((views[0].monthly_equivalent - 17.99).abs() < 1e-9);
    }

    #[test]
    fn test_override_untouched_entry_not_flagged() {
        let candidates = vec![candidate("netflix", 4, Origin::File)];
        let views = apply_overrides(candidates, &[SubscriptionOverride::new("netflix")]);
        assert!(!views[0].is_user_modified);
    }

    #[test]
    fn test_custom_frequency_changes_monthly_equivalent() {
        let candidates = vec![candidate("storage co", 3, Origin::File)];
        let ov = SubscriptionOverride {
            custom_frequency: Some(Frequency::Yearly),
            ..SubscriptionOverride::new("storage co")
        };

        let views = apply_overrides(candidates, &[ov]);
        assert!((views[0].monthly_equivalent - 10.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_total_rounded_once() {
        let mut quarterly = candidate("insurance", 3, Origin::File);
        quarterly.amount = 120.0;
        quarterly.frequency = Frequency::Quarterly;
        let mut weekly = candidate("coffee club", 5, Origin::Sync);
        weekly.amount = 3.33;
        weekly.frequency = Frequency::Weekly;

        let views = apply_overrides(vec![quarterly, weekly], &[]);
        let report = build_report(views);

        // 120/3 = 40.00 plus 3.33 * 4.33 = 14.4189, summed then rounded
        assert_eq!(report.total_monthly, 54.42);
        // Sorted by monthly cost descending
        assert_eq!(report.entries[0].subscription_key, "insurance");
    }

    #[test]
    fn test_run_detection_is_idempotent() {
        use crate::models::TransactionSource;
        use chrono::Utc;

        let tx = |id: i64, day: u32, name: &str, source: TransactionSource| Transaction {
            id,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64),
            raw_name: name.to_string(),
            merchant_name: None,
            amount: 15.99,
            category: None,
            account: None,
            source,
            import_hash: format!("h{}", id),
            created_at: Utc::now(),
        };

        let file_txs = vec![
            tx(1, 0, "Netflix", TransactionSource::File),
            tx(2, 30, "Netflix", TransactionSource::File),
            tx(3, 61, "Netflix", TransactionSource::File),
        ];
        let sync_txs = vec![
            tx(4, 0, "Netflix", TransactionSource::Sync),
            tx(5, 30, "Netflix", TransactionSource::Sync),
        ];
        let overrides = vec![SubscriptionOverride {
            custom_name: Some("Netflix Family".to_string()),
            ..SubscriptionOverride::new("netflix")
        }];

        let config = DetectionConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let first = run_detection(&file_txs, &sync_txs, &overrides, &config, today);
        let second = run_detection(&file_txs, &sync_txs, &overrides, &config, today);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.entries.len(), 1);
        // File side had more evidence; entry is reconciled and renamed
        assert_eq!(first.entries[0].transaction_count, 3);
        assert_eq!(first.entries[0].origin, Origin::Merged);
        assert_eq!(first.entries[0].display_name, "Netflix Family");
        assert!(first.entries[0].is_user_modified);
    }
}
