use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of processing one meeting. Written once, never revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub meeting_id: String,
    pub title: String,
    pub success: bool,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl LedgerEntry {
    pub fn new(meeting_id: impl Into<String>, title: impl Into<String>, success: bool) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            title: title.into(),
            success,
            processed_at: Utc::now(),
            organization: None,
            attempts: None,
        }
    }
}

/// Root persisted object.
///
/// Every field except `lastCheckTimestamp` defaults when absent and unknown
/// fields are ignored, so files written by older or newer builds still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    pub last_check_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub processed: BTreeMap<String, LedgerEntry>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_notified_at: Option<DateTime<Utc>>,
    /// Skip-notification keys already announced, with when they were first seen.
    #[serde(default)]
    pub notified_skips: BTreeMap<String, DateTime<Utc>>,
}

impl MonitorState {
    /// Fresh state whose last check sits at the start of the lookback window.
    pub fn fresh(lookback_days: u32, now: DateTime<Utc>) -> Self {
        Self {
            last_check_timestamp: horizon(lookback_days, now),
            processed: BTreeMap::new(),
            consecutive_failures: 0,
            last_failure_notified_at: None,
            notified_skips: BTreeMap::new(),
        }
    }

    /// Drop entries and skip keys older than the lookback horizon.
    ///
    /// Returns the number of ledger entries removed.
    pub fn prune_older_than(&mut self, lookback_days: u32, now: DateTime<Utc>) -> usize {
        let cutoff = horizon(lookback_days, now);
        let before = self.processed.len();
        self.processed.retain(|_, entry| entry.processed_at >= cutoff);
        self.notified_skips.retain(|_, seen_at| *seen_at >= cutoff);
        before - self.processed.len()
    }
}

/// Start of the lookback window.
pub fn horizon(lookback_days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(lookback_days))
}
