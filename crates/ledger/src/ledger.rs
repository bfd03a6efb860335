//! Backend-agnostic ledger interface.

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::state::LedgerEntry;

/// Result of recording a failed meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureStreak {
    /// Consecutive failures including this one.
    pub streak: u32,
    /// True exactly once per streak, when it reaches the alert threshold.
    pub should_alert: bool,
}

/// Durable record of processed meetings and failure streaks.
///
/// Every mutating call persists before returning: once it returns `Ok`,
/// the change survives an immediate process exit.
pub trait StateLedger: Send {
    fn is_processed(&self, meeting_id: &str) -> bool;

    /// Insert or overwrite the entry for `entry.meeting_id`, then persist.
    fn record_processed(&mut self, entry: LedgerEntry) -> Result<(), LedgerError>;

    /// True only the first time this skip is seen for the meeting.
    fn should_notify_skipped(&mut self, meeting_id: &str, reason: &str) -> Result<bool, LedgerError>;

    fn record_failure(&mut self) -> Result<FailureStreak, LedgerError>;

    fn record_success(&mut self) -> Result<(), LedgerError>;

    /// Drop entries older than the lookback horizon. Returns how many were removed.
    fn prune_older_than(&mut self, lookback_days: u32) -> usize;

    /// Start of the last completed run. A watermark for diagnostics; runs
    /// fetch from the lookback horizon, never from here.
    fn last_check(&self) -> DateTime<Utc>;

    /// Move the last-check timestamp forward. Earlier timestamps are ignored.
    fn advance_last_check(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError>;

    fn consecutive_failures(&self) -> u32;

    /// All recorded entries, for diagnostics.
    fn entries(&self) -> Vec<&LedgerEntry>;
}
