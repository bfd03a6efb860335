//! Single JSON file ledger backend.
//!
//! The whole [`MonitorState`] is rewritten on every state change using
//! write-to-temp + `sync_all` + rename, so the file on disk is always either
//! the previous or the new complete document.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relay_core::config::{MonitoringConfig, SkipNotificationKey};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::ledger::{FailureStreak, StateLedger};
use crate::state::{LedgerEntry, MonitorState};

const TMP_SUFFIX: &str = "tmp";
const CORRUPT_SUFFIX: &str = "corrupt";

/// Tunables the ledger needs from the monitoring config.
#[derive(Debug, Clone, Copy)]
pub struct LedgerOptions {
    pub lookback_days: u32,
    pub failure_alert_threshold: u32,
    pub skip_key: SkipNotificationKey,
}

impl From<&MonitoringConfig> for LedgerOptions {
    fn from(cfg: &MonitoringConfig) -> Self {
        Self {
            lookback_days: cfg.lookback_days,
            failure_alert_threshold: cfg.failure_alert_threshold,
            skip_key: cfg.skip_notification_key,
        }
    }
}

/// Result of [`JsonFileLedger::load`].
#[derive(Debug)]
pub struct LedgerLoad {
    pub ledger: JsonFileLedger,
    /// Set when the existing file could not be used and a fresh state was
    /// started instead. Callers surface this as a warning.
    pub recovered: Option<LedgerError>,
}

#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    state: MonitorState,
    options: LedgerOptions,
}

impl JsonFileLedger {
    /// Load the ledger at `path`, or start a fresh one.
    ///
    /// Never fails: an unreadable or unparseable file is moved aside to
    /// `<path>.corrupt` and reported through [`LedgerLoad::recovered`].
    pub fn load(path: impl Into<PathBuf>, options: LedgerOptions) -> LedgerLoad {
        let path = path.into();
        let now = Utc::now();

        let (mut state, recovered) = match read_state(&path) {
            Ok(Some(state)) => (state, None),
            Ok(None) => {
                info!(path = %path.display(), "no state file, starting fresh ledger");
                (MonitorState::fresh(options.lookback_days, now), None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unusable, reinitializing");
                if matches!(e, LedgerError::Corrupt { .. }) {
                    quarantine(&path);
                }
                (MonitorState::fresh(options.lookback_days, now), Some(e))
            }
        };

        let pruned = state.prune_older_than(options.lookback_days, now);
        if pruned > 0 {
            debug!(pruned, "pruned ledger entries past lookback horizon");
        }

        LedgerLoad {
            ledger: Self {
                path,
                state,
                options,
            },
            recovered,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    fn skip_key(&self, meeting_id: &str, reason: &str) -> String {
        match self.options.skip_key {
            SkipNotificationKey::MeetingAndReason => format!("{meeting_id}|{reason}"),
            SkipNotificationKey::Meeting => meeting_id.to_string(),
        }
    }

    /// Atomically replace the state file with the current state.
    fn persist(&self) -> Result<(), LedgerError> {
        save_state(&self.path, &self.state)
    }
}

impl StateLedger for JsonFileLedger {
    fn is_processed(&self, meeting_id: &str) -> bool {
        self.state.processed.contains_key(meeting_id)
    }

    fn record_processed(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        debug!(meeting_id = %entry.meeting_id, success = entry.success, "recording processed meeting");
        self.state.processed.insert(entry.meeting_id.clone(), entry);
        self.persist()
    }

    fn should_notify_skipped(&mut self, meeting_id: &str, reason: &str) -> Result<bool, LedgerError> {
        let key = self.skip_key(meeting_id, reason);
        if self.state.notified_skips.contains_key(&key) {
            return Ok(false);
        }
        self.state.notified_skips.insert(key, Utc::now());
        self.persist()?;
        Ok(true)
    }

    fn record_failure(&mut self) -> Result<FailureStreak, LedgerError> {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        let streak = self.state.consecutive_failures;

        let threshold = self.options.failure_alert_threshold.max(1);
        let should_alert = streak >= threshold && self.state.last_failure_notified_at.is_none();
        if should_alert {
            self.state.last_failure_notified_at = Some(Utc::now());
        }

        self.persist()?;
        Ok(FailureStreak {
            streak,
            should_alert,
        })
    }

    fn record_success(&mut self) -> Result<(), LedgerError> {
        if self.state.consecutive_failures == 0 && self.state.last_failure_notified_at.is_none() {
            return Ok(());
        }
        self.state.consecutive_failures = 0;
        self.state.last_failure_notified_at = None;
        self.persist()
    }

    fn prune_older_than(&mut self, lookback_days: u32) -> usize {
        self.state.prune_older_than(lookback_days, Utc::now())
    }

    fn last_check(&self) -> DateTime<Utc> {
        self.state.last_check_timestamp
    }

    fn advance_last_check(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if at <= self.state.last_check_timestamp {
            return Ok(());
        }
        self.state.last_check_timestamp = at;
        self.persist()
    }

    fn consecutive_failures(&self) -> u32 {
        self.state.consecutive_failures
    }

    fn entries(&self) -> Vec<&LedgerEntry> {
        self.state.processed.values().collect()
    }
}

fn read_state(path: &Path) -> Result<Option<MonitorState>, LedgerError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LedgerError::io(path, e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| LedgerError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn save_state(path: &Path, state: &MonitorState) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
    }

    let encoded = serde_json::to_string_pretty(state)?;
    let tmp_path = sibling(path, TMP_SUFFIX);

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)
        .map_err(|e| LedgerError::io(&tmp_path, e))?;
    file.write_all(encoded.as_bytes())
        .map_err(|e| LedgerError::io(&tmp_path, e))?;
    file.sync_all().map_err(|e| LedgerError::io(&tmp_path, e))?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(|e| LedgerError::io(path, e))?;
    Ok(())
}

/// Move a corrupt state file out of the way so it can be inspected later.
fn quarantine(path: &Path) {
    let target = sibling(path, CORRUPT_SUFFIX);
    match std::fs::rename(path, &target) {
        Ok(()) => warn!(from = %path.display(), to = %target.display(), "moved corrupt state file aside"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not move corrupt state file aside"),
    }
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
