//! The monitor run: FETCH → FILTER → per meeting TEMPLATE CHECK → CLASSIFY
//! → DELIVER → UPDATE LEDGER → NOTIFY → PUBLISH.
//!
//! Meetings are processed one at a time. A failure inside one meeting is
//! contained at the meeting boundary; only an upstream fetch failure
//! aborts the run, and it does so before the ledger is touched.

use std::collections::HashSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use relay_core::config::TemplateValidationConfig;
use relay_core::templates::template_skip_reason;
use relay_core::{classify, Config, MeetingRecord, OrganizationRule};
use relay_delivery::DeliveryEngine;
use relay_ledger::{FailureStreak, LedgerEntry, LedgerError, StateLedger};
use relay_notify::{Dispatcher, NotificationEvent};
use relay_outputs::OutputFanout;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::MonitorError;
use crate::source::MeetingSource;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Meetings returned by the source.
    pub seen: usize,
    pub already_processed: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when shutdown was requested before the batch finished.
    pub interrupted: bool,
}

/// Run-shaping values from the `monitoring`, `organizations` and
/// `templateValidation` config sections.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub lookback_days: u32,
    pub max_meetings_per_run: usize,
    pub organizations: Vec<OrganizationRule>,
    pub default_organization: String,
    pub template_validation: TemplateValidationConfig,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookback_days: config.monitoring.lookback_days,
            max_meetings_per_run: config.monitoring.max_meetings_per_run,
            organizations: config.organizations.clone(),
            default_organization: config.default_organization.clone(),
            template_validation: config.template_validation.clone(),
        }
    }
}

enum MeetingOutcome {
    Delivered,
    Failed,
    Skipped,
}

pub struct MonitorLoop {
    source: Box<dyn MeetingSource>,
    ledger: Box<dyn StateLedger>,
    engine: DeliveryEngine,
    notifier: Dispatcher,
    outputs: OutputFanout,
    settings: MonitorSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl MonitorLoop {
    pub fn new(
        source: Box<dyn MeetingSource>,
        ledger: Box<dyn StateLedger>,
        engine: DeliveryEngine,
        notifier: Dispatcher,
        outputs: OutputFanout,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            source,
            ledger,
            engine,
            notifier,
            outputs,
            settings,
            shutdown: None,
        }
    }

    /// Wire the HTTP delivery engine, notification channels and output
    /// sinks described by `config` around a source and ledger.
    pub fn from_config(
        config: &Config,
        source: Box<dyn MeetingSource>,
        ledger: Box<dyn StateLedger>,
    ) -> Result<Self, MonitorError> {
        Ok(Self::new(
            source,
            ledger,
            DeliveryEngine::from_config(config)?,
            Dispatcher::from_config(&config.notifications)?,
            OutputFanout::from_config(&config.outputs)?,
            MonitorSettings::from_config(config),
        ))
    }

    /// Stop between meetings once the receiver observes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn ledger(&self) -> &dyn StateLedger {
        self.ledger.as_ref()
    }

    pub fn notifier(&self) -> &Dispatcher {
        &self.notifier
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Execute one full pass over the lookback window.
    ///
    /// The fetch always starts at the lookback horizon, not at the ledger's
    /// last check: meetings deferred by the per-run cap are older than the
    /// previous run's start and still need picking up.
    pub async fn run_once(&mut self) -> Result<RunSummary, MonitorError> {
        let run_started = Utc::now();
        let since = run_started - ChronoDuration::days(i64::from(self.settings.lookback_days));

        let fetched = self.source.fetch_since(since).await?;
        let mut summary = RunSummary {
            seen: fetched.len(),
            ..RunSummary::default()
        };

        let batch = self.select_batch(fetched, since, &mut summary);
        tracing::info!(
            source = self.source.source_name(),
            seen = summary.seen,
            already_processed = summary.already_processed,
            pending = batch.len(),
            "fetched meetings"
        );

        for meeting in batch {
            if self.shutdown_requested() {
                tracing::info!("shutdown requested, stopping before next meeting");
                summary.interrupted = true;
                break;
            }

            match self.process_meeting(&meeting).await {
                Ok(MeetingOutcome::Delivered) => summary.delivered += 1,
                Ok(MeetingOutcome::Failed) => summary.failed += 1,
                Ok(MeetingOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    self.contain_failure(&meeting, e).await;
                }
            }
        }

        if !summary.interrupted {
            if let Err(e) = self.ledger.advance_last_check(run_started) {
                tracing::warn!(error = %e, "failed to persist last check timestamp");
            }
        }

        tracing::info!(
            seen = summary.seen,
            already_processed = summary.already_processed,
            delivered = summary.delivered,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "run complete"
        );
        Ok(summary)
    }

    /// Drop stale, processed and duplicate meetings; order oldest first and
    /// cap the batch size.
    fn select_batch(
        &self,
        fetched: Vec<MeetingRecord>,
        horizon: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Vec<MeetingRecord> {
        let mut seen_ids = HashSet::new();
        let mut batch: Vec<MeetingRecord> = Vec::with_capacity(fetched.len());
        for meeting in fetched {
            if meeting.created_at < horizon {
                continue;
            }
            if self.ledger.is_processed(&meeting.id) {
                summary.already_processed += 1;
                continue;
            }
            if !seen_ids.insert(meeting.id.clone()) {
                tracing::debug!(meeting_id = %meeting.id, "duplicate meeting in batch");
                continue;
            }
            batch.push(meeting);
        }

        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if batch.len() > self.settings.max_meetings_per_run {
            tracing::info!(
                pending = batch.len(),
                limit = self.settings.max_meetings_per_run,
                "batch capped, remaining meetings deferred to next run"
            );
            batch.truncate(self.settings.max_meetings_per_run);
        }
        batch
    }

    async fn process_meeting(&mut self, meeting: &MeetingRecord) -> Result<MeetingOutcome, LedgerError> {
        if let Some(reason) = template_skip_reason(meeting, &self.settings.template_validation) {
            tracing::info!(meeting_id = %meeting.id, reason = %reason, "meeting skipped");
            if self.ledger.should_notify_skipped(&meeting.id, &reason)? {
                self.notifier
                    .notify(&NotificationEvent::Skipped {
                        meeting: meeting.clone(),
                        reason,
                    })
                    .await;
            }
            return Ok(MeetingOutcome::Skipped);
        }

        let organization = classify(
            meeting,
            &self.settings.organizations,
            &self.settings.default_organization,
        );
        tracing::debug!(meeting_id = %meeting.id, organization = %organization, "classified meeting");

        let report = self.engine.deliver(meeting, &organization).await;
        let success = report.succeeded();

        let mut entry = LedgerEntry::new(meeting.id.clone(), meeting.title.clone(), success);
        entry.organization = Some(organization.clone());
        entry.attempts = Some(report.attempt_count());
        self.ledger.record_processed(entry)?;

        // The entry is written; streak bookkeeping errors from here on must
        // not turn into a meeting-level failure.
        let outcome = if success {
            if let Err(e) = self.ledger.record_success() {
                tracing::warn!(meeting_id = %meeting.id, error = %e, "failed to reset failure streak");
            }
            tracing::info!(meeting_id = %meeting.id, organization = %organization, attempts = report.attempt_count(), "meeting delivered");
            self.notifier
                .notify(&NotificationEvent::Delivered {
                    meeting: meeting.clone(),
                    organization: organization.clone(),
                })
                .await;
            MeetingOutcome::Delivered
        } else {
            let streak = self.ledger.record_failure().unwrap_or_else(|e| {
                tracing::warn!(meeting_id = %meeting.id, error = %e, "failed to record failure streak");
                FailureStreak {
                    streak: self.ledger.consecutive_failures(),
                    should_alert: false,
                }
            });
            let error = report.last_error().unwrap_or("delivery failed").to_string();
            tracing::warn!(meeting_id = %meeting.id, attempts = report.attempt_count(), streak = streak.streak, error = %error, "meeting delivery failed");
            self.notifier
                .notify(&NotificationEvent::Failed {
                    meeting: meeting.clone(),
                    error,
                    attempt: report.attempt_count(),
                })
                .await;
            if streak.should_alert {
                self.notifier
                    .notify(&NotificationEvent::StreakAlert {
                        count: streak.streak,
                    })
                    .await;
            }
            MeetingOutcome::Failed
        };

        self.outputs.publish(meeting, &organization, &report).await;
        Ok(outcome)
    }

    /// Best-effort bookkeeping after a meeting-level error. An entry that is
    /// already recorded keeps its delivery outcome.
    async fn contain_failure(&mut self, meeting: &MeetingRecord, error: LedgerError) {
        tracing::error!(meeting_id = %meeting.id, error = %error, "meeting processing failed");
        if !self.ledger.is_processed(&meeting.id) {
            if let Err(e) = self
                .ledger
                .record_processed(LedgerEntry::new(meeting.id.clone(), meeting.title.clone(), false))
            {
                tracing::warn!(meeting_id = %meeting.id, error = %e, "could not mark meeting as failed");
            }
        }
        self.notifier
            .notify(&NotificationEvent::Failed {
                meeting: meeting.clone(),
                error: error.to_string(),
                attempt: 0,
            })
            .await;
    }
}
