//! Concurrent publishing to every enabled output sink.

use std::time::{Duration, Instant};

use futures::future::join_all;
use relay_core::config::OutputsConfig;
use relay_core::MeetingRecord;
use relay_delivery::DeliveryReport;

use crate::error::SinkError;
use crate::record::OutputRecord;
use crate::sink::{build_sinks, OutputSink};

/// Result of publishing one record to a single sink.
#[derive(Debug)]
pub struct PublishResult {
    pub sink: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub struct OutputFanout {
    sinks: Vec<Box<dyn OutputSink>>,
    timeout: Duration,
    publish_failures: bool,
}

impl OutputFanout {
    pub fn new(sinks: Vec<Box<dyn OutputSink>>, timeout: Duration, publish_failures: bool) -> Self {
        Self {
            sinks,
            timeout,
            publish_failures,
        }
    }

    pub fn from_config(config: &OutputsConfig) -> Result<Self, SinkError> {
        Ok(Self::new(
            build_sinks(config)?,
            Duration::from_millis(config.timeout_ms),
            config.publish_failures,
        ))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::from_secs(15), false)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Whether a meeting with this delivery report goes to the sinks at all.
    pub fn should_publish(&self, report: &DeliveryReport) -> bool {
        report.succeeded() || self.publish_failures
    }

    /// Publish a processed meeting to every sink concurrently.
    ///
    /// Returns one result per sink in sink order; an empty vec when there
    /// are no sinks or the meeting is not eligible. Never fails.
    pub async fn publish(
        &self,
        meeting: &MeetingRecord,
        organization: &str,
        report: &DeliveryReport,
    ) -> Vec<PublishResult> {
        if self.sinks.is_empty() {
            return Vec::new();
        }
        if !self.should_publish(report) {
            tracing::debug!(meeting_id = %meeting.id, "delivery failed, outputs skipped");
            return Vec::new();
        }

        let record = OutputRecord::build(meeting, organization, report);
        join_all(self.sinks.iter().map(|sink| self.publish_one(sink.as_ref(), &record))).await
    }

    async fn publish_one(&self, sink: &dyn OutputSink, record: &OutputRecord) -> PublishResult {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, sink.deliver(record)).await {
            Ok(inner) => inner,
            Err(_) => Err(SinkError::Timeout(self.timeout.as_millis() as u64)),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(sink = sink.sink_name(), meeting_id = %record.meeting_id, duration_ms, "output published");
                PublishResult {
                    sink: sink.sink_name().to_string(),
                    success: true,
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(sink = sink.sink_name(), meeting_id = %record.meeting_id, error = %e, duration_ms, "output publish failed");
                PublishResult {
                    sink: sink.sink_name().to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }
}
