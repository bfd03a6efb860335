//! Webhook delivery with signing and retry.
//!
//! One call to [`DeliveryEngine::deliver`] builds and signs the payload once,
//! then posts it until it succeeds, hits a permanent failure, or runs out of
//! attempts. Every attempt is returned; the last one is authoritative.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{Config, ConfigError, MeetingRecord};
use serde::Serialize;

use crate::error::DeliveryError;
use crate::payload::WebhookPayload;
use crate::retry::RetryPolicy;
use crate::signing;
use crate::transport::{HttpTransport, WebhookRequest, WebhookTransport};

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    /// 1-based attempt number.
    pub attempt: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// All attempts of one delivery, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempts: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn final_outcome(&self) -> Option<&DeliveryOutcome> {
        self.attempts.last()
    }

    pub fn succeeded(&self) -> bool {
        self.final_outcome().is_some_and(|o| o.success)
    }

    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.final_outcome().and_then(|o| o.error.as_deref())
    }
}

/// Where and how to deliver.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Empty disables signing.
    pub secret: String,
    pub signature_header: String,
    pub include_transcript: bool,
    /// Bound on each individual attempt.
    pub attempt_timeout: Duration,
}

impl DeliveryTarget {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let env = config.active_environment()?;
        Ok(Self {
            url: env.url.clone(),
            headers: env.headers.clone(),
            secret: config.webhook.secret.clone(),
            signature_header: config.webhook.signature_header.clone(),
            include_transcript: config.webhook.include_transcript,
            attempt_timeout: Duration::from_millis(config.webhook.timeout_ms),
        })
    }
}

pub struct DeliveryEngine {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    target: DeliveryTarget,
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn WebhookTransport>, policy: RetryPolicy, target: DeliveryTarget) -> Self {
        Self {
            transport,
            policy,
            target,
        }
    }

    /// Engine posting over HTTP with settings from the `webhook` and
    /// active `environments` sections.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let target = DeliveryTarget::from_config(config)?;
        let transport = HttpTransport::new(target.attempt_timeout)
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy::from_config(&config.webhook),
            target,
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Build the signed request for a meeting.
    pub fn build_request(
        &self,
        meeting: &MeetingRecord,
        organization: &str,
    ) -> Result<WebhookRequest, DeliveryError> {
        let payload = WebhookPayload::build(meeting, organization, self.target.include_transcript);
        let body = payload.to_bytes()?;

        let mut headers: Vec<(String, String)> = self
            .target
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if !self.target.secret.is_empty() {
            headers.push((
                self.target.signature_header.clone(),
                signing::signature_header_value(&body, &self.target.secret),
            ));
        }

        Ok(WebhookRequest {
            url: self.target.url.clone(),
            headers,
            body,
        })
    }

    /// Deliver a meeting, retrying transient failures per the retry policy.
    pub async fn deliver(&self, meeting: &MeetingRecord, organization: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let request = match self.build_request(meeting, organization) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(meeting_id = %meeting.id, error = %e, "failed to build webhook payload");
                report.attempts.push(DeliveryOutcome {
                    attempt: 1,
                    success: false,
                    http_status: None,
                    error: Some(e.to_string()),
                    elapsed_ms: 0,
                });
                return report;
            }
        };

        let mut attempt = 1;
        loop {
            let (outcome, failure) = self.attempt_once(&request, attempt).await;
            report.attempts.push(outcome);

            let Some(failure) = failure else {
                tracing::info!(meeting_id = %meeting.id, attempt, "webhook delivered");
                return report;
            };

            if !failure.is_retryable() {
                tracing::warn!(
                    meeting_id = %meeting.id,
                    attempt,
                    error = %failure,
                    "webhook rejected, not retrying"
                );
                return report;
            }

            if !self.policy.should_retry(attempt) {
                tracing::warn!(
                    meeting_id = %meeting.id,
                    attempt,
                    error = %failure,
                    "webhook delivery failed, retries exhausted"
                );
                return report;
            }

            let delay = self.policy.next_delay(attempt);
            tracing::info!(
                meeting_id = %meeting.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "webhook attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt_once(
        &self,
        request: &WebhookRequest,
        attempt: u32,
    ) -> (DeliveryOutcome, Option<DeliveryError>) {
        let start = Instant::now();
        let result =
            tokio::time::timeout(self.target.attempt_timeout, self.transport.post(request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (http_status, failure) = match result {
            Ok(Ok(response)) if response.is_success() => (Some(response.status), None),
            Ok(Ok(response)) => (
                Some(response.status),
                Some(DeliveryError::from_status(response.status, &response.body)),
            ),
            Ok(Err(e)) => (None, Some(DeliveryError::Transient(e.to_string()))),
            Err(_) => (
                None,
                Some(DeliveryError::Transient(format!(
                    "timed out after {}ms",
                    self.target.attempt_timeout.as_millis()
                ))),
            ),
        };

        tracing::debug!(
            url = %request.url,
            attempt,
            status = ?http_status,
            elapsed_ms,
            "webhook attempt finished"
        );

        let outcome = DeliveryOutcome {
            attempt,
            success: failure.is_none(),
            http_status,
            error: failure.as_ref().map(|e| e.to_string()),
            elapsed_ms,
        };
        (outcome, failure)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::Utc;
    use relay_core::config::RetryStrategy;

    use super::*;
    use crate::transport::{TransportError, TransportResponse};

    /// Replays scripted responses; repeats the last one when exhausted.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<u16, String>>>,
        last: Result<u16, String>,
        requests: Mutex<Vec<WebhookRequest>>,
        hang: bool,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<u16, String>>) -> Arc<Self> {
            let last = script.last().cloned().unwrap_or(Ok(200));
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last,
                requests: Mutex::new(Vec::new()),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                last: Ok(200),
                requests: Mutex::new(Vec::new()),
                hang: true,
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn post(&self, request: &WebhookRequest) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            match next {
                Ok(status) => Ok(TransportResponse {
                    status,
                    body: String::new(),
                }),
                Err(msg) => Err(TransportError(msg)),
            }
        }
    }

    fn target(secret: &str) -> DeliveryTarget {
        DeliveryTarget {
            url: "https://hooks.test/meetings".to_string(),
            headers: BTreeMap::from([("X-Source".to_string(), "relay".to_string())]),
            secret: secret.to_string(),
            signature_header: "X-Webhook-Signature".to_string(),
            include_transcript: false,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn engine(transport: Arc<ScriptedTransport>, max_attempts: u32) -> DeliveryEngine {
        let policy = RetryPolicy::new(RetryStrategy::Exponential, Duration::from_millis(1), max_attempts);
        DeliveryEngine::new(transport, policy, target("secret"))
    }

    fn meeting() -> MeetingRecord {
        MeetingRecord::new("m-1", "Team Talk Tuesday", Utc::now())
    }

    #[tokio::test]
    async fn fail_twice_then_succeed_takes_three_attempts() {
        let transport = ScriptedTransport::new(vec![Ok(503), Err("connection reset".into()), Ok(200)]);
        let report = engine(transport.clone(), 3).deliver(&meeting(), "OMAI").await;

        assert!(report.succeeded());
        assert_eq!(report.attempt_count(), 3);
        assert_eq!(transport.calls(), 3);
        assert_eq!(report.attempts[0].http_status, Some(503));
        assert_eq!(report.attempts[1].http_status, None);
        assert!(report.attempts[1].error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(report.final_outcome().unwrap().attempt, 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(404)]);
        let report = engine(transport.clone(), 5).deliver(&meeting(), "OMAI").await;

        assert!(!report.succeeded());
        assert_eq!(report.attempt_count(), 1);
        assert_eq!(transport.calls(), 1);
        assert!(report.last_error().unwrap().contains("permanent"));
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let transport = ScriptedTransport::new(vec![Ok(429), Ok(204)]);
        let report = engine(transport, 3).deliver(&meeting(), "OMAI").await;
        assert!(report.succeeded());
        assert_eq!(report.attempt_count(), 2);
    }

    #[tokio::test]
    async fn exhausting_retries_reports_failure() {
        let transport = ScriptedTransport::new(vec![Ok(500)]);
        let report = engine(transport.clone(), 3).deliver(&meeting(), "OMAI").await;

        assert!(!report.succeeded());
        assert_eq!(report.attempt_count(), 3);
        assert_eq!(transport.calls(), 3);
        assert!(report.attempts.iter().all(|a| !a.success));
    }

    #[tokio::test]
    async fn hung_attempt_times_out() {
        let transport = ScriptedTransport::hanging();
        let mut t = target("");
        t.attempt_timeout = Duration::from_millis(20);
        let policy = RetryPolicy::new(RetryStrategy::Fixed, Duration::from_millis(1), 2);
        let engine = DeliveryEngine::new(transport.clone(), policy, t);

        let report = engine.deliver(&meeting(), "OMAI").await;
        assert!(!report.succeeded());
        assert_eq!(report.attempt_count(), 2);
        assert!(report.last_error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn signs_the_exact_bytes_sent() {
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        engine(transport.clone(), 1).deliver(&meeting(), "OMAI").await;

        let requests = transport.requests.lock().unwrap();
        let request = &requests[0];
        let header = request.header("x-webhook-signature").unwrap();
        assert!(signing::verify(&request.body, "secret", header));
        assert_eq!(request.header("X-Source"), Some("relay"));
        assert_eq!(request.header("content-type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["meetingId"], "m-1");
        assert_eq!(body["organization"], "OMAI");
    }

    #[test]
    fn no_signature_without_secret() {
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        let policy = RetryPolicy::new(RetryStrategy::Fixed, Duration::from_millis(1), 1);
        let engine = DeliveryEngine::new(transport, policy, target(""));
        let request = engine.build_request(&meeting(), "OMAI").unwrap();
        assert!(request.header("X-Webhook-Signature").is_none());
    }

    #[test]
    fn empty_report_is_not_a_success() {
        let report = DeliveryReport::default();
        assert_eq!(report.attempt_count(), 0);
        assert!(!report.succeeded());
        assert!(report.last_error().is_none());
    }
}
